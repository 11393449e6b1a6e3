//! Collaborator traits for the channel, executor and host launcher.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    codec::CodecError,
    message::{Message, RunKind},
    payload::{DiscoveryRequestPayload, MessageLevel, RunRequestPayload, TestProcessStartInfo},
};

/// Address of the controlling host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Endpoint on the loopback interface.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Channel error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connection to {0} failed: {1}")]
    ConnectFailed(Endpoint, String),
    #[error("Channel is not connected")]
    NotConnected,
    #[error("Channel closed")]
    Closed,
    #[error("Failed to encode message: {0}")]
    Codec(#[from] CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bidirectional message channel to the host.
///
/// `receive` has a single caller (the session loop); `send` may be called
/// concurrently from any task, including while a `receive` is pending.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Start connecting to the host.
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), ChannelError>;

    /// Wait until the host accepts the connection. Returns `false` on timeout.
    async fn wait_for_acceptance(&self, timeout: Duration) -> bool;

    /// Send a message.
    async fn send(&self, message: Message) -> Result<(), ChannelError>;

    /// Receive the next message.
    async fn receive(&self) -> Result<Message, ChannelError>;

    /// Tear the channel down. Must be idempotent.
    fn stop(&self);
}

/// Host launcher error.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Custom host launch failed: {0}")]
    HostLaunchFailed(String),
    #[error("Custom host launch was not acknowledged within {0:?}")]
    HostLaunchTimeout(Duration),
    #[error("Invalid launch acknowledgment: process id {0} without error message")]
    InvalidAcknowledgment(i32),
    #[error("Another {0} request is already outstanding")]
    InProgress(&'static str),
    #[error("Session ended before the {0} request was acknowledged")]
    Aborted(&'static str),
    #[error("Debugger attach failed: {0}")]
    DebuggerAttachFailed(String),
    #[error("Debugger attach was not acknowledged within {0:?}")]
    DebuggerAttachTimeout(Duration),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

/// Capability to have the host start processes on the executor's behalf.
#[async_trait]
pub trait HostLauncher: Send + Sync {
    /// Ask the host to launch a custom test host; returns its process id.
    async fn launch_custom_host(&self, start_info: TestProcessStartInfo)
    -> Result<u32, LaunchError>;

    /// Ask the host to attach its debugger to `process_id`.
    async fn attach_debugger(&self, process_id: u32) -> Result<bool, LaunchError>;
}

/// Outbound path for executor progress and results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Send a message to the host.
    async fn send(&self, message: Message) -> Result<(), ChannelError>;

    /// Send a diagnostic message to the host.
    async fn send_test_message(&self, level: MessageLevel, text: &str)
    -> Result<(), ChannelError>;
}

/// A decoded run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub kind: RunKind,
    pub payload: RunRequestPayload,
}

/// Test execution engine.
///
/// `run_tests` and `discover_tests` are spawned on their own tasks and report
/// through the sink, including failures. The cancel methods are called inline
/// from the session loop and must not block.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Execute a run request.
    async fn run_tests(
        &self,
        request: RunRequest,
        launcher: Arc<dyn HostLauncher>,
        sink: Arc<dyn ResultSink>,
    );

    /// Discover tests in the given sources.
    async fn discover_tests(&self, payload: DiscoveryRequestPayload, sink: Arc<dyn ResultSink>);

    /// Cancel the active run.
    fn cancel_run(&self);

    /// Abort the active run.
    fn abort_run(&self);

    /// Cancel the active discovery.
    fn cancel_discovery(&self);
}
