//! Session controller: connect, handshake, dispatch, teardown.

use std::sync::Arc;

use design_mode_core::{
    Channel, ChannelError, CustomHostLaunchAck, DebuggerAttachAck, DiscoveryRequestPayload,
    Endpoint, HostLauncher, Message, MessageLevel, MessageType, RequestExecutor, ResultSink,
    RunKind, RunRequest, RunRequestPayload, codec,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::{config::SessionConfig, launcher::HostLaunchCoordinator, sink::ChannelSink};

/// Session controller error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Host did not accept the connection on {endpoint} within {timeout:?}")]
    ConnectionTimeout {
        endpoint: Endpoint,
        timeout: std::time::Duration,
    },
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Session already ended")]
    SessionEnded,
    #[error("Session already running")]
    AlreadyRunning,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected; a session may start.
    Disconnected,
    /// Waiting for the host to accept the connection.
    Connecting,
    /// Connected, waiting for the host's version check.
    AwaitingVersionAck,
    /// Handshake done, servicing requests.
    Dispatching,
    /// Terminal.
    Ended,
}

enum Flow {
    Continue,
    End,
}

/// Drives one design-mode session against the controlling host.
///
/// The task awaiting [`connect_and_process`](Self::connect_and_process) is the
/// only reader of the channel. Run and discovery requests are spawned and
/// never awaited by the loop.
pub struct SessionController {
    channel: Arc<dyn Channel>,
    config: SessionConfig,
    launcher: Arc<HostLaunchCoordinator>,
    sink: Arc<ChannelSink>,
    state: Mutex<SessionState>,
    negotiated_version: Mutex<Option<u32>>,
}

impl SessionController {
    /// Create a controller for `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, config: SessionConfig) -> Self {
        Self {
            launcher: Arc::new(HostLaunchCoordinator::new(
                Arc::clone(&channel),
                config.launch_timeout,
            )),
            sink: Arc::new(ChannelSink::new(Arc::clone(&channel))),
            channel,
            config,
            state: Mutex::new(SessionState::Disconnected),
            negotiated_version: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Version agreed in the handshake, once it has happened.
    #[must_use]
    pub fn negotiated_version(&self) -> Option<u32> {
        *self.negotiated_version.lock()
    }

    /// Coordinator for custom host launches on this session's channel.
    #[must_use]
    pub fn launcher(&self) -> Arc<HostLaunchCoordinator> {
        Arc::clone(&self.launcher)
    }

    /// Connect to the host, handshake, and service requests until the host
    /// ends the session.
    ///
    /// # Errors
    /// Returns `ConnectionTimeout` if the host does not accept in time,
    /// `ProtocolViolation` if the handshake is malformed, `Channel` if the
    /// channel fails mid-session and `SessionEnded` if this controller has
    /// already been torn down. A host exit while this call is running, in
    /// any phase, ends it with `Ok(())`.
    pub async fn connect_and_process(
        &self,
        endpoint: &Endpoint,
        executor: Arc<dyn RequestExecutor>,
    ) -> Result<(), SessionError> {
        self.begin()?;
        tracing::info!(%endpoint, "connecting to design-mode host");

        if let Err(e) = self.channel.connect(endpoint).await {
            self.teardown(SessionState::Disconnected);
            return Err(e.into());
        }

        let timeout = self.config.connection_timeout;
        if !self.channel.wait_for_acceptance(timeout).await {
            if self.state() == SessionState::Ended {
                tracing::info!("host exited while connecting");
                return Ok(());
            }
            tracing::error!(%endpoint, ?timeout, "host did not accept the connection");
            self.teardown(SessionState::Disconnected);
            return Err(SessionError::ConnectionTimeout {
                endpoint: endpoint.clone(),
                timeout,
            });
        }

        match self.handshake().await {
            Ok(()) => {}
            Err(e) if self.state() == SessionState::Ended => {
                tracing::info!("host exited during handshake: {e}");
                return Ok(());
            }
            Err(e) => return self.fail(e),
        }
        tracing::info!(version = ?self.negotiated_version(), "design-mode session connected");

        loop {
            let message = match self.channel.receive().await {
                Ok(message) => message,
                Err(_) if self.state() == SessionState::Ended => {
                    tracing::info!("channel closed after host exit");
                    return Ok(());
                }
                Err(e) => return self.fail(e.into()),
            };

            match self.handle(message, &executor).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::End) => return Ok(()),
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Tear the session down because the host process went away.
    ///
    /// Safe to call at any time and from any task; each call stops the
    /// channel exactly once.
    pub fn handle_host_exit(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SessionState::Ended);
        tracing::info!(?previous, "host exited, tearing down session");
        // Stop before aborting: a launch installed after the abort fails on send.
        self.channel.stop();
        self.launcher.abort_pending();
    }

    fn begin(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Disconnected => {
                *state = SessionState::Connecting;
                Ok(())
            }
            SessionState::Ended => Err(SessionError::SessionEnded),
            _ => Err(SessionError::AlreadyRunning),
        }
    }

    /// Move to `next` unless the session was already torn down.
    fn advance(&self, next: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if *state == SessionState::Ended {
            return Err(SessionError::SessionEnded);
        }
        *state = next;
        Ok(())
    }

    /// Move to `next` and stop the channel, unless a host exit already did.
    fn teardown(&self, next: SessionState) {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Ended {
                return;
            }
            *state = next;
        }
        self.channel.stop();
        self.launcher.abort_pending();
    }

    fn fail(&self, error: SessionError) -> Result<(), SessionError> {
        tracing::error!("design-mode session failed: {error}");
        self.teardown(SessionState::Ended);
        Err(error)
    }

    async fn handshake(&self) -> Result<(), SessionError> {
        self.advance(SessionState::AwaitingVersionAck)?;

        let timeout = self.config.connection_timeout;
        let first = tokio::time::timeout(timeout, self.channel.receive())
            .await
            .map_err(|_| {
                SessionError::ProtocolViolation(format!(
                    "no {} message within {timeout:?}",
                    MessageType::VersionCheck
                ))
            })??;
        if !first.is(&MessageType::VersionCheck) {
            return Err(SessionError::ProtocolViolation(format!(
                "expected {} as first message, received {}",
                MessageType::VersionCheck,
                first.message_type
            )));
        }

        self.channel
            .send(Message::bare(MessageType::SessionConnected))
            .await?;
        self.reply_version(&first).await?;
        self.advance(SessionState::Dispatching)
    }

    async fn reply_version(&self, request: &Message) -> Result<(), SessionError> {
        let ours = self.config.protocol_version;
        let host = request
            .payload
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok());
        let negotiated = host.map_or(ours, |host| host.min(ours));
        *self.negotiated_version.lock() = Some(negotiated);
        tracing::debug!(?host, ours, negotiated, "version check");

        self.channel
            .send(Message::new(MessageType::VersionCheck, ours.into()))
            .await?;
        Ok(())
    }

    async fn handle(
        &self,
        message: Message,
        executor: &Arc<dyn RequestExecutor>,
    ) -> Result<Flow, SessionError> {
        tracing::debug!(message_type = %message.message_type, "received message");

        if let Some(kind) = message.message_type.run_kind() {
            if let Some(payload) = self.decode::<RunRequestPayload>(&message).await? {
                self.dispatch_run(kind, payload, executor);
            }
            return Ok(Flow::Continue);
        }

        match &message.message_type {
            MessageType::VersionCheck => self.reply_version(&message).await?,
            MessageType::StartDiscovery => {
                if let Some(payload) = self.decode::<DiscoveryRequestPayload>(&message).await? {
                    self.dispatch_discovery(payload, executor);
                }
            }
            MessageType::CancelRun => executor.cancel_run(),
            MessageType::AbortRun => executor.abort_run(),
            MessageType::CancelDiscovery => executor.cancel_discovery(),
            // A waiting caller gets an undecodable acknowledgment as an error.
            MessageType::CustomHostLaunchAck => {
                match codec::decode_payload::<CustomHostLaunchAck>(&message) {
                    Ok(ack) => {
                        self.launcher.deliver_launch_ack(ack);
                    }
                    Err(e) => {
                        let text = e.to_string();
                        self.launcher.reject_launch_ack(e);
                        self.report_malformed(&text).await?;
                    }
                }
            }
            MessageType::AttachDebuggerAck => {
                match codec::decode_payload::<DebuggerAttachAck>(&message) {
                    Ok(ack) => {
                        self.launcher.deliver_attach_ack(ack);
                    }
                    Err(e) => {
                        let text = e.to_string();
                        self.launcher.reject_attach_ack(e);
                        self.report_malformed(&text).await?;
                    }
                }
            }
            MessageType::SessionEnd => {
                tracing::info!("host ended the session");
                self.teardown(SessionState::Ended);
                return Ok(Flow::End);
            }
            other => tracing::warn!(message_type = %other, "ignoring unexpected message"),
        }
        Ok(Flow::Continue)
    }

    /// Decode a payload. A malformed payload is reported to the host and
    /// yields `None`; only a failure to report it is an error.
    async fn decode<T: DeserializeOwned>(
        &self,
        message: &Message,
    ) -> Result<Option<T>, SessionError> {
        match codec::decode_payload(message) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                self.report_malformed(&e.to_string()).await?;
                Ok(None)
            }
        }
    }

    async fn report_malformed(&self, text: &str) -> Result<(), SessionError> {
        tracing::warn!("Malformed request: {text}");
        self.sink.send_test_message(MessageLevel::Error, text).await?;
        Ok(())
    }

    fn dispatch_run(
        &self,
        kind: RunKind,
        payload: RunRequestPayload,
        executor: &Arc<dyn RequestExecutor>,
    ) {
        tracing::info!(?kind, test_cases = payload.test_cases.len(), "dispatching run request");
        let executor = Arc::clone(executor);
        let launcher: Arc<dyn HostLauncher> = self.launcher.clone();
        let sink: Arc<dyn ResultSink> = self.sink.clone();
        tokio::spawn(async move {
            executor
                .run_tests(RunRequest { kind, payload }, launcher, sink)
                .await;
        });
    }

    fn dispatch_discovery(
        &self,
        payload: DiscoveryRequestPayload,
        executor: &Arc<dyn RequestExecutor>,
    ) {
        tracing::info!(sources = payload.sources.len(), "dispatching discovery request");
        let executor = Arc::clone(executor);
        let sink: Arc<dyn ResultSink> = self.sink.clone();
        tokio::spawn(async move {
            executor.discover_tests(payload, sink).await;
        });
    }
}
