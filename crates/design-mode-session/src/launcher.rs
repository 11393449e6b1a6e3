//! Custom host launch and debugger attach over the session channel.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use design_mode_core::{
    Channel, CodecError, CustomHostLaunchAck, DebuggerAttachAck, HostLauncher, LaunchError,
    LaunchOutcome, MessageType, TestProcessStartInfo, codec, payload::AttachDebuggerRequest,
};

use crate::slot::{PendingSlot, Wait};

const LAUNCH: &str = "custom host launch";
const ATTACH: &str = "debugger attach";

/// Turns the host's asynchronous acknowledgments into call results.
///
/// Callers wait on their own task; the session loop delivers acknowledgments
/// through [`deliver_launch_ack`](Self::deliver_launch_ack) and
/// [`deliver_attach_ack`](Self::deliver_attach_ack) and never waits itself.
/// An acknowledgment that fails to decode still ends the wait, through
/// [`reject_launch_ack`](Self::reject_launch_ack) and
/// [`reject_attach_ack`](Self::reject_attach_ack).
pub struct HostLaunchCoordinator {
    channel: Arc<dyn Channel>,
    timeout: Duration,
    launch: PendingSlot<Result<CustomHostLaunchAck, CodecError>>,
    attach: PendingSlot<Result<DebuggerAttachAck, CodecError>>,
}

impl HostLaunchCoordinator {
    /// Create a coordinator sending requests on `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            launch: PendingSlot::new(LAUNCH),
            attach: PendingSlot::new(ATTACH),
        }
    }

    /// Hand a launch acknowledgment to the waiting caller. Returns `false`
    /// when no launch is outstanding and the acknowledgment was dropped.
    pub fn deliver_launch_ack(&self, ack: CustomHostLaunchAck) -> bool {
        self.settle_launch(Ok(ack))
    }

    /// Fail the waiting launch with an acknowledgment that did not decode.
    pub fn reject_launch_ack(&self, error: CodecError) -> bool {
        self.settle_launch(Err(error))
    }

    /// Hand a debugger attach acknowledgment to the waiting caller.
    pub fn deliver_attach_ack(&self, ack: DebuggerAttachAck) -> bool {
        self.settle_attach(Ok(ack))
    }

    /// Fail the waiting attach with an acknowledgment that did not decode.
    pub fn reject_attach_ack(&self, error: CodecError) -> bool {
        self.settle_attach(Err(error))
    }

    fn settle_launch(&self, ack: Result<CustomHostLaunchAck, CodecError>) -> bool {
        let delivered = self.launch.fulfill(ack);
        if !delivered {
            tracing::debug!("dropping launch acknowledgment with no pending launch");
        }
        delivered
    }

    fn settle_attach(&self, ack: Result<DebuggerAttachAck, CodecError>) -> bool {
        let delivered = self.attach.fulfill(ack);
        if !delivered {
            tracing::debug!("dropping attach acknowledgment with no pending attach");
        }
        delivered
    }

    /// Fail any outstanding launch or attach with `LaunchError::Aborted`.
    pub fn abort_pending(&self) {
        let launch = self.launch.abort();
        let attach = self.attach.abort();
        if launch || attach {
            tracing::info!(launch, attach, "aborted pending host requests");
        }
    }

    /// Whether a launch is waiting for its acknowledgment.
    #[must_use]
    pub fn launch_pending(&self) -> bool {
        self.launch.is_pending()
    }
}

#[async_trait]
impl HostLauncher for HostLaunchCoordinator {
    async fn launch_custom_host(
        &self,
        start_info: TestProcessStartInfo,
    ) -> Result<u32, LaunchError> {
        let request = codec::message_with(MessageType::CustomHostLaunch, &start_info)?;
        // Install before sending so a fast acknowledgment is not missed.
        let ticket = self.launch.install()?;
        if let Err(e) = self.channel.send(request).await {
            self.launch.cancel(ticket);
            return Err(e.into());
        }
        tracing::info!(file_name = %start_info.file_name, "requested custom host launch");

        match self.launch.wait(ticket, self.timeout).await {
            Wait::Delivered(Err(e)) => {
                tracing::warn!("malformed launch acknowledgment: {e}");
                Err(e.into())
            }
            Wait::Delivered(Ok(ack)) => match ack.outcome() {
                LaunchOutcome::Launched(pid) => {
                    tracing::info!(pid, "custom host launched");
                    Ok(pid)
                }
                LaunchOutcome::Failed(message) => {
                    tracing::warn!(%message, "custom host launch failed");
                    Err(LaunchError::HostLaunchFailed(message))
                }
                LaunchOutcome::Invalid(pid) => Err(LaunchError::InvalidAcknowledgment(pid)),
            },
            Wait::TimedOut => Err(LaunchError::HostLaunchTimeout(self.timeout)),
            Wait::Aborted => Err(LaunchError::Aborted(LAUNCH)),
        }
    }

    async fn attach_debugger(&self, process_id: u32) -> Result<bool, LaunchError> {
        let request = codec::message_with(
            MessageType::AttachDebugger,
            &AttachDebuggerRequest { process_id },
        )?;
        let ticket = self.attach.install()?;
        if let Err(e) = self.channel.send(request).await {
            self.attach.cancel(ticket);
            return Err(e.into());
        }

        match self.attach.wait(ticket, self.timeout).await {
            Wait::Delivered(Err(e)) => {
                tracing::warn!("malformed attach acknowledgment: {e}");
                Err(e.into())
            }
            Wait::Delivered(Ok(DebuggerAttachAck {
                error_message: Some(message),
                ..
            })) => Err(LaunchError::DebuggerAttachFailed(message)),
            Wait::Delivered(Ok(ack)) => Ok(ack.attached),
            Wait::TimedOut => Err(LaunchError::DebuggerAttachTimeout(self.timeout)),
            Wait::Aborted => Err(LaunchError::Aborted(ATTACH)),
        }
    }
}
