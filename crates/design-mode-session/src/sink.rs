//! Result sink writing executor output back to the host.

use std::sync::Arc;

use async_trait::async_trait;
use design_mode_core::{
    Channel, ChannelError, Message, MessageLevel, MessageType, ResultSink, TestMessagePayload,
    codec,
};

/// [`ResultSink`] backed by the session channel's send path.
#[derive(Clone)]
pub struct ChannelSink {
    channel: Arc<dyn Channel>,
}

impl ChannelSink {
    /// Create a sink sending on `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn send(&self, message: Message) -> Result<(), ChannelError> {
        self.channel.send(message).await
    }

    async fn send_test_message(
        &self,
        level: MessageLevel,
        text: &str,
    ) -> Result<(), ChannelError> {
        let message = codec::message_with(
            MessageType::TestMessage,
            &TestMessagePayload::new(level, text),
        )?;
        self.channel.send(message).await
    }
}
