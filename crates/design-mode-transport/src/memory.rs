//! In-process channel.
//!
//! [`pair`] returns the client end, which implements [`Channel`], and a
//! [`HostEnd`] that plays the controlling host: it accepts the connection,
//! pushes messages to the client and observes everything the client sends.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use design_mode_core::{Channel, ChannelError, Endpoint, Message};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

/// Client end of an in-process channel.
pub struct MemoryChannel {
    endpoint: Arc<Mutex<Option<Endpoint>>>,
    accepted: watch::Receiver<bool>,
    stopped: watch::Sender<bool>,
    stop_calls: Arc<AtomicUsize>,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

/// Host end of an in-process channel.
pub struct HostEnd {
    endpoint: Arc<Mutex<Option<Endpoint>>>,
    accept: watch::Sender<bool>,
    stopped: watch::Receiver<bool>,
    stop_calls: Arc<AtomicUsize>,
    to_client: mpsc::UnboundedSender<Message>,
    from_client: mpsc::UnboundedReceiver<Message>,
}

/// Create a connected client/host pair.
#[must_use]
pub fn pair() -> (MemoryChannel, HostEnd) {
    let endpoint = Arc::new(Mutex::new(None));
    let stop_calls = Arc::new(AtomicUsize::new(0));
    let (accept_tx, accept_rx) = watch::channel(false);
    let (stopped_tx, stopped_rx) = watch::channel(false);
    let (client_tx, host_rx) = mpsc::unbounded_channel();
    let (host_tx, client_rx) = mpsc::unbounded_channel();

    let client = MemoryChannel {
        endpoint: Arc::clone(&endpoint),
        accepted: accept_rx,
        stopped: stopped_tx,
        stop_calls: Arc::clone(&stop_calls),
        outbound: client_tx,
        inbound: tokio::sync::Mutex::new(client_rx),
    };
    let host = HostEnd {
        endpoint,
        accept: accept_tx,
        stopped: stopped_rx,
        stop_calls,
        to_client: host_tx,
        from_client: host_rx,
    };
    (client, host)
}

impl MemoryChannel {
    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), ChannelError> {
        if self.is_stopped() {
            return Err(ChannelError::Closed);
        }
        tracing::debug!(%endpoint, "in-process channel connecting");
        *self.endpoint.lock() = Some(endpoint.clone());
        Ok(())
    }

    async fn wait_for_acceptance(&self, timeout: Duration) -> bool {
        if self.endpoint.lock().is_none() {
            return false;
        }
        let mut accepted = self.accepted.clone();
        let mut stopped = self.stopped.subscribe();
        let wait = async {
            tokio::select! {
                biased;
                _ = stopped.wait_for(|stopped| *stopped) => false,
                result = accepted.wait_for(|accepted| *accepted) => result.is_ok(),
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    async fn send(&self, message: Message) -> Result<(), ChannelError> {
        if self.is_stopped() {
            return Err(ChannelError::Closed);
        }
        if self.endpoint.lock().is_none() {
            return Err(ChannelError::NotConnected);
        }
        self.outbound.send(message).map_err(|_| ChannelError::Closed)
    }

    async fn receive(&self) -> Result<Message, ChannelError> {
        let mut stopped = self.stopped.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = stopped.wait_for(|stopped| *stopped) => Err(ChannelError::Closed),
            message = inbound.recv() => message.ok_or(ChannelError::Closed),
        }
    }

    fn stop(&self) {
        let calls = self.stop_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let was_stopped = self.stopped.send_replace(true);
        tracing::debug!(calls, was_stopped, "in-process channel stopped");
    }
}

impl HostEnd {
    /// Accept the client's connection.
    pub fn accept(&self) {
        self.accept.send_replace(true);
    }

    /// Endpoint the client connected to, if it has.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.lock().clone()
    }

    /// Push a message to the client.
    ///
    /// # Errors
    /// Returns error if the client end has been dropped.
    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        self.to_client.send(message).map_err(|_| ChannelError::Closed)
    }

    /// Next message sent by the client, or `None` once the client end is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_client.recv().await
    }

    /// Next message sent by the client, waiting at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    /// Message already sent by the client, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.from_client.try_recv().ok()
    }

    /// Whether the client has stopped the channel.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Number of times the client called `stop`.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use design_mode_core::MessageType;
    use tokio_test::{assert_err, assert_ok};

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_acceptance_requires_connect_and_accept() {
        let (client, host) = pair();
        assert!(!client.wait_for_acceptance(SHORT).await);

        assert_ok!(client.connect(&Endpoint::localhost(4000)).await);
        assert!(!client.wait_for_acceptance(SHORT).await);

        host.accept();
        assert!(client.wait_for_acceptance(SHORT).await);
        assert_eq!(host.endpoint(), Some(Endpoint::localhost(4000)));
    }

    #[tokio::test]
    async fn test_stop_interrupts_acceptance_wait() {
        let (client, host) = pair();
        let client = std::sync::Arc::new(client);
        assert_ok!(client.connect(&Endpoint::localhost(4000)).await);

        let waiter = {
            let client = std::sync::Arc::clone(&client);
            tokio::spawn(async move { client.wait_for_acceptance(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(SHORT).await;
        client.stop();

        let accepted = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!accepted);
        host.accept();
        assert!(!client.wait_for_acceptance(SHORT).await);
    }

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (client, mut host) = pair();
        assert_ok!(client.connect(&Endpoint::localhost(4000)).await);

        assert_ok!(host.send(Message::new(MessageType::VersionCheck, serde_json::json!(7))));
        let received = assert_ok!(client.receive().await);
        assert!(received.is(&MessageType::VersionCheck));

        assert_ok!(client.send(Message::bare(MessageType::SessionConnected)).await);
        let sent = host.recv().await.unwrap();
        assert!(sent.is(&MessageType::SessionConnected));
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let (client, _host) = pair();
        let result = client.send(Message::bare(MessageType::SessionConnected)).await;
        assert!(matches!(result, Err(ChannelError::NotConnected)));
    }

    #[tokio::test]
    async fn test_stop_wakes_pending_receive() {
        let (client, host) = pair();
        let client = Arc::new(client);
        assert_ok!(client.connect(&Endpoint::localhost(4000)).await);

        let reader = Arc::clone(&client);
        let pending = tokio::spawn(async move { reader.receive().await });
        tokio::time::sleep(SHORT).await;
        client.stop();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(ChannelError::Closed)));
        assert!(host.is_stopped());
        assert_err!(client.send(Message::bare(MessageType::SessionEnd)).await);
    }

    #[tokio::test]
    async fn test_stop_counts_every_call() {
        let (client, host) = pair();
        client.stop();
        client.stop();
        assert_eq!(host.stop_count(), 2);
        assert!(host.is_stopped());
    }
}
