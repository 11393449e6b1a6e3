//! Single-outstanding request/acknowledgment hand-off.
//!
//! The session loop owns message arrival, a waiting caller owns the result.
//! There is no correlation id on the wire, so a slot holds at most one
//! outstanding request and the next acknowledgment fulfills it.

use std::time::Duration;

use design_mode_core::LaunchError;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Outcome of waiting on a [`Ticket`].
#[derive(Debug, PartialEq, Eq)]
pub enum Wait<T> {
    /// The acknowledgment arrived.
    Delivered(T),
    /// No acknowledgment within the bound.
    TimedOut,
    /// The slot was aborted while waiting.
    Aborted,
}

/// Claim on an installed slot.
#[derive(Debug)]
pub struct Ticket<T> {
    generation: u64,
    receiver: oneshot::Receiver<T>,
}

struct State<T> {
    generation: u64,
    sender: Option<oneshot::Sender<T>>,
}

/// One-shot result cell for a single outstanding request.
pub struct PendingSlot<T> {
    kind: &'static str,
    state: Mutex<State<T>>,
}

impl<T> PendingSlot<T> {
    /// Create an empty slot. `kind` names the request in errors and logs.
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Mutex::new(State {
                generation: 0,
                sender: None,
            }),
        }
    }

    /// Install a pending request.
    ///
    /// # Errors
    /// Returns `LaunchError::InProgress` if a request is already outstanding.
    pub fn install(&self) -> Result<Ticket<T>, LaunchError> {
        let mut state = self.state.lock();
        // A closed sender belongs to a waiter that went away without releasing.
        if state.sender.as_ref().is_some_and(|s| !s.is_closed()) {
            return Err(LaunchError::InProgress(self.kind));
        }
        let (sender, receiver) = oneshot::channel();
        state.generation += 1;
        state.sender = Some(sender);
        Ok(Ticket {
            generation: state.generation,
            receiver,
        })
    }

    /// Deliver an acknowledgment. Returns `false` if nothing was waiting, in
    /// which case the value is dropped.
    pub fn fulfill(&self, value: T) -> bool {
        let sender = self.state.lock().sender.take();
        match sender {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Remove the pending request installed for `ticket`, if still present.
    fn release(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.sender = None;
        }
    }

    /// Drop any pending request; its waiter sees [`Wait::Aborted`].
    pub fn abort(&self) -> bool {
        self.state.lock().sender.take().is_some()
    }

    /// Whether a request is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state
            .lock()
            .sender
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }

    /// Give up on `ticket` without waiting, e.g. after its request failed to send.
    pub fn cancel(&self, ticket: Ticket<T>) {
        self.release(ticket.generation);
    }

    /// Wait for the acknowledgment of `ticket`, at most `timeout`.
    pub async fn wait(&self, ticket: Ticket<T>, timeout: Duration) -> Wait<T> {
        let Ticket {
            generation,
            receiver,
        } = ticket;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(value)) => Wait::Delivered(value),
            Ok(Err(_)) => Wait::Aborted,
            Err(_) => {
                self.release(generation);
                tracing::debug!(kind = self.kind, ?timeout, "pending request timed out");
                Wait::TimedOut
            }
        }
    }
}
