//! Registry holding the process's active session controller.

use std::sync::Arc;

use design_mode_core::Channel;
use parking_lot::RwLock;

use crate::{config::SessionConfig, controller::SessionController};

/// Owner of the active [`SessionController`].
///
/// Created once by the composition root and passed to whatever needs the
/// controller; holds at most one controller at a time.
#[derive(Default)]
pub struct ControllerRegistry {
    active: RwLock<Option<Arc<SessionController>>>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last initialized controller, if any.
    #[must_use]
    pub fn instance(&self) -> Option<Arc<SessionController>> {
        self.active.read().clone()
    }

    /// Return the active controller, creating one on `channel` if there is none.
    pub fn initialize(
        &self,
        channel: Arc<dyn Channel>,
        config: SessionConfig,
    ) -> Arc<SessionController> {
        let mut active = self.active.write();
        if let Some(controller) = active.as_ref() {
            return Arc::clone(controller);
        }
        let controller = Arc::new(SessionController::new(channel, config));
        *active = Some(Arc::clone(&controller));
        tracing::debug!("session controller initialized");
        controller
    }

    /// Install a fresh controller, returning the one it replaces.
    pub fn replace(&self, controller: SessionController) -> Option<Arc<SessionController>> {
        self.active.write().replace(Arc::new(controller))
    }
}
