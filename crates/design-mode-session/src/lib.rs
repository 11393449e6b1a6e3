//! Design-mode session client.
//!
//! Provides:
//! - `SessionController` - Connect, handshake and dispatch loop
//! - `HostLaunchCoordinator` - Custom host launch / debugger attach hand-off
//! - `ControllerRegistry` - Holder of the active controller
//! - `SessionConfig` - Timeouts and protocol version

pub mod config;
pub mod controller;
pub mod launcher;
pub mod registry;
pub mod sink;
pub mod slot;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionError, SessionState};
pub use launcher::HostLaunchCoordinator;
pub use registry::ControllerRegistry;
pub use sink::ChannelSink;
