//! Transports for the design-mode protocol.
//!
//! Provides:
//! - In-process channel (`memory::pair`) for embedding and tests

pub mod memory;

pub use memory::{HostEnd, MemoryChannel, pair};
