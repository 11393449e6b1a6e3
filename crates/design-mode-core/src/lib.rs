//! Core types for the design-mode protocol client.
//!
//! This crate provides the shared building blocks:
//! - `Message` / `MessageType` - Envelope and reserved type vocabulary
//! - Payloads - Run, discovery, launch and diagnostic payloads
//! - `codec` - JSON envelope and payload decoding
//! - Channel, executor, launcher and sink traits

pub mod codec;
pub mod message;
pub mod payload;
pub mod traits;

pub use codec::CodecError;
pub use message::{Message, MessageType, RunKind};
pub use payload::{
    CustomHostLaunchAck, DebuggerAttachAck, DiscoveryRequestPayload, LaunchOutcome,
    MessageLevel, RunRequestPayload, TestCase, TestMessagePayload, TestProcessStartInfo, Trait,
};
pub use traits::{
    Channel, ChannelError, Endpoint, HostLauncher, LaunchError, RequestExecutor, ResultSink,
    RunRequest,
};
