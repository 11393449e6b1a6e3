//! Message envelope and the reserved message-type vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag carried by every message on the channel.
///
/// Unrecognized names are preserved in [`MessageType::Unknown`] so newer
/// hosts can talk to older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Protocol version exchange.
    VersionCheck,
    /// Client acknowledges the connected session.
    SessionConnected,
    /// Host ends the session.
    SessionEnd,
    /// Diagnostic message for the host's output window.
    TestMessage,
    /// Run every test in the given sources on the default host.
    RunAllWithDefaultHost,
    /// Run the given test cases on the default host.
    RunSelectedWithDefaultHost,
    /// Resolve runner start info for running all sources on a custom host.
    StartInfoForRunAll,
    /// Resolve runner start info for running selected cases on a custom host.
    StartInfoForRunSelected,
    /// Client asks the host to launch a custom test host.
    CustomHostLaunch,
    /// Host reports the outcome of a custom host launch.
    CustomHostLaunchAck,
    /// Client asks the host to attach its debugger to a process.
    AttachDebugger,
    /// Host reports the outcome of a debugger attach.
    AttachDebuggerAck,
    /// Host cancels the active run.
    CancelRun,
    /// Host aborts the active run.
    AbortRun,
    /// Run progress.
    RunStatsChange,
    /// Run finished.
    RunComplete,
    /// Start discovering tests.
    StartDiscovery,
    /// Cancel the active discovery.
    CancelDiscovery,
    /// Discovery progress.
    TestsFound,
    /// Discovery finished.
    DiscoveryComplete,
    /// Any name this client does not know.
    Unknown(String),
}

impl MessageType {
    /// Wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::VersionCheck => "ProtocolVersion",
            Self::SessionConnected => "TestSession.Connected",
            Self::SessionEnd => "TestSession.Terminate",
            Self::TestMessage => "TestSession.Message",
            Self::RunAllWithDefaultHost => "TestExecution.RunAllWithDefaultHost",
            Self::RunSelectedWithDefaultHost => "TestExecution.RunSelectedWithDefaultHost",
            Self::StartInfoForRunAll => "TestExecution.GetTestRunnerProcessStartInfoForRunAll",
            Self::StartInfoForRunSelected => {
                "TestExecution.GetTestRunnerProcessStartInfoForRunSelected"
            }
            Self::CustomHostLaunch => "TestExecution.CustomTestHostLaunch",
            Self::CustomHostLaunchAck => "TestExecution.CustomTestHostLaunchCallback",
            Self::AttachDebugger => "TestExecution.EditorAttachDebugger",
            Self::AttachDebuggerAck => "TestExecution.EditorAttachDebuggerCallback",
            Self::CancelRun => "TestExecution.Cancel",
            Self::AbortRun => "TestExecution.Abort",
            Self::RunStatsChange => "TestExecution.StatsChange",
            Self::RunComplete => "TestExecution.Completed",
            Self::StartDiscovery => "TestDiscovery.Start",
            Self::CancelDiscovery => "TestDiscovery.Cancel",
            Self::TestsFound => "TestDiscovery.TestFound",
            Self::DiscoveryComplete => "TestDiscovery.Completed",
            Self::Unknown(name) => name,
        }
    }

    /// The run-request variant this type starts, if any.
    #[must_use]
    pub const fn run_kind(&self) -> Option<RunKind> {
        match self {
            Self::RunAllWithDefaultHost => Some(RunKind::AllWithDefaultHost),
            Self::RunSelectedWithDefaultHost => Some(RunKind::SelectedWithDefaultHost),
            Self::StartInfoForRunAll => Some(RunKind::StartInfoForAll),
            Self::StartInfoForRunSelected => Some(RunKind::StartInfoForSelected),
            _ => None,
        }
    }
}

impl From<&str> for MessageType {
    fn from(name: &str) -> Self {
        match name {
            "ProtocolVersion" => Self::VersionCheck,
            "TestSession.Connected" => Self::SessionConnected,
            "TestSession.Terminate" => Self::SessionEnd,
            "TestSession.Message" => Self::TestMessage,
            "TestExecution.RunAllWithDefaultHost" => Self::RunAllWithDefaultHost,
            "TestExecution.RunSelectedWithDefaultHost" => Self::RunSelectedWithDefaultHost,
            "TestExecution.GetTestRunnerProcessStartInfoForRunAll" => Self::StartInfoForRunAll,
            "TestExecution.GetTestRunnerProcessStartInfoForRunSelected" => {
                Self::StartInfoForRunSelected
            }
            "TestExecution.CustomTestHostLaunch" => Self::CustomHostLaunch,
            "TestExecution.CustomTestHostLaunchCallback" => Self::CustomHostLaunchAck,
            "TestExecution.EditorAttachDebugger" => Self::AttachDebugger,
            "TestExecution.EditorAttachDebuggerCallback" => Self::AttachDebuggerAck,
            "TestExecution.Cancel" => Self::CancelRun,
            "TestExecution.Abort" => Self::AbortRun,
            "TestExecution.StatsChange" => Self::RunStatsChange,
            "TestExecution.Completed" => Self::RunComplete,
            "TestDiscovery.Start" => Self::StartDiscovery,
            "TestDiscovery.Cancel" => Self::CancelDiscovery,
            "TestDiscovery.TestFound" => Self::TestsFound,
            "TestDiscovery.Completed" => Self::DiscoveryComplete,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<MessageType> for String {
    fn from(ty: MessageType) -> Self {
        match ty {
            MessageType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-request variants the host can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Run all tests in the payload's sources on the default host.
    AllWithDefaultHost,
    /// Run the payload's test cases on the default host.
    SelectedWithDefaultHost,
    /// Produce start info for running all sources; the host launches the process.
    StartInfoForAll,
    /// Produce start info for the payload's test cases; the host launches the process.
    StartInfoForSelected,
}

impl RunKind {
    /// Whether the executor is expected to go through the custom host launcher.
    #[must_use]
    pub const fn uses_custom_host(self) -> bool {
        matches!(self, Self::StartInfoForAll | Self::StartInfoForSelected)
    }
}

/// A single message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Type tag.
    pub message_type: MessageType,
    /// Payload, typed only once decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    /// Create a message with a payload.
    #[must_use]
    pub const fn new(message_type: MessageType, payload: Value) -> Self {
        Self {
            message_type,
            payload: Some(payload),
        }
    }

    /// Create a message without a payload.
    #[must_use]
    pub const fn bare(message_type: MessageType) -> Self {
        Self {
            message_type,
            payload: None,
        }
    }

    /// Whether this message has the given type.
    #[must_use]
    pub fn is(&self, message_type: &MessageType) -> bool {
        &self.message_type == message_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_map_back() {
        for ty in [
            MessageType::VersionCheck,
            MessageType::SessionEnd,
            MessageType::StartInfoForRunSelected,
            MessageType::CustomHostLaunchAck,
            MessageType::StartDiscovery,
        ] {
            assert_eq!(MessageType::from(ty.as_str()), ty);
        }
    }

    #[test]
    fn test_unknown_name_is_preserved() {
        let ty = MessageType::from("TestSession.SomethingNew");
        assert_eq!(ty, MessageType::Unknown("TestSession.SomethingNew".to_string()));
        assert_eq!(String::from(ty), "TestSession.SomethingNew");
    }

    #[test]
    fn test_run_kinds() {
        assert_eq!(
            MessageType::RunSelectedWithDefaultHost.run_kind(),
            Some(RunKind::SelectedWithDefaultHost)
        );
        assert!(MessageType::StartInfoForRunAll.run_kind().unwrap().uses_custom_host());
        assert!(!RunKind::AllWithDefaultHost.uses_custom_host());
        assert_eq!(MessageType::SessionEnd.run_kind(), None);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::new(MessageType::VersionCheck, serde_json::json!(7));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"messageType\":\"ProtocolVersion\""));

        let bare = serde_json::to_string(&Message::bare(MessageType::SessionEnd)).unwrap();
        assert!(!bare.contains("payload"));
    }
}
