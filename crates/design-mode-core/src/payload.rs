//! Typed payloads carried by design-mode messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name/value metadata attached to a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trait {
    pub name: String,
    pub value: String,
}

impl Trait {
    /// Create a new trait.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single test case as exchanged with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Stable identifier.
    pub id: Uuid,
    /// Fully qualified test name.
    pub fully_qualified_name: String,
    /// URI of the adapter that executes this test.
    pub executor_uri: String,
    /// Source (assembly, module, file) containing the test.
    pub source: String,
    /// Name shown in the host's UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Ordered traits.
    #[serde(default)]
    pub traits: Vec<Trait>,
}

impl TestCase {
    /// Create a test case with a fresh id and no traits.
    #[must_use]
    pub fn new(
        fully_qualified_name: impl Into<String>,
        executor_uri: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fully_qualified_name: fully_qualified_name.into(),
            executor_uri: executor_uri.into(),
            source: source.into(),
            display_name: None,
            traits: Vec::new(),
        }
    }

    /// Append a trait.
    #[must_use]
    pub fn with_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.push(Trait::new(name, value));
        self
    }
}

/// Payload of every run-request message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequestPayload {
    /// Opaque settings blob forwarded to the executor untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
    /// Test cases to run, in host order.
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Sources to run when no test cases are selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Keep the test host alive after the run.
    #[serde(default)]
    pub keep_alive: bool,
    /// The host intends to debug the run.
    #[serde(default)]
    pub debugging_enabled: bool,
}

/// Payload of a discovery request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequestPayload {
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
}

/// Everything the host needs to start a custom test host process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProcessStartInfo {
    pub file_name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment_variables: HashMap<String, String>,
    #[serde(default)]
    pub custom_properties: HashMap<String, String>,
}

impl TestProcessStartInfo {
    /// Create start info for an executable with arguments.
    #[must_use]
    pub fn new(file_name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            arguments: arguments.into(),
            ..Self::default()
        }
    }
}

/// Host's answer to a custom host launch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomHostLaunchAck {
    /// Zero when the host omits it.
    #[serde(default)]
    pub host_process_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Classified outcome of a [`CustomHostLaunchAck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The host started a process with this id.
    Launched(u32),
    /// The host reported a failure.
    Failed(String),
    /// Neither a usable id nor an error message.
    Invalid(i32),
}

impl CustomHostLaunchAck {
    /// Successful acknowledgment.
    #[must_use]
    pub const fn launched(host_process_id: i32) -> Self {
        Self {
            host_process_id,
            error_message: None,
        }
    }

    /// Failed acknowledgment.
    #[must_use]
    pub fn failed(host_process_id: i32, error_message: impl Into<String>) -> Self {
        Self {
            host_process_id,
            error_message: Some(error_message.into()),
        }
    }

    /// Classify this acknowledgment. An error message wins over any id.
    #[must_use]
    pub fn outcome(&self) -> LaunchOutcome {
        if let Some(message) = &self.error_message {
            return LaunchOutcome::Failed(message.clone());
        }
        match u32::try_from(self.host_process_id) {
            Ok(pid) if pid > 0 => LaunchOutcome::Launched(pid),
            _ => LaunchOutcome::Invalid(self.host_process_id),
        }
    }
}

/// Host's answer to a debugger attach request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerAttachAck {
    #[serde(default)]
    pub attached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Payload of a debugger attach request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachDebuggerRequest {
    pub process_id: u32,
}

/// Severity of a [`TestMessagePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Informational,
    Warning,
    Error,
}

/// Diagnostic text for the host's output window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMessagePayload {
    pub message_level: MessageLevel,
    pub message: String,
}

impl TestMessagePayload {
    /// Create a diagnostic message.
    #[must_use]
    pub fn new(message_level: MessageLevel, message: impl Into<String>) -> Self {
        Self {
            message_level,
            message: message.into(),
        }
    }
}
