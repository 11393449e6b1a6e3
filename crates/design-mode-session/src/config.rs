//! Session configuration.

use std::time::Duration;

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 7;

/// Default bound for the host to accept the connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Default bound for the host to acknowledge a launch or attach request.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(90);

/// Timeouts and protocol version for a session.
///
/// Every blocking wait in a session is bounded by one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the host to accept the connection.
    pub connection_timeout: Duration,
    /// How long a launch or attach request waits for its acknowledgment.
    pub launch_timeout: Duration,
    /// Version sent in the handshake reply.
    pub protocol_version: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl SessionConfig {
    /// Configuration from the environment, falling back to defaults.
    ///
    /// - `DESIGN_MODE_CONNECTION_TIMEOUT_MS`
    /// - `DESIGN_MODE_LAUNCH_TIMEOUT_MS`
    /// - `DESIGN_MODE_PROTOCOL_VERSION`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        };
        Self {
            connection_timeout: millis("DESIGN_MODE_CONNECTION_TIMEOUT_MS")
                .unwrap_or(defaults.connection_timeout),
            launch_timeout: millis("DESIGN_MODE_LAUNCH_TIMEOUT_MS")
                .unwrap_or(defaults.launch_timeout),
            protocol_version: lookup("DESIGN_MODE_PROTOCOL_VERSION")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.protocol_version),
        }
    }

    /// Override the connection timeout.
    #[must_use]
    pub const fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Override the launch timeout.
    #[must_use]
    pub const fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}
