//! Wait budget resolution.
//!
//! A blocking call waits for at most one duration, chosen in this order:
//! the command's own override, the connection's per-command timeout for
//! the command name, the connection timeout, then [`DEFAULT_COMMAND_TIMEOUT`].

use std::collections::HashMap;
use std::time::Duration;

/// Wait budget used when nothing more specific is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeouts configured for one connection.
///
/// Built once when the connection is created and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutPolicy {
    command_timeout: Option<Duration>,
    per_command: HashMap<String, Duration>,
}

impl TimeoutPolicy {
    /// Policy with no configured timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection-wide command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Set the timeout for one command name (case-insensitive).
    pub fn with_timeout_for(mut self, command: &str, timeout: Duration) -> Self {
        self.per_command.insert(command.to_uppercase(), timeout);
        self
    }

    /// Connection-wide command timeout, if configured.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Timeout configured for a command name, if any.
    pub fn timeout_for(&self, command: &str) -> Option<Duration> {
        if let Some(t) = self.per_command.get(command) {
            return Some(*t);
        }
        self.per_command.get(&command.to_uppercase()).copied()
    }
}

/// Resolve the wait budget for a command.
///
/// A zero result means "check once, do not wait".
pub fn resolve_timeout(
    command: &str,
    override_timeout: Option<Duration>,
    policy: &TimeoutPolicy,
) -> Duration {
    override_timeout
        .or_else(|| policy.timeout_for(command))
        .or(policy.command_timeout)
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let policy = TimeoutPolicy::new()
            .with_command_timeout(Duration::from_secs(2))
            .with_timeout_for("blpop", Duration::from_secs(30));

        assert_eq!(
            resolve_timeout("GET", Some(Duration::from_millis(100)), &policy),
            Duration::from_millis(100)
        );
        assert_eq!(
            resolve_timeout("BLPOP", None, &policy),
            Duration::from_secs(30)
        );
        assert_eq!(resolve_timeout("GET", None, &policy), Duration::from_secs(2));
    }

    #[test]
    fn test_override_beats_per_command() {
        let policy = TimeoutPolicy::new().with_timeout_for("BLPOP", Duration::from_secs(30));
        assert_eq!(
            resolve_timeout("BLPOP", Some(Duration::from_secs(1)), &policy),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_default_when_unconfigured() {
        assert_eq!(
            resolve_timeout("GET", None, &TimeoutPolicy::new()),
            DEFAULT_COMMAND_TIMEOUT
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let policy = TimeoutPolicy::new().with_timeout_for("Eval", Duration::from_secs(9));
        assert_eq!(policy.timeout_for("EVAL"), Some(Duration::from_secs(9)));
        assert_eq!(policy.timeout_for("eval"), Some(Duration::from_secs(9)));
        assert_eq!(policy.timeout_for("GET"), None);
    }

    #[test]
    fn test_zero_is_preserved() {
        let policy = TimeoutPolicy::new().with_command_timeout(Duration::ZERO);
        assert_eq!(resolve_timeout("GET", None, &policy), Duration::ZERO);
    }
}
