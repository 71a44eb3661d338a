//! Connection state as seen by request handlers

use std::fmt;

use serde::Serialize;

/// Current view of database reachability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Bootstrap has not started
    Uninitialized,

    /// An attempt is in flight or a retry is pending
    Connecting { attempt: u32 },

    /// A live connection is available
    Connected,

    /// Every attempt failed; terminal until the process restarts
    Failed { error: String, attempts: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "connection not initialized"),
            Self::Connecting { attempt } => {
                write!(f, "connection in progress (attempt {})", attempt)
            }
            Self::Connected => write!(f, "connected"),
            Self::Failed { error, attempts } => {
                write!(f, "connection failed after {} attempts: {}", attempts, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_state_mentions_attempts_and_error() {
        let state = ConnectionState::Failed {
            error: "connection refused".into(),
            attempts: 5,
        };
        let text = state.to_string();
        assert!(text.contains("5 attempts"));
        assert!(text.contains("connection refused"));
        assert!(state.is_failed());
        assert!(!state.is_connected());
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(ConnectionState::Connecting { attempt: 2 }).unwrap();
        assert_eq!(json["state"], "connecting");
        assert_eq!(json["attempt"], 2);
    }
}
