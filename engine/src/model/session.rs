//! Session state machine and application descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a UI-framework Session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl SessionState {
    /// Whether `self -> next` is a permitted transition. Every state may
    /// move to `Stopped` (the process can always die), but otherwise the
    /// lifecycle only moves forward: Starting -> Running -> Stopping ->
    /// Stopped, with a side exit into Error from Starting or Running.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if next == Stopped {
            return matches!(self, Starting | Running | Stopping);
        }

        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Error)
                | (Running, Stopping)
                | (Running, Error)
                | (Stopping, Error)
        )
    }
}

/// Static information about the application a Session is attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_id: String,
    pub device_id: String,
    pub project_directory: Option<PathBuf>,
    pub supports_restart: bool,
    pub vm_service_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_permitted() {
        assert!(SessionState::Starting.can_transition_to(SessionState::Running));
        assert!(SessionState::Running.can_transition_to(SessionState::Stopping));
        assert!(SessionState::Stopping.can_transition_to(SessionState::Stopped));
    }

    #[test]
    fn any_state_may_die_into_stopped() {
        assert!(SessionState::Starting.can_transition_to(SessionState::Stopped));
        assert!(SessionState::Running.can_transition_to(SessionState::Stopped));
        assert!(SessionState::Stopping.can_transition_to(SessionState::Stopped));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!SessionState::Running.can_transition_to(SessionState::Starting));
        assert!(!SessionState::Stopped.can_transition_to(SessionState::Running));
        assert!(!SessionState::Stopping.can_transition_to(SessionState::Running));
    }

    #[test]
    fn error_is_terminal() {
        assert!(!SessionState::Error.can_transition_to(SessionState::Running));
        assert!(!SessionState::Error.can_transition_to(SessionState::Stopped));
    }
}
