//! Directives and observability events emitted by the state machine.

use crate::fsm::SessionState;
use serde::{Deserialize, Serialize};

/// Path of the sign-in view.
pub const LOGIN_PATH: &str = "/";

/// Path of the main categorized-email view.
pub const MAIN_VIEW_PATH: &str = "/categorized-emails";

/// Corrective message for a poisoned delegated token.
pub const REAUTH_REQUIRED_NOTICE: &str =
    "Your Google authentication has expired. Please sign in again to refresh your access.";

/// Corrective message for a rejected or expired session.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please log in again.";

/// A routing instruction for the (out-of-scope) navigation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationDirective {
    /// Target path.
    pub path: String,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// Explanatory message to surface on the target view, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl NavigationDirective {
    /// Directive without a notice.
    pub fn to(path: &str) -> Self {
        Self {
            path: path.to_string(),
            replace: true,
            notice: None,
        }
    }

    /// Directive carrying an explanatory message.
    pub fn with_notice(path: &str, notice: &str) -> Self {
        Self {
            path: path.to_string(),
            replace: true,
            notice: Some(notice.to_string()),
        }
    }
}

/// One state transition, published for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// State before the transition.
    pub from: SessionState,
    /// State after the transition.
    pub to: SessionState,
    /// The input that caused it.
    pub trigger: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_constructors() {
        let nav = NavigationDirective::to(MAIN_VIEW_PATH);
        assert_eq!(nav.path, "/categorized-emails");
        assert!(nav.replace);
        assert!(nav.notice.is_none());

        let nav = NavigationDirective::with_notice(LOGIN_PATH, SESSION_EXPIRED_NOTICE);
        assert_eq!(nav.path, "/");
        assert_eq!(nav.notice.as_deref(), Some(SESSION_EXPIRED_NOTICE));
    }

    #[test]
    fn test_transition_event_serializes() {
        let event = TransitionEvent {
            from: SessionState::Anonymous,
            to: SessionState::Authenticating,
            trigger: "SignedIn".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("anonymous"));
        assert!(json.contains("authenticating"));
    }
}
