//! Session flow state machine using rust-fsm.
//!
//! This module defines an explicit finite state machine for the session
//! lifecycle, replacing implicit state derivation from scattered callbacks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    Anonymous    │ (initial)
//! └────────┬────────┘
//!          │ SignedIn
//!          ▼
//! ┌─────────────────┐  PoisonedToken / OnboardingUnauthorized  ┌─────────────────┐
//! │  Authenticating │ ───────────────────────────────────────► │  ReauthRequired │
//! └────────┬────────┘                                          └────────┬────────┘
//!          │ OnboardingSucceeded                                        │ SignedIn
//!          ▼                                                            ▼
//! ┌─────────────────┐  Unauthorized   ┌─────────────────┐       (back to
//! │  Authenticated  │ ──────────────► │   SigningOut    │        Authenticating)
//! └────────┬────────┘                 └────────┬────────┘
//!          │ TokenRefreshed                    │ SignOutComplete
//!          ▼                                   ▼
//!   (stays Authenticated)                  Anonymous
//!
//! SignedOut lands in Anonymous from every state.
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro
// This generates a module `session_flow` with:
// - session_flow::State (enum)
// - session_flow::Input (enum)
// - session_flow::StateMachine (type alias)
// - session_flow::Impl (trait impl)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_flow(Anonymous)

    Anonymous => {
        SignedIn => Authenticating,
        SignedOut => Anonymous
    },
    Authenticating => {
        // Delegated token is the placeholder value - full re-consent needed
        PoisonedToken => ReauthRequired,
        // Delegated token absent - plain sign-in needed
        MissingToken => Anonymous,
        OnboardingSucceeded => Authenticated,
        OnboardingUnauthorized => ReauthRequired,
        SignedOut => Anonymous
    },
    Authenticated => {
        // Provider may re-emit sign-in (duplicate or account switch)
        SignedIn => Authenticating,
        TokenRefreshed => Authenticated,
        Unauthorized => SigningOut,
        SignedOut => Anonymous
    },
    SigningOut => {
        SignOutComplete => Anonymous,
        SignedOut => Anonymous
    },
    ReauthRequired => {
        SignedIn => Authenticating,
        SignedOut => Anonymous
    }
}

// Re-export the generated types with clearer names
pub use session_flow::Input as SessionFlowInput;
pub use session_flow::State as SessionFlowState;
pub use session_flow::StateMachine as SessionFlowMachine;

/// User-friendly session state for external consumption.
///
/// This is a simplified view of the FSM state for directives, status
/// reporting, and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; the sign-in view applies.
    Anonymous,
    /// Session present but onboarding not yet confirmed.
    Authenticating,
    /// Onboarding confirmed, polling active.
    Authenticated,
    /// Poisoned/rejected token detected; the user must fully re-consent.
    ReauthRequired,
    /// Forced sign-out in progress.
    SigningOut,
}

impl SessionState {
    /// Returns true if protected operations may run (Authenticated only).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionState::Authenticating | SessionState::SigningOut)
    }
}

impl From<&SessionFlowState> for SessionState {
    fn from(state: &SessionFlowState) -> Self {
        match state {
            SessionFlowState::Anonymous => SessionState::Anonymous,
            SessionFlowState::Authenticating => SessionState::Authenticating,
            SessionFlowState::Authenticated => SessionState::Authenticated,
            SessionFlowState::ReauthRequired => SessionState::ReauthRequired,
            SessionFlowState::SigningOut => SessionState::SigningOut,
        }
    }
}
