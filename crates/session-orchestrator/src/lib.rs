//! Session lifecycle and polling orchestration for the EmailSort client.
//!
//! This crate provides:
//! - An explicit FSM for the session lifecycle (Anonymous / Authenticating /
//!   Authenticated / ReauthRequired / SigningOut)
//! - `SessionStateMachine`, the single consumer of the auth event stream
//! - `OnboardingCoordinator` for the at-most-once primary-account
//!   registration per sign-in
//! - Navigation directives and structured transition events for the hosting
//!   layer

mod backend;
mod events;
mod fsm;
mod machine;
mod onboarding;

pub use backend::EmailBackend;
pub use events::{
    NavigationDirective, TransitionEvent, LOGIN_PATH, MAIN_VIEW_PATH, REAUTH_REQUIRED_NOTICE,
    SESSION_EXPIRED_NOTICE,
};
pub use fsm::session_flow;
pub use fsm::{SessionFlowInput, SessionFlowMachine, SessionFlowState, SessionState};
pub use machine::{SessionMachineConfig, SessionStateMachine};
pub use onboarding::{OnboardingCoordinator, OnboardingError};
