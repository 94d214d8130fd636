//! At-most-once primary-account registration per sign-in.

use crate::backend::EmailBackend;
use auth_session::Session;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Onboarding failure that must change auth state.
#[derive(Error, Debug)]
pub enum OnboardingError {
    /// The backend rejected the credentials; the user must reauthenticate.
    #[error("Primary account registration unauthorized")]
    Unauthorized,
}

/// Tracks the registration side effect for the current sign-in.
///
/// Ephemeral: lives only as long as the process, keyed by the session's
/// identity so duplicate SignedIn events for the same user do not repeat the
/// call.
#[derive(Debug, Default)]
struct OnboardingRecord {
    /// Identity the registration call has already run for.
    completed_for: Option<String>,
}

/// Runs the "register primary account" side effect exactly once per sign-in.
///
/// The async mutex serializes concurrent calls, so at most one registration
/// request is ever in flight; the identity record suppresses repeats.
pub struct OnboardingCoordinator {
    backend: Arc<dyn EmailBackend>,
    record: Mutex<OnboardingRecord>,
}

impl OnboardingCoordinator {
    /// Create a coordinator calling through the given backend.
    pub fn new(backend: Arc<dyn EmailBackend>) -> Self {
        Self {
            backend,
            record: Mutex::new(OnboardingRecord::default()),
        }
    }

    /// Ensure the primary account is registered for this session's identity.
    ///
    /// Registration is best-effort: a non-auth failure is logged, recorded
    /// (so it is not retried for this sign-in), and swallowed; the rest of
    /// the app must keep functioning. An authorization failure is returned
    /// so the caller can force re-authentication instead of retrying
    /// silently.
    pub async fn ensure_registered(&self, session: &Session) -> Result<(), OnboardingError> {
        let mut record = self.record.lock().await;

        let identity = session.identity_key();
        if record.completed_for.as_deref() == Some(identity) {
            debug!(user_id = %identity, "Registration already ran for this sign-in");
            return Ok(());
        }

        match self.backend.store_primary_account(session).await {
            Ok(()) => {
                info!(user_id = %identity, "Primary account registered");
                record.completed_for = Some(identity.to_string());
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                warn!(user_id = %identity, "Primary account registration unauthorized");
                Err(OnboardingError::Unauthorized)
            }
            Err(e) => {
                warn!(
                    user_id = %identity,
                    error = %e,
                    "Primary account registration failed (non-fatal)"
                );
                record.completed_for = Some(identity.to_string());
                Ok(())
            }
        }
    }

    /// Clear the record (sign-out). The next SignedIn runs registration
    /// again.
    pub async fn reset(&self) {
        self.record.lock().await.completed_for = None;
    }
}
