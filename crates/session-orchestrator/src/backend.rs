//! Trait seam over the EmailSort backend.
//!
//! The state machine only needs three backend operations; the seam keeps it
//! testable with an in-memory fake while the production wiring plugs in
//! [`EmailApiClient`].

use auth_session::Session;
use email_api::{ApiError, EmailApiClient, EmailSummary};
use futures_util::future::BoxFuture;

/// Backend operations driven by the session lifecycle.
pub trait EmailBackend: Send + Sync {
    /// Register the primary linked account (onboarding side effect).
    fn store_primary_account<'a>(&'a self, session: &'a Session)
        -> BoxFuture<'a, Result<(), ApiError>>;

    /// Fetch the current categorized email snapshot.
    fn fetch_emails<'a>(
        &'a self,
        session: &'a Session,
    ) -> BoxFuture<'a, Result<Vec<EmailSummary>, ApiError>>;

    /// Ask the backend to pull fresh source data.
    fn trigger_collection<'a>(&'a self, session: &'a Session)
        -> BoxFuture<'a, Result<(), ApiError>>;
}

impl EmailBackend for EmailApiClient {
    fn store_primary_account<'a>(
        &'a self,
        session: &'a Session,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(EmailApiClient::store_primary_account(self, session))
    }

    fn fetch_emails<'a>(
        &'a self,
        session: &'a Session,
    ) -> BoxFuture<'a, Result<Vec<EmailSummary>, ApiError>> {
        Box::pin(EmailApiClient::fetch_emails(self, session))
    }

    fn trigger_collection<'a>(
        &'a self,
        session: &'a Session,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(EmailApiClient::trigger_collection(self, session))
    }
}
