//! The session model and the auth event stream.

use chrono::{DateTime, Utc};

/// A signed-in user's credentials.
///
/// Pairs the identity provider's access token with the delegated Google
/// token (`provider_token`) that authorizes mailbox access on the user's
/// behalf. The delegated token is absent when the OAuth exchange did not
/// issue one (e.g. after a plain token refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Identity provider access token (bearer for backend calls).
    pub access_token: String,
    /// Delegated Google token, absent if the exchange did not issue one.
    pub provider_token: Option<String>,
    /// Refresh token for renewing the access token.
    pub refresh_token: Option<String>,
    /// User ID assigned by the identity provider.
    pub user_id: String,
    /// User email, if known.
    pub email: Option<String>,
    /// OAuth scopes granted to the delegated token.
    pub scope: Option<String>,
    /// Access token expiry, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns true if the access token's expiry has passed.
    ///
    /// A session without an expiry is treated as not expired; the backend
    /// will reject it with a 401 if it is actually stale.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// The identity this session belongs to, used to debounce per-sign-in
    /// side effects.
    pub fn identity_key(&self) -> &str {
        &self.user_id
    }
}

/// Auth state change delivered by the identity provider.
///
/// Events are emitted in order on a broadcast channel; they are unordered
/// with respect to in-flight requests that used a prior session.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A user signed in; carries the new session.
    SignedIn(Session),
    /// The session was cleared (user action or forced invalidation).
    SignedOut,
    /// The access token was renewed; same identity, new credentials.
    TokenRefreshed(Session),
}

impl AuthEvent {
    /// Short name for logs and transition events.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut => "signed_out",
            AuthEvent::TokenRefreshed(_) => "token_refreshed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> Session {
        Session {
            access_token: "access-1".to_string(),
            provider_token: Some("google-1".to_string()),
            refresh_token: Some("refresh-1".to_string()),
            user_id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            scope: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_no_expiry_is_not_expired() {
        assert!(!session().is_expired());
    }

    #[test]
    fn test_future_expiry_is_not_expired() {
        let mut s = session();
        s.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!s.is_expired());
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let mut s = session();
        s.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(s.is_expired());
    }

    #[test]
    fn test_identity_key_is_user_id() {
        assert_eq!(session().identity_key(), "user-1");
    }

    #[test]
    fn test_event_names() {
        assert_eq!(AuthEvent::SignedIn(session()).name(), "signed_in");
        assert_eq!(AuthEvent::SignedOut.name(), "signed_out");
        assert_eq!(AuthEvent::TokenRefreshed(session()).name(), "token_refreshed");
    }
}
