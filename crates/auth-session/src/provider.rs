//! Session provider: the adapter over the identity provider.
//!
//! Holds the current session snapshot and fans auth state changes out on a
//! broadcast channel. Consumers never cache a `Session` across async
//! boundaries; they call [`SessionProvider::get_current_session`] freshly at
//! each point of use.

use crate::supabase::{OAuthOptions, SupabaseAuthClient};
use crate::{AuthEvent, AuthResult, Session};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// Capacity of the auth event channel. Events are tiny and the single
/// long-lived consumer drains promptly.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Adapter over the Supabase identity provider.
///
/// Owns the in-memory session snapshot. Sessions are never persisted; a new
/// process starts anonymous and signs in again.
pub struct SessionProvider {
    auth: SupabaseAuthClient,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionProvider {
    /// Create a provider backed by the given auth client.
    pub fn new(auth: SupabaseAuthClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            auth,
            current: RwLock::new(None),
            events,
        }
    }

    /// Subscribe to auth state changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Point-in-time read of the current session.
    ///
    /// If the stored session has expired this attempts one refresh through
    /// the provider (emitting [`AuthEvent::TokenRefreshed`] on success). Any
    /// provider failure yields `None` so callers treat it uniformly as "not
    /// authenticated".
    pub async fn get_current_session(&self) -> Option<Session> {
        let current = self.current.read().await.clone()?;

        if !current.is_expired() {
            return Some(current);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            debug!("Session expired with no refresh token");
            return None;
        };

        match self.auth.refresh(&refresh_token).await {
            Ok(mut refreshed) => {
                // The refresh grant does not reissue the delegated token;
                // carry the previous one forward.
                if refreshed.provider_token.is_none() {
                    refreshed.provider_token = current.provider_token.clone();
                }
                *self.current.write().await = Some(refreshed.clone());
                let _ = self.events.send(AuthEvent::TokenRefreshed(refreshed.clone()));
                Some(refreshed)
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                None
            }
        }
    }

    /// Returns true if a session snapshot is currently stored.
    pub async fn has_session(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Store a session delivered by the OAuth redirect and announce the
    /// sign-in.
    pub async fn establish_session(&self, session: Session) {
        info!(user_id = %session.user_id, "Session established");
        *self.current.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }

    /// Clear the session and announce the sign-out.
    ///
    /// The server-side revocation is best-effort; the local snapshot is
    /// cleared regardless.
    pub async fn sign_out(&self) {
        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            self.auth.sign_out(&session.access_token).await;
        }
        info!("Signed out");
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Build the authorize URL that starts a browser OAuth flow.
    pub fn sign_in_with_oauth(&self, options: &OAuthOptions) -> AuthResult<Url> {
        self.auth.authorize_url(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn provider() -> SessionProvider {
        // The URL is unreachable; tests exercising refresh rely on that.
        SessionProvider::new(SupabaseAuthClient::new("http://127.0.0.1:9", "test-key"))
    }

    fn session() -> Session {
        Session {
            access_token: "access-1".to_string(),
            provider_token: Some("google-1".to_string()),
            refresh_token: Some("refresh-1".to_string()),
            user_id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            scope: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn test_starts_anonymous() {
        let provider = provider();
        assert!(!provider.has_session().await);
        assert!(provider.get_current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_establish_emits_signed_in() {
        let provider = provider();
        let mut events = provider.subscribe();

        provider.establish_session(session()).await;

        assert!(provider.has_session().await);
        match events.recv().await.unwrap() {
            AuthEvent::SignedIn(s) => assert_eq!(s.user_id, "user-1"),
            other => panic!("expected SignedIn, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_current_session_returns_unexpired_snapshot() {
        let provider = provider();
        provider.establish_session(session()).await;

        let snapshot = provider.get_current_session().await.unwrap();
        assert_eq!(snapshot.access_token, "access-1");
        assert_eq!(snapshot.provider_token.as_deref(), Some("google-1"));
    }

    #[tokio::test]
    async fn test_expired_session_with_failed_refresh_reads_as_absent() {
        let provider = provider();
        let mut expired = session();
        expired.expires_at = Some(Utc::now() - Duration::seconds(10));
        provider.establish_session(expired).await;

        // Refresh hits an unreachable provider; the read degrades to None
        assert!(provider.get_current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_reads_as_absent() {
        let provider = provider();
        let mut expired = session();
        expired.expires_at = Some(Utc::now() - Duration::seconds(10));
        expired.refresh_token = None;
        provider.establish_session(expired).await;

        assert!(provider.get_current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_and_emits() {
        let provider = provider();
        provider.establish_session(session()).await;
        let mut events = provider.subscribe();

        provider.sign_out().await;

        assert!(!provider.has_session().await);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_still_emits() {
        let provider = provider();
        let mut events = provider.subscribe();

        provider.sign_out().await;

        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let provider = provider();
        let mut events = provider.subscribe();

        provider.establish_session(session()).await;
        provider.sign_out().await;
        provider.establish_session(session()).await;

        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
    }

    #[test]
    fn test_sign_in_with_oauth_builds_authorize_url() {
        let provider = provider();
        let url = provider
            .sign_in_with_oauth(&OAuthOptions::google("http://localhost:3000"))
            .unwrap();
        assert!(url.as_str().starts_with("http://127.0.0.1:9/auth/v1/authorize"));
    }
}
