//! Supabase Auth REST client.
//!
//! Covers the three provider operations the client needs: renewing an access
//! token, revoking a session, and building the `/auth/v1/authorize` URL that
//! starts the browser OAuth flow.

use crate::error::{AuthError, AuthResult};
use crate::Session;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// Gmail scopes requested during Google sign-in.
pub const GMAIL_SCOPES: &str = "https://www.googleapis.com/auth/gmail.readonly https://www.googleapis.com/auth/gmail.modify https://www.googleapis.com/auth/gmail.settings.basic https://www.googleapis.com/auth/gmail.labels email profile";

/// Options for starting a browser OAuth flow.
#[derive(Debug, Clone)]
pub struct OAuthOptions {
    /// Provider slug (e.g. `google`).
    pub provider: String,
    /// URL the provider redirects back to after consent.
    pub redirect_to: String,
    /// Space-separated OAuth scopes.
    pub scopes: String,
    /// Extra query parameters forwarded to the upstream provider.
    pub query_params: Vec<(String, String)>,
}

impl OAuthOptions {
    /// Google sign-in with the Gmail scopes and offline access.
    ///
    /// `prompt=consent` forces a fresh delegated token; without it a repeat
    /// sign-in can come back without one.
    pub fn google(redirect_to: impl Into<String>) -> Self {
        Self {
            provider: "google".to_string(),
            redirect_to: redirect_to.into(),
            scopes: GMAIL_SCOPES.to_string(),
            query_params: vec![
                ("access_type".to_string(), "offline".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ],
        }
    }
}

/// Supabase token refresh request.
#[derive(Debug, Serialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Supabase token refresh response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    provider_token: Option<String>,
    user: RefreshUser,
}

#[derive(Debug, Deserialize)]
struct RefreshUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Client for the Supabase Auth REST API.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http_client: reqwest::Client,
    supabase_url: String,
    publishable_key: String,
}

impl SupabaseAuthClient {
    /// Create a new auth client.
    ///
    /// # Arguments
    /// * `supabase_url` - The Supabase project URL (e.g., `https://xyz.supabase.co`)
    /// * `publishable_key` - The Supabase publishable API key
    pub fn new(supabase_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            supabase_url: supabase_url.into(),
            publishable_key: publishable_key.into(),
        }
    }

    /// Build an auth endpoint URL.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    /// Exchange a refresh token for a new session.
    ///
    /// The refresh grant does not reissue the delegated Google token; the
    /// caller is responsible for carrying the previous one forward.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        let refresh_url = format!("{}?grant_type=refresh_token", self.auth_url("token"));

        debug!(url = %refresh_url, "Refreshing token");

        let response = self
            .http_client
            .post(&refresh_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token refresh failed");
            return Err(AuthError::TokenRefresh(format!("HTTP {}: {}", status, body)));
        }

        let data: RefreshResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(data.expires_in);

        info!(user_id = %data.user.id, "Token refreshed successfully");

        Ok(Session {
            access_token: data.access_token,
            provider_token: data.provider_token,
            refresh_token: Some(data.refresh_token),
            user_id: data.user.id,
            email: data.user.email,
            scope: None,
            expires_at: Some(expires_at),
        })
    }

    /// Revoke a session server-side.
    ///
    /// Best-effort: a failure is logged and swallowed, since the local
    /// session is cleared regardless.
    pub async fn sign_out(&self, access_token: &str) {
        let logout_url = self.auth_url("logout");

        debug!(url = %logout_url, "Revoking session");

        let result = self
            .http_client
            .post(&logout_url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Session revocation rejected");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Session revocation request failed");
            }
        }
    }

    /// Build the authorize URL that starts a browser OAuth flow.
    pub fn authorize_url(&self, options: &OAuthOptions) -> AuthResult<Url> {
        let mut url = Url::parse(&self.auth_url("authorize"))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("provider", &options.provider);
            pairs.append_pair("redirect_to", &options.redirect_to);
            pairs.append_pair("scopes", &options.scopes);
            for (key, value) in &options.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SupabaseAuthClient::new("https://test.supabase.co", "test-key");
        assert_eq!(client.supabase_url, "https://test.supabase.co");
        assert_eq!(client.publishable_key, "test-key");
    }

    #[test]
    fn test_auth_url() {
        let client = SupabaseAuthClient::new("https://test.supabase.co", "test-key");
        assert_eq!(
            client.auth_url("logout"),
            "https://test.supabase.co/auth/v1/logout"
        );
    }

    #[test]
    fn test_authorize_url_google() {
        let client = SupabaseAuthClient::new("https://test.supabase.co", "test-key");
        let options = OAuthOptions::google("http://localhost:3000/categorized-emails");
        let url = client.authorize_url(&options).unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("provider".to_string(), "google".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "http://localhost:3000/categorized-emails".to_string()
        )));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "consent".to_string())));
    }

    #[test]
    fn test_authorize_url_encodes_scopes() {
        let client = SupabaseAuthClient::new("https://test.supabase.co", "test-key");
        let options = OAuthOptions::google("http://localhost:3000");
        let url = client.authorize_url(&options).unwrap();

        let scopes = url
            .query_pairs()
            .find(|(k, _)| k == "scopes")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(scopes.contains("gmail.readonly"));
        assert!(scopes.contains("gmail.modify"));
        assert!(scopes.contains("email profile"));
    }

    #[test]
    fn test_google_options_request_offline_consent() {
        let options = OAuthOptions::google("http://localhost:3000");
        assert_eq!(options.provider, "google");
        assert_eq!(options.scopes, GMAIL_SCOPES);
        assert_eq!(options.query_params.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_fails_against_unreachable_provider() {
        // No server is listening here; the refresh must surface an HTTP error
        let client = SupabaseAuthClient::new("http://127.0.0.1:9", "test-key");
        let result = client.refresh("some-refresh-token").await;
        assert!(matches!(result, Err(AuthError::Http(_))));
    }
}
