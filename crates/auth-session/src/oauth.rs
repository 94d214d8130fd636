//! OAuth callback server for browser-based sign-in.
//!
//! The browser OAuth flow ends on the web frontend, which forwards the token
//! parameters to this local listener so a headless client can complete
//! sign-in without embedding a browser.

use crate::error::{AuthError, AuthResult};
use crate::Session;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Default OAuth callback port.
pub const DEFAULT_CALLBACK_PORT: u16 = 9642;

/// Default OAuth timeout in seconds.
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;

/// Parameters received on the OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthCallbackResult {
    /// Whether authentication succeeded.
    pub success: bool,
    /// Identity access token (if successful).
    pub access_token: Option<String>,
    /// Delegated Google token (if the exchange issued one).
    pub provider_token: Option<String>,
    /// Refresh token (if successful).
    pub refresh_token: Option<String>,
    /// User ID (if successful).
    pub user_id: Option<String>,
    /// User email (if provided).
    pub email: Option<String>,
    /// Access token lifetime in seconds (if provided).
    pub expires_in: Option<i64>,
    /// Error message (if failed).
    pub error: Option<String>,
}

impl OAuthCallbackResult {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            access_token: None,
            provider_token: None,
            refresh_token: None,
            user_id: None,
            email: None,
            expires_in: None,
            error: Some(error),
        }
    }

    /// Convert a successful callback into a [`Session`].
    pub fn into_session(self) -> AuthResult<Session> {
        if !self.success {
            return Err(AuthError::OAuth(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let access_token = self
            .access_token
            .ok_or_else(|| AuthError::OAuth("callback missing access_token".to_string()))?;
        let user_id = self
            .user_id
            .ok_or_else(|| AuthError::OAuth("callback missing user_id".to_string()))?;

        let expires_at = self
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Ok(Session {
            access_token,
            provider_token: self.provider_token,
            refresh_token: self.refresh_token,
            user_id,
            email: self.email,
            scope: None,
            expires_at,
        })
    }
}

/// Local HTTP listener that receives the forwarded OAuth parameters.
pub struct OAuthCallbackServer {
    port: u16,
    timeout_secs: u64,
}

impl OAuthCallbackServer {
    /// Create a new callback server.
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }

    /// Create with default settings.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT_SECS)
    }

    /// Get the callback URL for this server.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Start the server and wait for the OAuth callback.
    ///
    /// This method will:
    /// 1. Start a local HTTP server on the configured port
    /// 2. Wait for a callback request with the token parameters
    /// 3. Return the result and shut down the server
    ///
    /// The caller is responsible for opening the browser to the auth URL.
    pub async fn wait_for_callback(&self) -> AuthResult<OAuthCallbackResult> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(port = self.port, "OAuth callback server listening");

        let (tx, rx) = oneshot::channel::<OAuthCallbackResult>();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let server_handle = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, tx).await {
                                    error!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let result = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => OAuthCallbackResult::failure("Internal error: channel closed".to_string()),
            Err(_) => OAuthCallbackResult::failure("OAuth timeout".to_string()),
        };

        server_handle.abort();

        Ok(result)
    }
}

/// Handle an incoming HTTP connection.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<OAuthCallbackResult>>>>,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received callback request");

    // Parse the request line: GET /callback?... HTTP/1.1
    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    let query = match path.find('?') {
        Some(idx) => &path[idx + 1..],
        None => "",
    };

    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let result = if let Some(err) = params.get("error") {
        send_response(&mut writer, 200, "OK", &error_page(err)).await?;
        OAuthCallbackResult::failure(err.clone())
    } else if params.contains_key("access_token") && params.contains_key("user_id") {
        send_response(&mut writer, 200, "OK", &success_page()).await?;
        OAuthCallbackResult {
            success: true,
            access_token: params.get("access_token").cloned(),
            provider_token: params.get("provider_token").cloned(),
            refresh_token: params.get("refresh_token").cloned(),
            user_id: params.get("user_id").cloned(),
            email: params.get("email").cloned(),
            expires_in: params.get("expires_in").and_then(|s| s.parse().ok()),
            error: None,
        }
    } else {
        send_response(
            &mut writer,
            200,
            "OK",
            &error_page("Missing required parameters"),
        )
        .await?;
        OAuthCallbackResult::failure("Missing required parameters".to_string())
    };

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(result);
    }

    Ok(())
}

/// Send an HTTP response.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Generate success page HTML.
fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>EmailSort - Sign-in Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #22c55e; margin-bottom: 20px;">Sign-in Successful!</h1>
<p style="color: #666;">You can close this window and return to the terminal.</p>
</div>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

/// Generate error page HTML.
fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>EmailSort - Sign-in Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #ef4444; margin-bottom: 20px;">Sign-in Failed</h1>
<p style="color: #666;">Error: {}</p>
<p style="color: #888; font-size: 14px;">You can close this window and try again.</p>
</div>
</body>
</html>"#,
        error
    )
}
