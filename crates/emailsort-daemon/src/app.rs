//! Client runtime assembly.

use auth_session::{
    OAuthCallbackServer, OAuthOptions, SessionProvider, SupabaseAuthClient, TokenGuard,
};
use email_api::EmailApiClient;
use emailsort_core::Config;
use session_orchestrator::{SessionMachineConfig, SessionStateMachine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Sign in interactively and run the session machine until Ctrl-C.
pub async fn run_client(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let provider = Arc::new(SessionProvider::new(SupabaseAuthClient::new(
        config.supabase_url.clone(),
        config.supabase_publishable_key.clone(),
    )));
    let backend = Arc::new(EmailApiClient::new(config.api_url.clone()));
    let guard = TokenGuard::new(config.poisoned_token_sentinel.clone());
    let machine_config = SessionMachineConfig {
        email_refresh_interval: Duration::from_millis(config.email_refresh_interval_ms),
        collection_interval: Duration::from_millis(config.collection_interval_ms),
    };

    let (machine, mut nav_rx) =
        SessionStateMachine::new(provider.clone(), backend, guard, machine_config);
    machine.start();

    // The routing layer is out of scope for a headless client; directives
    // surface as log lines.
    let router = tokio::spawn(async move {
        while let Some(directive) = nav_rx.recv().await {
            match directive.notice {
                Some(notice) => info!(path = %directive.path, notice = %notice, "navigate"),
                None => info!(path = %directive.path, "navigate"),
            }
        }
    });

    // Interactive sign-in: hand the URL to the user, wait for the forwarded
    // callback, and let the machine take over from the SignedIn event.
    let callback = OAuthCallbackServer::with_defaults();
    let auth_url = provider.sign_in_with_oauth(&OAuthOptions::google(redirect_target(&config)))?;
    println!("Open this URL in your browser to sign in:\n\n  {}\n", auth_url);

    match callback.wait_for_callback().await?.into_session() {
        Ok(session) => provider.establish_session(session).await,
        Err(e) => {
            error!(error = %e, "Sign-in failed");
            machine.shutdown().await;
            router.abort();
            return Err(e.into());
        }
    }

    info!("Client running, press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    machine.shutdown().await;
    router.abort();
    Ok(())
}

/// Print the OAuth authorize URL without running the client.
pub fn print_auth_url(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let auth = SupabaseAuthClient::new(
        config.supabase_url.clone(),
        config.supabase_publishable_key.clone(),
    );
    let url = auth.authorize_url(&OAuthOptions::google(redirect_target(config)))?;
    println!("{}", url);
    Ok(())
}

/// Where the OAuth flow lands after consent: the frontend's main view, which
/// forwards the token parameters to the local callback listener.
fn redirect_target(config: &Config) -> String {
    format!(
        "{}/categorized-emails",
        config.site_url.trim_end_matches('/')
    )
}
