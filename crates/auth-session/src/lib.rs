//! Authentication and session handling for the EmailSort client.
//!
//! This crate provides:
//! - The `Session` model pairing the identity token with the delegated
//!   mailbox token
//! - `TokenGuard` for classifying a session before protected operations
//! - `SessionProvider`, the adapter over the Supabase identity provider that
//!   exposes the current session snapshot and the auth event stream
//! - A local OAuth callback server for completing browser sign-in

mod error;
mod oauth;
mod provider;
mod session;
mod supabase;
mod token_guard;

pub use error::{AuthError, AuthResult};
pub use oauth::{OAuthCallbackServer, OAuthCallbackResult, DEFAULT_CALLBACK_PORT};
pub use provider::SessionProvider;
pub use session::{AuthEvent, Session};
pub use supabase::{OAuthOptions, SupabaseAuthClient, GMAIL_SCOPES};
pub use token_guard::{TokenClassification, TokenGuard};
