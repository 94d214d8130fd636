//! Typed client for the EmailSort backend.
//!
//! Every protected endpoint takes the identity bearer token plus the
//! delegated Google token; a 401 from any of them is classified uniformly so
//! the session layer can force a clean re-authentication.

mod client;
mod error;
mod types;

pub use client::EmailApiClient;
pub use error::{ApiError, ApiResult, UnsubscribeError};
pub use types::{Category, EmailDetail, EmailSummary, LinkedAccount, NewCategory};
