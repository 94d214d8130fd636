//! Pre-flight validation of a session snapshot.

use crate::Session;
use emailsort_core::DEFAULT_POISONED_TOKEN_SENTINEL;

/// Outcome of classifying a session snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClassification<'a> {
    /// Both tokens present and genuine; protected operations may proceed.
    Valid(&'a Session),
    /// No session, or no delegated token. The user is not signed in (or not
    /// fully signed in) and must authenticate.
    Missing,
    /// The delegated token holds the known placeholder value instead of a
    /// real credential. The user must fully re-consent; never retried
    /// automatically.
    Poisoned,
}

impl TokenClassification<'_> {
    /// Returns true only for `Valid`.
    pub fn is_usable(&self) -> bool {
        matches!(self, TokenClassification::Valid(_))
    }
}

/// Classifies session snapshots before any protected operation.
///
/// Pure; no side effects, no I/O. The poisoned sentinel is configuration
/// (the identity exchange can, under misconfiguration, yield a literal
/// placeholder instead of a real delegated credential).
#[derive(Debug, Clone)]
pub struct TokenGuard {
    sentinel: String,
}

impl TokenGuard {
    /// Create a guard with the given poisoned-token sentinel.
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    /// Classify a session snapshot.
    pub fn classify<'a>(&self, session: Option<&'a Session>) -> TokenClassification<'a> {
        let Some(session) = session else {
            return TokenClassification::Missing;
        };

        if session.access_token.is_empty() {
            return TokenClassification::Missing;
        }

        match session.provider_token.as_deref() {
            None => TokenClassification::Missing,
            Some("") => TokenClassification::Missing,
            Some(token) if token == self.sentinel => TokenClassification::Poisoned,
            Some(_) => TokenClassification::Valid(session),
        }
    }

    /// Returns true if the session is usable for protected operations.
    pub fn is_usable(&self, session: Option<&Session>) -> bool {
        self.classify(session).is_usable()
    }
}

impl Default for TokenGuard {
    fn default() -> Self {
        Self::new(DEFAULT_POISONED_TOKEN_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(provider_token: Option<&str>) -> Session {
        Session {
            access_token: "A1".to_string(),
            provider_token: provider_token.map(str::to_string),
            refresh_token: None,
            user_id: "user-1".to_string(),
            email: None,
            scope: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_no_session_is_missing() {
        let guard = TokenGuard::default();
        assert_eq!(guard.classify(None), TokenClassification::Missing);
        assert!(!guard.is_usable(None));
    }

    #[test]
    fn test_missing_provider_token() {
        let guard = TokenGuard::default();
        let s = session(None);
        assert_eq!(guard.classify(Some(&s)), TokenClassification::Missing);
    }

    #[test]
    fn test_empty_provider_token_is_missing() {
        let guard = TokenGuard::default();
        let s = session(Some(""));
        assert_eq!(guard.classify(Some(&s)), TokenClassification::Missing);
    }

    #[test]
    fn test_empty_access_token_is_missing() {
        let guard = TokenGuard::default();
        let mut s = session(Some("D1"));
        s.access_token = String::new();
        assert_eq!(guard.classify(Some(&s)), TokenClassification::Missing);
    }

    #[test]
    fn test_sentinel_is_poisoned() {
        let guard = TokenGuard::default();
        let s = session(Some("present"));
        assert_eq!(guard.classify(Some(&s)), TokenClassification::Poisoned);
        assert!(!guard.is_usable(Some(&s)));
    }

    #[test]
    fn test_real_token_is_valid() {
        let guard = TokenGuard::default();
        let s = session(Some("ya29.real-token"));
        assert_eq!(
            guard.classify(Some(&s)),
            TokenClassification::Valid(&s)
        );
        assert!(guard.is_usable(Some(&s)));
    }

    #[test]
    fn test_sentinel_is_configurable() {
        let guard = TokenGuard::new("placeholder");

        // The old default sentinel is now a real-looking token
        let s = session(Some("present"));
        assert!(guard.is_usable(Some(&s)));

        let s = session(Some("placeholder"));
        assert_eq!(guard.classify(Some(&s)), TokenClassification::Poisoned);
    }

    #[test]
    fn test_classification_is_pure() {
        let guard = TokenGuard::default();
        let s = session(Some("present"));
        // Same input, same answer
        assert_eq!(guard.classify(Some(&s)), guard.classify(Some(&s)));
        // The session is untouched
        assert_eq!(s.provider_token.as_deref(), Some("present"));
    }
}
