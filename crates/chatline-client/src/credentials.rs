use std::sync::{Arc, RwLock};

/// Source of the bearer token presented on every connection.
///
/// Read at each authentication step, never mutated by the client. Blank
/// tokens are treated as absent.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

pub(crate) fn present_token(provider: &dyn CredentialProvider) -> Option<String> {
    provider.token().filter(|token| !token.trim().is_empty())
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token slot that the owning application can update at any time.
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl CredentialProvider for SharedToken {
    fn token(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_count_as_missing() {
        assert_eq!(present_token(&StaticToken::new("  ")), None);
        assert_eq!(present_token(&StaticToken::none()), None);
        assert_eq!(present_token(&StaticToken::new("abc")), Some("abc".into()));
    }

    #[test]
    fn shared_token_reflects_updates() {
        let shared = SharedToken::default();
        let reader = shared.clone();
        assert_eq!(reader.token(), None);
        shared.set("t1");
        assert_eq!(reader.token(), Some("t1".into()));
        shared.clear();
        assert_eq!(reader.token(), None);
    }

    #[test]
    fn closures_are_providers() {
        let provider = || Some("from-closure".to_string());
        assert_eq!(present_token(&provider), Some("from-closure".into()));
    }
}
