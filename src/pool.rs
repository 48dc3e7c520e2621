//! Round-robin pool of API credentials
//!
//! The pool has no notion of credential health: [`CredentialPool::rotate`]
//! blindly advances to the next key. Callers decide when rotating is
//! warranted (the row processor does so on rate-limit signals).

use crate::error::{Error, Result};
use tracing::info;

/// An opaque API key
///
/// `Debug` output is redacted so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for attaching to outbound requests
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***{} chars)", self.0.len())
    }
}

impl From<&str> for Credential {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Credential {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Ordered set of credentials with a wrapping cursor
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: usize,
}

impl CredentialPool {
    /// Build a pool; blank keys are dropped
    ///
    /// Returns [`Error::Config`] when no usable credential remains, which stops
    /// a run before any row is attempted.
    pub fn new<I, C>(credentials: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Credential>,
    {
        let credentials: Vec<Credential> = credentials
            .into_iter()
            .map(Into::into)
            .filter(|c| !c.expose().trim().is_empty())
            .collect();

        if credentials.is_empty() {
            return Err(Error::config(
                "no API keys available (neither in the secret store nor in config.txt)",
                "KEYS",
            ));
        }

        Ok(Self {
            credentials,
            cursor: 0,
        })
    }

    /// Start from a given cursor position (wrapped into range)
    #[must_use]
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor % self.credentials.len();
        self
    }

    /// The active credential
    pub fn current(&self) -> &Credential {
        &self.credentials[self.cursor]
    }

    /// Advance to the next credential, wrapping around, and return it
    pub fn rotate(&mut self) -> &Credential {
        self.cursor = (self.cursor + 1) % self.credentials.len();
        info!(
            key = self.cursor + 1,
            total = self.credentials.len(),
            "switched to API key #{} of {}",
            self.cursor + 1,
            self.credentials.len()
        );
        &self.credentials[self.cursor]
    }

    /// Zero-based position of the active credential
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of credentials in the pool (never zero)
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false; a pool cannot be constructed empty
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
