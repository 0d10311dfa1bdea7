use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tracing::warn;

/// An access token accepted by the upstream API.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for building requests.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let visible = chars.len().min(4);
        let tail: String = chars[chars.len() - visible..].iter().collect();
        format!("***{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Ordered set of credentials; the front element is the current one.
///
/// All mutations go through a single lock and are conditional on the
/// credential that failed still being current. A second caller reporting the
/// same failed credential therefore becomes a no-op instead of rotating a
/// healthy token away.
#[derive(Debug, Default)]
pub struct CredentialPool {
    tokens: Mutex<VecDeque<Credential>>,
}

impl CredentialPool {
    /// Creates a pool from tokens in priority order. Blank tokens are dropped.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(Into::into)
            .map(|t: String| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Credential)
            .collect();
        Self {
            tokens: Mutex::new(tokens),
        }
    }

    /// Current credential, or `None` when the pool is empty.
    pub fn current(&self) -> Option<Credential> {
        self.tokens.lock().front().cloned()
    }

    /// Number of credentials left.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    /// Whether every credential has been discarded.
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    /// Moves `failed` from the front to the back if it is still current.
    ///
    /// Returns the credential that is current afterwards.
    pub fn rotate(&self, failed: &Credential) -> Option<Credential> {
        let mut tokens = self.tokens.lock();
        if tokens.front() == Some(failed) {
            if let Some(front) = tokens.pop_front() {
                tokens.push_back(front);
            }
            if let Some(next) = tokens.front() {
                warn!(from = %failed, to = %next, "credentials.rotated");
            }
        }
        tokens.front().cloned()
    }

    /// Removes `failed` permanently if it is still current.
    ///
    /// Returns the credential that is current afterwards.
    pub fn discard(&self, failed: &Credential) -> Option<Credential> {
        let mut tokens = self.tokens.lock();
        if tokens.front() == Some(failed) {
            tokens.pop_front();
            warn!(token = %failed, remaining = tokens.len(), "credentials.discarded");
        }
        tokens.front().cloned()
    }

    /// Snapshot of the pool in order, for diagnostics.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.tokens.lock().iter().cloned().collect()
    }
}
