//! Immutable, ordered pool of provider credentials.
//!
//! Loaded once at startup and shared read-only afterwards. Secrets are wrapped
//! in [`Zeroizing`] so they are wiped from memory when the last handle drops,
//! and they never appear in `Debug` output or logs.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::error::AppError;

/// One provider access credential with a fixed position in its pool.
#[derive(Clone)]
pub struct Credential {
    ordinal: usize,
    secret: Arc<Zeroizing<String>>,
}

impl Credential {
    /// 0-based position inside the pool.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn secret(&self) -> &str {
        self.secret.as_str()
    }

    /// Human-readable label for logs: `key 2/3 (…wxyz)`.
    pub fn label(&self, total: usize) -> String {
        format!("key {}/{} ({})", self.ordinal + 1, total, mask(self.secret()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("ordinal", &self.ordinal)
            .field("secret", &mask(self.secret()))
            .finish()
    }
}

fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "…".to_string()
    } else {
        format!("…{tail}")
    }
}

/// Ordered, read-only list of credentials.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Arc<[Credential]>,
}

impl CredentialPool {
    /// Build a pool from raw secrets, trimming whitespace and dropping blanks.
    ///
    /// An empty result is a configuration error: the client cannot be built.
    pub fn new<I, S>(secrets: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials: Vec<Credential> = secrets
            .into_iter()
            .filter_map(|s| {
                let trimmed = s.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .enumerate()
            .map(|(ordinal, secret)| Credential {
                ordinal,
                secret: Arc::new(Zeroizing::new(secret)),
            })
            .collect();

        if credentials.is_empty() {
            return Err(AppError::Configuration(
                "no provider credentials configured".into(),
            ));
        }

        Ok(Self {
            credentials: credentials.into(),
        })
    }

    /// Parse a comma-separated list such as the `API_KEY` environment variable.
    pub fn from_delimited(raw: &str) -> Result<Self, AppError> {
        Self::new(raw.split(','))
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_delimited_trims_and_drops_blanks() {
        let pool = CredentialPool::from_delimited(" key-a , ,key-b,").unwrap();
        assert_eq!(pool.len(), 2);
        let secrets: Vec<_> = pool.iter().map(|c| c.secret().to_string()).collect();
        assert_eq!(secrets, vec!["key-a", "key-b"]);
        let ordinals: Vec<_> = pool.iter().map(|c| c.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1]);
    }

    #[test]
    fn test_empty_pool_is_configuration_error() {
        let err = CredentialPool::from_delimited(" , ").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(matches!(
            CredentialPool::new(Vec::<String>::new()),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let pool = CredentialPool::new(["AIzaSyVerySecretValue1234"]).unwrap();
        let cred = pool.iter().next().unwrap();
        let debug = format!("{cred:?}");
        assert!(!debug.contains("VerySecret"));
        assert!(debug.contains("…1234"));
        assert_eq!(cred.label(pool.len()), "key 1/1 (…1234)");
    }

    #[test]
    fn test_short_secret_fully_masked() {
        let pool = CredentialPool::new(["abc"]).unwrap();
        let cred = pool.iter().next().unwrap();
        assert_eq!(cred.label(1), "key 1/1 (…)");
    }
}
