//! Credential failover.
//!
//! Runs one logical operation against each credential of the pool in order
//! until it succeeds. Failures are classified: retriable ones (invalid key,
//! quota, transient server errors) move on to the next credential, anything
//! else aborts the whole invocation. Attempts are strictly sequential and
//! there is no delay between them.

use std::future::Future;

use super::credentials::{Credential, CredentialPool};
use crate::error::AppError;

// =============================================================================
// Error classification
// =============================================================================

/// Why a provider failure is worth retrying with another credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverReason {
    /// Key rejected, revoked, or lacking permission.
    InvalidCredential,
    /// Quota or rate limit exhausted for this account.
    QuotaExhausted,
    /// 5xx-class or "internal error" from the provider.
    ServerError,
}

/// Classify a provider failure from its HTTP status and message.
///
/// Returns `None` for failures that no other credential can fix
/// (malformed request, safety rejection, unknown model).
pub fn classify_error(status: Option<u16>, message: &str) -> Option<FailoverReason> {
    match status {
        Some(401) | Some(403) => return Some(FailoverReason::InvalidCredential),
        Some(429) => return Some(FailoverReason::QuotaExhausted),
        Some(s) if (500..=599).contains(&s) => return Some(FailoverReason::ServerError),
        _ => {}
    }

    let lower = message.to_lowercase();

    if lower.contains("api key not valid")
        || lower.contains("invalid credential")
        || lower.contains("api_key_invalid")
        || lower.contains("permission denied")
    {
        return Some(FailoverReason::InvalidCredential);
    }

    if lower.contains("quota") || lower.contains("resource_exhausted") {
        return Some(FailoverReason::QuotaExhausted);
    }

    if lower.contains("internal error")
        || lower.contains("unavailable")
        || lower.contains("overloaded")
        || ["500", "502", "503", "504"].iter().any(|code| lower.contains(code))
    {
        return Some(FailoverReason::ServerError);
    }

    None
}

/// Build a provider error whose retriability follows [`classify_error`].
pub fn provider_error(status: Option<u16>, message: impl Into<String>) -> AppError {
    let message = message.into();
    match classify_error(status, &message) {
        Some(_) => AppError::retriable(message, status),
        None => AppError::fatal(message, status),
    }
}

// =============================================================================
// Operation
// =============================================================================

/// One logical operation that can be attempted with any credential.
///
/// Implemented for plain closures returning a future; implement it on a
/// struct when an attempt needs mutable access to caller-owned state.
pub trait FailoverOperation: Send {
    type Output: Send;

    fn attempt(
        &mut self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Self::Output, AppError>> + Send;
}

impl<F, Fut, T> FailoverOperation for F
where
    F: FnMut(Credential) -> Fut + Send,
    Fut: Future<Output = Result<T, AppError>> + Send,
    T: Send,
{
    type Output = T;

    fn attempt(
        &mut self,
        credential: &Credential,
    ) -> impl Future<Output = Result<T, AppError>> + Send {
        (self)(credential.clone())
    }
}

// =============================================================================
// Invoker
// =============================================================================

/// Sequential failover across a [`CredentialPool`].
#[derive(Debug, Clone)]
pub struct FailoverInvoker {
    pool: CredentialPool,
}

impl FailoverInvoker {
    pub fn new(pool: CredentialPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run `operation` with each credential in order.
    ///
    /// - success: returned immediately, remaining credentials untouched
    /// - non-retriable failure: returned immediately
    /// - retriable failure: next credential
    /// - all credentials failed: [`AppError::AggregateFailure`] with the last error
    pub async fn invoke<O>(&self, label: &str, mut operation: O) -> Result<O::Output, AppError>
    where
        O: FailoverOperation,
    {
        let total = self.pool.len();
        let mut last_error: Option<AppError> = None;

        for credential in self.pool.iter() {
            tracing::debug!(
                operation = label,
                credential = credential.ordinal(),
                "Attempting with {}",
                credential.label(total),
            );

            match operation.attempt(credential).await {
                Ok(output) => {
                    if credential.ordinal() > 0 {
                        tracing::info!(
                            operation = label,
                            credential = credential.ordinal(),
                            "Succeeded after failover on {}",
                            credential.label(total),
                        );
                    }
                    return Ok(output);
                }
                Err(err) if err.is_retriable() => {
                    tracing::warn!(
                        operation = label,
                        credential = credential.ordinal(),
                        kind = err.kind(),
                        "{} failed: {}",
                        credential.label(total),
                        err,
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::error!(
                        operation = label,
                        credential = credential.ordinal(),
                        kind = err.kind(),
                        "{} failed with non-retriable error: {}",
                        credential.label(total),
                        err,
                    );
                    return Err(err);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| {
            AppError::Configuration("no provider credentials configured".into())
        });
        Err(AppError::AggregateFailure {
            attempts: total,
            last: Box::new(last),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
