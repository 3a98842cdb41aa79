use serde::Serialize;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly so a presentation layer gets structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("Provider error: {message}")]
    Provider {
        message: String,
        /// HTTP status reported by the provider, when there was one.
        status: Option<u16>,
        /// Whether switching to the next credential can fix this failure.
        retriable: bool,
    },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("All {attempts} credentials failed. Last error: {last}")]
    AggregateFailure { attempts: usize, last: Box<AppError> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Retriable provider failure (auth, quota, transient server error).
    pub fn retriable(message: impl Into<String>, status: Option<u16>) -> Self {
        AppError::Provider {
            message: message.into(),
            status,
            retriable: true,
        }
    }

    /// Provider failure that no other credential can fix.
    pub fn fatal(message: impl Into<String>, status: Option<u16>) -> Self {
        AppError::Provider {
            message: message.into(),
            status,
            retriable: false,
        }
    }

    /// Whether the failover invoker should move on to the next credential.
    ///
    /// Parse failures count as retriable: a nonconforming payload moves the
    /// invocation on to the next credential.
    pub fn is_retriable(&self) -> bool {
        match self {
            AppError::Provider { retriable, .. } => *retriable,
            AppError::Parse(_) => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::Request(_) => "request",
            AppError::Provider { retriable: true, .. } => "provider_retriable",
            AppError::Provider { retriable: false, .. } => "provider_fatal",
            AppError::Parse(_) => "parse",
            AppError::AggregateFailure { .. } => "aggregate_failure",
            AppError::Io(_) => "io",
        }
    }
}

/// Serialized as `{ error: "...", kind: "..." }` for frontend consumption.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}
