use crate::error_code::FailureCode;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key or request field that caused the error (e.g., "providers.acme.retry.max_attempts")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "circuit_breaker")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a resilience gate refused or abandoned a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    BulkheadFull,
    RateLimited,
    CircuitOpen,
    RetriesExhausted,
    TimedOut,
}

impl RejectionKind {
    pub fn code(&self) -> FailureCode {
        match self {
            RejectionKind::BulkheadFull => FailureCode::BulkheadFull,
            RejectionKind::RateLimited => FailureCode::RateLimited,
            RejectionKind::CircuitOpen => FailureCode::CircuitOpen,
            RejectionKind::RetriesExhausted => FailureCode::RetriesExhausted,
            RejectionKind::TimedOut => FailureCode::TimedOut,
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code().name())
    }
}

/// Unified error type for the enrichment runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("No provider found for type '{enrichment_type}' and tenant '{}'", .tenant_id.as_deref().unwrap_or("*"))]
    NotFound {
        enrichment_type: String,
        tenant_id: Option<String>,
    },

    #[error("Call to provider '{provider}' rejected: {kind}{}", .last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    Rejected {
        provider: String,
        kind: RejectionKind,
        last_error: Option<String>,
    },

    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Cache error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new cache error with structured context
    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    pub fn rejected(provider: impl Into<String>, kind: RejectionKind) -> Self {
        Error::Rejected {
            provider: provider.into(),
            kind,
            last_error: None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Cache { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The rejection class, if a resilience gate produced this error.
    pub fn rejection(&self) -> Option<RejectionKind> {
        match self {
            Error::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Only errors raised by the provider itself are worth another attempt.
    /// Gate rejections never retry themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { .. } | Error::Io(_))
    }

    /// Stable failure code for metrics and response metadata.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            Error::Rejected { kind, .. } => kind.code(),
            Error::Provider { .. } | Error::Io(_) => FailureCode::ProviderError,
            Error::NotFound { .. } => FailureCode::NotFound,
            _ => FailureCode::Unknown,
        }
    }
}
