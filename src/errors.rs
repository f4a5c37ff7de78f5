//! Error types for the benchmark engine and its units of work.
//!
//! Engine errors are configuration or accounting problems raised by the core.
//! Operation errors are whatever a unit of work fails with; they are counted
//! per worker and never stop the run on their own. HTTP operations classify
//! their failures into an [`ErrorCategory`] for diagnostics.

use std::fmt;

use hdrhistogram::errors::CreationError;
use thiserror::Error;

/// Error returned by a single unit of work. Counted, logged, and then ignored.
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the engine itself.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid latency histogram bounds: {0:?}")]
    HistogramBounds(CreationError),

    #[error("Latency of {latency_ns}ns is outside the trackable range (highest {highest_ns}ns)")]
    LatencyOutOfRange { latency_ns: u64, highest_ns: u64 },

    #[error("A run requires at least one worker")]
    NoWorkers,
}

/// Categories of errors that can occur while issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP 4xx errors (client errors)
    ClientError,

    /// HTTP 5xx errors (server errors)
    ServerError,

    /// Network connectivity errors (DNS, connection refused, etc.)
    NetworkError,

    /// Request timeout errors
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// Malformed or unexpected response bodies
    ResponseError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code.
    ///
    /// Returns `None` for success responses (2xx/3xx).
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            200..=399 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::OtherError),
        }
    }

    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            if let Some(category) = Self::from_status_code(status.as_u16()) {
                return category;
            }
        }

        if error.is_timeout() {
            ErrorCategory::TimeoutError
        } else if error.is_connect() || error.is_request() || error.is_body() {
            ErrorCategory::NetworkError
        } else if error.is_decode() {
            ErrorCategory::ResponseError
        } else if error.is_redirect() {
            ErrorCategory::ClientError
        } else {
            let error_msg = error.to_string().to_lowercase();

            if error_msg.contains("certificate")
                || error_msg.contains("tls")
                || error_msg.contains("ssl")
            {
                ErrorCategory::TlsError
            } else if error_msg.contains("timeout") {
                ErrorCategory::TimeoutError
            } else if error_msg.contains("dns") || error_msg.contains("connect") {
                ErrorCategory::NetworkError
            } else {
                ErrorCategory::OtherError
            }
        }
    }

    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::ResponseError => "response_error",
            ErrorCategory::OtherError => "other_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failed request with its category attached.
#[derive(Debug, Clone)]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub status_code: Option<u16>,
    pub message: String,
}

impl CategorizedError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        Self {
            category: ErrorCategory::from_reqwest_error(error),
            status_code: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for CategorizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status_code {
            write!(f, "[{}] HTTP {}: {}", self.category, status, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for CategorizedError {}

impl From<reqwest::Error> for CategorizedError {
    fn from(error: reqwest::Error) -> Self {
        Self::from_reqwest(&error)
    }
}
