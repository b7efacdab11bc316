//! Error types module
//!
//! Every caller-visible failure of the upload pipeline is an `AppError`. Variants are
//! grouped into a small taxonomy via [`AppError::kind`] so an outer transport can tell a
//! validation failure from a concurrency conflict, a storage failure or a plugin rejection
//! without matching on each variant.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is enabled and a
//! plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of an `AppError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    ConcurrencyConflict,
    Storage,
    PluginRejection,
    NotFound,
    Internal,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code an outer transport should return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "OFFSET_MISMATCH")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload session {session_id} is at offset {expected}, but the upload resumed from {actual}")]
    OffsetMismatch {
        session_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("First upload part too small: wrote {written} bytes, minimum is {min_size}")]
    FirstPartTooSmall { min_size: u64, written: u64 },

    #[error("Image too large: {width}x{height} exceeds {max_resolution} pixels")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_resolution: u64,
    },

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: i64, limit: u64 },

    #[error("Upload session {session_id} is already being written")]
    ConcurrencyConflict { session_id: Uuid },

    #[error("Upload rejected by plugin: {reason}")]
    PluginRejected { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Resume the upload from the last acknowledged offset"),
            false,
            LogLevel::Error,
        ),
        AppError::ImageProcessing(_) => (
            400,
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::OffsetMismatch { .. } => (
            400,
            "OFFSET_MISMATCH",
            true,
            Some("Fetch the upload session and resume from its offset"),
            false,
            LogLevel::Debug,
        ),
        AppError::FirstPartTooSmall { .. } => (
            400,
            "FIRST_PART_TOO_SMALL",
            false,
            Some("Send a larger first chunk"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageTooLarge { .. } => (
            400,
            "IMAGE_TOO_LARGE",
            false,
            Some("Reduce the image resolution"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::ConcurrencyConflict { .. } => (
            409,
            "CONCURRENT_UPLOAD",
            true,
            Some("Wait for the in-flight chunk to finish and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::PluginRejected { .. } => (
            400,
            "UPLOAD_REJECTED",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_)
            | AppError::OffsetMismatch { .. }
            | AppError::FirstPartTooSmall { .. }
            | AppError::ImageTooLarge { .. }
            | AppError::FileTooLarge { .. } => ErrorKind::Validation,
            AppError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            AppError::Storage(_) => ErrorKind::Storage,
            AppError::PluginRejected { .. } => ErrorKind::PluginRejection,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Database(_)
            | AppError::ImageProcessing(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => ErrorKind::Internal,
        }
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::OffsetMismatch { .. } => "OffsetMismatch",
            AppError::FirstPartTooSmall { .. } => "FirstPartTooSmall",
            AppError::ImageTooLarge { .. } => "ImageTooLarge",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::ConcurrencyConflict { .. } => "ConcurrencyConflict",
            AppError::PluginRejected { .. } => "PluginRejected",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::Storage(ref msg)
            | AppError::ImageProcessing(ref msg)
            | AppError::InvalidInput(ref msg)
            | AppError::NotFound(ref msg) => msg.clone(),
            AppError::PluginRejected { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}
