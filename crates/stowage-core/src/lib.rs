//! Stowage Core Library
//!
//! Domain models, the error taxonomy, configuration and plugin hook traits shared by
//! every crate of the upload pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage_types;
pub mod telemetry;

// Re-export commonly used types
pub use config::UploadConfig;
pub use error::{AppError, AppResult, ErrorKind, ErrorMetadata, LogLevel};
pub use hooks::{run_upload_hooks, FileUploadHook, HookOutcome, NoOpUploadHook, UploadContext};
pub use models::{DerivativePaths, FileInfo, NewUploadSession, UploadSession, UploadState, UploadType};
pub use storage_types::StorageBackend;
