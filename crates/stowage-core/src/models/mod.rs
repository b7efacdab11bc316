//! Domain models of the upload pipeline

pub mod file_info;
pub mod upload_session;

pub use file_info::{DerivativePaths, FileInfo};
pub use upload_session::{NewUploadSession, UploadSession, UploadState, UploadType};
