//! Stowage Upload
//!
//! Resumable uploads with crash-consistent offsets. A session is created up front with its
//! declared size; chunks are appended one caller at a time; when the last byte lands the
//! file record is built, plugin hooks run and image derivatives are generated.
//!
//! ```ignore
//! let service = UploadService::from_config(UploadConfig::from_env()?).await?;
//! let session = service.create_upload_session(request).await?;
//! match service.upload_data(&session, body).await? {
//!     UploadOutcome::Incomplete(session) => { /* ask for more from session.file_offset */ }
//!     UploadOutcome::Finished(info) => { /* done */ }
//! }
//! ```

pub mod extractor;
mod files;
mod finalizer;
pub mod guard;
pub mod service;
mod single_shot;
pub mod writer;

pub use extractor::{truncate_on_char_boundary, ContentExtractor, PlainTextExtractor};
pub use guard::{UploadLockGuard, UploadLocks};
pub use service::{UploadService, UploadServiceBuilder};
pub use writer::UploadOutcome;
