//! Stowage DB Library
//!
//! Metadata persistence for upload sessions and file records. The pipeline talks to the
//! [`UploadSessionStore`] and [`FileInfoStore`] traits; this crate ships an in-memory
//! implementation and PostgreSQL repositories built on sqlx.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{InMemoryFileInfoStore, InMemoryUploadSessionStore};
pub use postgres::{connect, PgFileInfoRepository, PgUploadSessionRepository};
pub use traits::{FileInfoStore, UploadSessionStore};
