//! Stowage Storage Library
//!
//! Byte-level storage backends for the upload pipeline. Every backend implements
//! [`FileBackend`]: streaming writes and appends that report how many bytes landed,
//! whole-object reads, removal and moves.
//!
//! # Path format
//!
//! Paths are relative to the backend root:
//!
//! - **Attachments**: `{YYYYMMDD}/users/{user_id}/{id}/{file_name}`
//! - **Imports**: `{import_directory}/{id}_{file_name}`
//!
//! Paths must not contain `..` or a leading `/`. Path generation lives in the `keys`
//! module so every caller builds them the same way.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use stowage_core::StorageBackend;
pub use traits::{ByteReader, FileBackend, StorageError, StorageResult};
