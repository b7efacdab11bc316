//! Shared path generation for stored objects.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Final path segment of `file_name`, with any client-supplied directories dropped.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}

/// `{YYYYMMDD}/users/{user_id}/{id}/{base_name}`
pub fn attachment_path(created_at: DateTime<Utc>, user_id: Uuid, id: Uuid, file_name: &str) -> String {
    format!(
        "{}/users/{}/{}/{}",
        created_at.format("%Y%m%d"),
        user_id,
        id,
        base_name(file_name)
    )
}

/// `{import_directory}/{id}_{base_name}`
pub fn import_path(import_directory: &str, id: Uuid, file_name: &str) -> String {
    format!(
        "{}/{}_{}",
        import_directory.trim_end_matches('/'),
        id,
        base_name(file_name)
    )
}

/// Reject paths that could escape the backend root.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidKey("Storage path is empty".to_string()));
    }
    if path.contains("..") || path.starts_with('/') || path.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage path contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
