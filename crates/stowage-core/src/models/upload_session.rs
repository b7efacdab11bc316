use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::constants::IMPORT_STAGING_SUFFIX;
use crate::error::{AppError, AppResult};

/// Kind of resumable upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "upload_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Attachment,
    Import,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Attachment => "attachment",
            UploadType::Import => "import",
        }
    }
}

impl FromStr for UploadType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "attachment" => Ok(UploadType::Attachment),
            "import" => Ok(UploadType::Import),
            _ => Err(AppError::InvalidInput(format!("Invalid upload type: {}", s))),
        }
    }
}

impl Display for UploadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Where a session sits in its lifecycle. A finalized session no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Created,
    InProgress,
    Complete,
}

/// An in-progress resumable transfer.
///
/// `file_size` is fixed at creation. `file_offset` counts the bytes durably written so
/// far and only ever grows, bounded by `file_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub upload_type: UploadType,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_offset: i64,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn state(&self) -> UploadState {
        if self.file_offset == 0 {
            UploadState::Created
        } else if self.file_offset < self.file_size {
            UploadState::InProgress
        } else {
            UploadState::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == UploadState::Complete
    }

    /// Bytes still expected before the session is complete
    pub fn remaining(&self) -> u64 {
        (self.file_size - self.file_offset).max(0) as u64
    }

    /// Backend location bytes are written to while the upload is incomplete.
    ///
    /// Imports are staged next to their final path so a partially uploaded import is
    /// never picked up by the importer.
    pub fn upload_path(&self) -> String {
        match self.upload_type {
            UploadType::Import => format!("{}{}", self.path, IMPORT_STAGING_SUFFIX),
            UploadType::Attachment => self.path.clone(),
        }
    }

    pub fn is_valid(&self) -> AppResult<()> {
        if self.id.is_nil() {
            return Err(AppError::InvalidInput(
                "Upload session id must be set".to_string(),
            ));
        }
        if self.user_id.is_nil() {
            return Err(AppError::InvalidInput(
                "Upload session user id must be set".to_string(),
            ));
        }
        if self.file_name.is_empty() {
            return Err(AppError::InvalidInput(
                "Upload session file name must not be empty".to_string(),
            ));
        }
        if self.path.is_empty() {
            return Err(AppError::InvalidInput(
                "Upload session path must not be empty".to_string(),
            ));
        }
        if self.file_size <= 0 {
            return Err(AppError::InvalidInput(format!(
                "Upload session file size must be positive, got {}",
                self.file_size
            )));
        }
        if self.file_offset < 0 || self.file_offset > self.file_size {
            return Err(AppError::InvalidInput(format!(
                "Upload session offset {} is outside 0..={}",
                self.file_offset, self.file_size
            )));
        }
        Ok(())
    }
}

/// Request to open a new upload session
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUploadSession {
    #[serde(rename = "type")]
    pub upload_type: UploadType,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
}
