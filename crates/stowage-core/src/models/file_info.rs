use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{PREVIEW_SUFFIX, THUMBNAIL_SUFFIX};

/// Canonical record of a stored file and its derivatives.
///
/// Everything except `mini_preview` (and the extracted `content`) is written once when
/// the record is created. `mini_preview` may be back-filled on first read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    /// Lower-case extension without the leading dot
    pub extension: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_preview_image: bool,
    pub thumbnail_path: Option<String>,
    pub preview_path: Option<String>,
    #[serde(
        with = "mini_preview_base64",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mini_preview: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Backend locations of the preview and thumbnail derived from an object path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativePaths {
    pub preview: String,
    pub thumbnail: String,
}

impl FileInfo {
    /// Build a record for `name`, deriving extension and MIME type from the name.
    pub fn new(creator_id: Uuid, name: &str, path: impl Into<String>, size: i64) -> Self {
        let now = Utc::now();
        let extension = extension_of(name);
        let mime_type = mime_guess::from_ext(&extension)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            id: Uuid::new_v4(),
            creator_id,
            name: name.to_string(),
            extension,
            path: path.into(),
            size,
            mime_type,
            width: None,
            height: None,
            has_preview_image: false,
            thumbnail_path: None,
            preview_path: None,
            mini_preview: None,
            content: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_svg(&self) -> bool {
        self.mime_type == "image/svg+xml"
    }

    pub fn is_gif(&self) -> bool {
        self.mime_type == "image/gif"
    }

    pub fn has_mini_preview(&self) -> bool {
        self.mini_preview.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// Pixel count, if both dimensions are known
    pub fn resolution(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }

    pub fn derivative_paths(&self) -> DerivativePaths {
        DerivativePaths::for_object(&self.path, &self.name)
    }
}

impl DerivativePaths {
    /// `dir(path)/{name without extension}{suffix}`
    pub fn for_object(path: &str, name: &str) -> Self {
        let dir = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        };
        let stem = match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        };

        Self {
            preview: format!("{}{}{}", dir, stem, PREVIEW_SUFFIX),
            thumbnail: format!("{}{}{}", dir, stem, THUMBNAIL_SUFFIX),
        }
    }
}

fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

mod mini_preview_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
