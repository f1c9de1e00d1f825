use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::storage_types::ProviderKind;

/// File category enum
///
/// Derived from the MIME type at upload time. Selects both the canonical `category`
/// and the namespace (bucket or collection) an adapter writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Image,
        FileCategory::Video,
        FileCategory::Audio,
        FileCategory::Document,
    ];

    /// `image/*` -> image, `video/*` -> video, `audio/*` -> audio, anything else -> document
    pub fn from_mime(mime_type: &str) -> Self {
        let top_level = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match top_level.as_str() {
            "image" => FileCategory::Image,
            "video" => FileCategory::Video,
            "audio" => FileCategory::Audio,
            _ => FileCategory::Document,
        }
    }

    /// Path segment used inside generated storage keys
    pub fn sub_path(&self) -> &'static str {
        match self {
            FileCategory::Image => "images",
            FileCategory::Video => "videos",
            FileCategory::Audio => "audio",
            FileCategory::Document => "documents",
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileCategory::Image => write!(f, "image"),
            FileCategory::Video => write!(f, "video"),
            FileCategory::Audio => write!(f, "audio"),
            FileCategory::Document => write!(f, "document"),
        }
    }
}

/// A file handed to the switcher by the application.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn category(&self) -> FileCategory {
        FileCategory::from_mime(&self.mime_type)
    }
}

/// Backend-agnostic record of one stored file.
///
/// `provider` is the backend that answered the successful write. After a fallback it
/// names the fallback provider, never the one originally selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFileRecord {
    pub id: String,
    pub name: String,
    pub original_name: String,
    pub category: FileCategory,
    pub url: String,
    pub public_url: String,
    pub size: u64,
    pub mime_type: String,
    pub upload_date: DateTime<Utc>,
    pub provider: ProviderKind,
    pub storage_namespace: String,
    pub path: String,
    /// Adapter-specific extras (record ids, object ids, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, JsonValue>,
}
