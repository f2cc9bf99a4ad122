use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use geobuild_blob::{BlobError, BlobStore};
use geobuild_core::new_id;

use crate::error::ChecklistError;

/// Largest accepted upload.
pub const MAX_PHOTO_BYTES: usize = 10_000_000;

const PREFIX: &str = "rm-checklist-photos";
const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Result of a successful upload, returned to the client as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPhoto {
    pub message: &'static str,
    pub url: String,
    pub file_name: String,
    pub section: String,
    pub slot: Option<i64>,
}

/// Site-visit photos, kept in the blob store under `rm-checklist-photos/`.
pub struct PhotoStore {
    blobs: Arc<dyn BlobStore>,
}

impl PhotoStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Validate and store one photo. Nothing is written unless every check passes.
    pub fn upload(
        &self,
        original_name: Option<&str>,
        data: &[u8],
        section: Option<&str>,
        slot: Option<i64>,
    ) -> Result<StoredPhoto, ChecklistError> {
        if data.is_empty() {
            return Err(ChecklistError::Validation("Photo file is required.".into()));
        }
        if data.len() > MAX_PHOTO_BYTES {
            return Err(ChecklistError::Validation(
                "Maximum allowed photo size is 10MB.".into(),
            ));
        }
        let extension = extension_of(original_name.unwrap_or_default());
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ChecklistError::Validation(
                "Only JPG, PNG and WEBP files are allowed.".into(),
            ));
        }

        let section = safe_section(section);
        let file_name = format!(
            "{section}-slot{}-{}-{}{extension}",
            slot.unwrap_or(0),
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            new_id()
        );
        self.blobs.put(&format!("{PREFIX}/{file_name}"), data)?;
        info!(file = %file_name, bytes = data.len(), "photo stored");

        Ok(StoredPhoto {
            message: "Photo uploaded successfully",
            url: format!("/api/rmChecklist/photos/{file_name}"),
            file_name,
            section,
            slot,
        })
    }

    /// Photo bytes and content type. Any directory part of `name` is ignored.
    pub fn open(&self, name: &str) -> Result<(Vec<u8>, &'static str), ChecklistError> {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        if file_name.is_empty() {
            return Err(ChecklistError::Validation("Invalid file name.".into()));
        }
        let data = match self.blobs.get(&format!("{PREFIX}/{file_name}")) {
            Ok(Some(data)) => data,
            Ok(None) | Err(BlobError::InvalidKey(_)) => {
                return Err(ChecklistError::NotFound("Photo not found.".into()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok((data, content_type(file_name)))
    }
}

/// Lowercased extension including the dot, or empty.
fn extension_of(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base.rfind('.') {
        Some(i) => base[i..].to_ascii_lowercase(),
        None => String::new(),
    }
}

fn safe_section(section: Option<&str>) -> String {
    let cleaned: String = section
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        "general".to_string()
    } else {
        cleaned
    }
}

fn content_type(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".webp" => "image/webp",
        ".gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
