//! Issue reporting: draft validation, attachment loading and submission.

use std::path::Path;

use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::api::{BackendClient, IssueApi};
use crate::errors::AppError;
use crate::models::Issue;

pub const CATEGORIES: &[&str] = &[
    "Infrastructure",
    "Electrical",
    "Plumbing",
    "Cleanliness",
    "Safety",
    "IT",
    "Other",
];

pub const MAX_PHOTOS: usize = 5;
pub const MAX_VIDEOS: usize = 1;
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueDraft {
    #[validate(length(min = 10, max = 2000, message = "description must be 10-2000 characters"))]
    pub description: String,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude out of range"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude out of range"))]
    pub longitude: f64,
    #[serde(rename = "location", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    if CATEGORIES.iter().any(|c| c.eq_ignore_ascii_case(category)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("category");
        err.message = Some(format!("unknown category '{}'", category).into());
        Err(err)
    }
}

impl IssueDraft {
    /// Canonical category spelling, e.g. `plumbing` -> `Plumbing`.
    fn normalised(mut self) -> Self {
        if let Some(c) = CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(&self.category))
        {
            self.category = c.to_string();
        }
        self.description = self.description.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime: &'static str,
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

fn media_type(file_name: &str) -> Option<(&'static str, MediaKind)> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(("image/jpeg", MediaKind::Photo)),
        "png" => Some(("image/png", MediaKind::Photo)),
        "webp" => Some(("image/webp", MediaKind::Photo)),
        "mp4" => Some(("video/mp4", MediaKind::Video)),
        "mov" => Some(("video/quicktime", MediaKind::Video)),
        "3gp" => Some(("video/3gpp", MediaKind::Video)),
        _ => None,
    }
}

impl Attachment {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AppError> {
        let file_name = file_name.into();
        let (mime, kind) = media_type(&file_name).ok_or_else(|| {
            AppError::Attachment(format!("unsupported file type: {}", file_name))
        })?;
        if bytes.is_empty() {
            return Err(AppError::Attachment(format!("{} is empty", file_name)));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AppError::Attachment(format!(
                "{} is {} bytes, limit is {}",
                file_name,
                bytes.len(),
                MAX_ATTACHMENT_BYTES
            )));
        }
        Ok(Self {
            file_name,
            mime,
            kind,
            bytes,
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Attachment(format!("bad attachment path: {}", path.display())))?
            .to_string();
        // Reject by extension before reading a possibly large file.
        if media_type(&file_name).is_none() {
            return Err(AppError::Attachment(format!("unsupported file type: {}", file_name)));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Attachment(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_bytes(file_name, bytes)
    }
}

pub fn check_attachments(attachments: &[Attachment]) -> Result<(), AppError> {
    let photos = attachments.iter().filter(|a| a.kind == MediaKind::Photo).count();
    let videos = attachments.len() - photos;
    if photos > MAX_PHOTOS {
        return Err(AppError::Attachment(format!(
            "at most {} photos per report, got {}",
            MAX_PHOTOS, photos
        )));
    }
    if videos > MAX_VIDEOS {
        return Err(AppError::Attachment(format!(
            "at most {} video per report, got {}",
            MAX_VIDEOS, videos
        )));
    }
    Ok(())
}

/// Validate and submit a report on behalf of `email`.
pub async fn submit(
    client: &BackendClient,
    email: &str,
    draft: IssueDraft,
    attachments: &[Attachment],
) -> Result<Issue, AppError> {
    draft.validate()?;
    check_attachments(attachments)?;
    let draft = draft.normalised();

    let user = client.find_user_by_email(email).await?;
    client.submit_issue(user.id, &draft, attachments).await
}
