//! Resource keys and media kind detection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifies a media resource within a scope (usually a task)
///
/// Two keys are equal only when both the scope and the path match, so the same
/// file referenced from two tasks is cached twice. This keeps per-task access
/// control on the server authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    scope_id: String,
    path: String,
}

impl ResourceKey {
    pub fn new(scope_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            path: path.into(),
        }
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this key belongs to the given scope
    pub fn in_scope(&self, scope_id: &str) -> bool {
        self.scope_id == scope_id
    }

    /// Media kind inferred from the path's extension
    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_path(&self.path)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope_id, self.path)
    }
}

/// Broad category of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Text,
    Other,
}

impl MediaKind {
    /// Classify a path by its (case-insensitive) extension
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp") => MediaKind::Image,
            Some("mp4" | "avi" | "mov" | "wmv" | "flv" | "webm") => MediaKind::Video,
            Some("wav" | "mp3" | "flac" | "aac" | "ogg") => MediaKind::Audio,
            Some("txt" | "json" | "csv" | "md") => MediaKind::Text,
            _ => MediaKind::Other,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Text => write!(f, "text"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// MIME type the media endpoint serves for this path
pub fn mime_type_for_path(path: &str) -> &'static str {
    match extension(path).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        Some("ogg") => "audio/ogg",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
