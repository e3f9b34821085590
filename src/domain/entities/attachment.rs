//! Attachment entity and repository trait.
//!
//! Maps to the `attachments` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Content types the downloader recognizes as images.
pub const IMAGE_CONTENT_TYPES: [&str; 7] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/avif",
    "image/bmp",
    "image/tiff",
];

/// Filename extensions accepted when the content type is missing.
pub const IMAGE_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "avif", "bmp", "tif", "tiff",
];

/// Download lifecycle of an attachment, stored as TEXT in
/// `attachments.download_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Discovered by the scraper, not fetched yet
    #[default]
    Pending,
    /// Fetched and stored on disk; `local_path` is set
    Downloaded,
    /// Fetching failed after bounded retries
    Failed,
    /// Not an image, or otherwise excluded from download
    Skipped,
}

impl DownloadState {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "downloaded" => Self::Downloaded,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents an archived file attachment.
///
/// Maps to the `attachments` table:
/// - id: BIGINT PRIMARY KEY (snowflake)
/// - message_id: BIGINT NOT NULL REFERENCES messages(id)
/// - filename: TEXT NOT NULL
/// - content_type: TEXT NULL
/// - size: BIGINT NOT NULL (bytes)
/// - remote_url: TEXT NOT NULL
/// - proxy_url: TEXT NULL
/// - width / height: BIGINT NULL
/// - local_path: TEXT NULL -- set once download_state = 'downloaded'
/// - download_state: TEXT NOT NULL DEFAULT 'pending'
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Message this attachment belongs to
    pub message_id: i64,

    /// Original filename
    pub filename: String,

    /// MIME type as reported by Discord
    pub content_type: Option<String>,

    /// Size in bytes
    pub size: i64,

    /// CDN URL of the original file
    pub remote_url: String,

    /// Proxied CDN URL
    pub proxy_url: Option<String>,

    /// Image width, when known
    pub width: Option<i64>,

    /// Image height, when known
    pub height: Option<i64>,

    /// Path of the stored file, relative to the attachments base
    pub local_path: Option<String>,

    /// Download lifecycle state
    pub download_state: DownloadState,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    /// Check whether the downloader should treat this attachment as an
    /// image, by content type first and filename extension as fallback.
    pub fn is_image(&self) -> bool {
        if let Some(ct) = &self.content_type {
            let ct = ct.split(';').next().unwrap_or(ct).trim().to_lowercase();
            if IMAGE_CONTENT_TYPES.contains(&ct.as_str()) {
                return true;
            }
        }
        self.extension()
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// The filename extension, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        if ext.is_empty() || ext.contains('/') {
            None
        } else {
            Some(ext)
        }
    }
}

impl Default for Attachment {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            message_id: 0,
            filename: String::new(),
            content_type: None,
            size: 0,
            remote_url: String::new(),
            proxy_url: None,
            width: None,
            height: None,
            local_path: None,
            download_state: DownloadState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An attachment joined with the channel that owns its message; the
/// downloader needs the channel to derive the storage path.
#[derive(Debug, Clone)]
pub struct ChannelAttachment {
    pub attachment: Attachment,
    pub channel_id: i64,
}

/// Repository trait for Attachment data access operations.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Find an attachment by its snowflake ID. Absent is not an error.
    async fn get(&self, id: i64) -> Result<Option<Attachment>, AppError>;

    /// Insert the attachment or overwrite its non-key fields, returning the
    /// persisted form.
    async fn upsert(&self, attachment: &Attachment) -> Result<Attachment, AppError>;

    /// Upsert a batch of attachments, returning the number written.
    async fn bulk_upsert(&self, attachments: &[Attachment]) -> Result<u64, AppError>;

    /// List attachments of a message, snowflake ascending.
    async fn list_by_message(&self, message_id: i64) -> Result<Vec<Attachment>, AppError>;

    /// List all attachments still in the `pending` state, joined with their
    /// channel.
    async fn list_pending(&self) -> Result<Vec<ChannelAttachment>, AppError>;

    /// Count all attachment rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Page attachment rows by offset, snowflake ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Attachment>, AppError>;

    /// Transition the download state, recording the stored path on success.
    async fn set_download_state(
        &self,
        id: i64,
        state: DownloadState,
        local_path: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
