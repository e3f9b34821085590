//! Attachment Repository Implementation
//!
//! Attachment rows carry the download lifecycle used by the download
//! manager; the gallery queries join through messages to reach the channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp};
use crate::domain::{Attachment, AttachmentRepository, DownloadState, ChannelAttachment};
use crate::shared::error::AppError;

const ATTACHMENT_COLUMNS: &str = "id, message_id, filename, content_type, size, remote_url, \
                                  proxy_url, width, height, local_path, download_state, \
                                  created_at, updated_at";

/// Store-agnostic attachment repository.
#[derive(Clone)]
pub struct SqlAttachmentRepository {
    pool: AnyPool,
}

impl SqlAttachmentRepository {
    /// Creates a new SqlAttachmentRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for attachment queries.
#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    message_id: i64,
    filename: String,
    content_type: Option<String>,
    size: i64,
    remote_url: String,
    proxy_url: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    local_path: Option<String>,
    download_state: String,
    created_at: String,
    updated_at: String,
}

impl AttachmentRow {
    fn into_attachment(self) -> Attachment {
        Attachment {
            id: self.id,
            message_id: self.message_id,
            filename: self.filename,
            content_type: self.content_type,
            size: self.size,
            remote_url: self.remote_url,
            proxy_url: self.proxy_url,
            width: self.width,
            height: self.height,
            local_path: self.local_path,
            download_state: DownloadState::from_str(&self.download_state),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

/// Attachment row joined with the owning channel.
#[derive(Debug, sqlx::FromRow)]
struct JoinedAttachmentRow {
    id: i64,
    message_id: i64,
    filename: String,
    content_type: Option<String>,
    size: i64,
    remote_url: String,
    proxy_url: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    local_path: Option<String>,
    download_state: String,
    created_at: String,
    updated_at: String,
    channel_id: i64,
}

impl JoinedAttachmentRow {
    fn into_channel_attachment(self) -> ChannelAttachment {
        let channel_id = self.channel_id;
        let attachment = Attachment {
            id: self.id,
            message_id: self.message_id,
            filename: self.filename,
            content_type: self.content_type,
            size: self.size,
            remote_url: self.remote_url,
            proxy_url: self.proxy_url,
            width: self.width,
            height: self.height,
            local_path: self.local_path,
            download_state: DownloadState::from_str(&self.download_state),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        };
        ChannelAttachment {
            attachment,
            channel_id,
        }
    }
}

const JOINED_COLUMNS: &str = "a.id, a.message_id, a.filename, a.content_type, a.size, \
                              a.remote_url, a.proxy_url, a.width, a.height, a.local_path, \
                              a.download_state, a.created_at, a.updated_at, \
                              m.channel_id AS channel_id";

impl SqlAttachmentRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(
        executor: E,
        attachment: &Attachment,
    ) -> Result<Attachment, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            INSERT INTO attachments (id, message_id, filename, content_type, size,
                                     remote_url, proxy_url, width, height, local_path,
                                     download_state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                message_id = $2, filename = $3, content_type = $4, size = $5,
                remote_url = $6, proxy_url = $7, width = $8, height = $9,
                local_path = $10, download_state = $11, updated_at = $13
            RETURNING id, message_id, filename, content_type, size, remote_url,
                      proxy_url, width, height, local_path, download_state,
                      created_at, updated_at
            "#,
        )
        .bind(attachment.id)
        .bind(attachment.message_id)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(&attachment.remote_url)
        .bind(&attachment.proxy_url)
        .bind(attachment.width)
        .bind(attachment.height)
        .bind(&attachment.local_path)
        .bind(attachment.download_state.as_str())
        .bind(format_timestamp(attachment.created_at))
        .bind(format_timestamp(attachment.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_attachment())
    }

    /// Downloaded images for the gallery, newest first, optionally filtered
    /// to one channel.
    pub async fn list_downloaded(
        &self,
        channel_id: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ChannelAttachment>, AppError> {
        let limit = limit.clamp(1, 200);

        let rows = match channel_id {
            Some(channel_id) => {
                sqlx::query_as::<_, JoinedAttachmentRow>(&format!(
                    "SELECT {} FROM attachments a JOIN messages m ON m.id = a.message_id \
                     WHERE a.download_state = 'downloaded' AND m.channel_id = $1 \
                     ORDER BY a.id DESC LIMIT $2 OFFSET $3",
                    JOINED_COLUMNS
                ))
                .bind(channel_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JoinedAttachmentRow>(&format!(
                    "SELECT {} FROM attachments a JOIN messages m ON m.id = a.message_id \
                     WHERE a.download_state = 'downloaded' \
                     ORDER BY a.id DESC LIMIT $1 OFFSET $2",
                    JOINED_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_channel_attachment()).collect())
    }
}

#[async_trait]
impl AttachmentRepository for SqlAttachmentRepository {
    async fn get(&self, id: i64) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments WHERE id = $1",
            ATTACHMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_attachment()))
    }

    async fn upsert(&self, attachment: &Attachment) -> Result<Attachment, AppError> {
        Ok(Self::upsert_with(&self.pool, attachment).await?)
    }

    async fn bulk_upsert(&self, attachments: &[Attachment]) -> Result<u64, AppError> {
        if attachments.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for attachment in attachments {
            Self::upsert_with(&mut *tx, attachment).await?;
        }
        tx.commit().await?;
        Ok(attachments.len() as u64)
    }

    async fn list_by_message(&self, message_id: i64) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments WHERE message_id = $1 ORDER BY id ASC",
            ATTACHMENT_COLUMNS
        ))
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_attachment()).collect())
    }

    async fn list_pending(&self) -> Result<Vec<ChannelAttachment>, AppError> {
        let rows = sqlx::query_as::<_, JoinedAttachmentRow>(&format!(
            "SELECT {} FROM attachments a JOIN messages m ON m.id = a.message_id \
             WHERE a.download_state = 'pending' ORDER BY a.id ASC",
            JOINED_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_channel_attachment()).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attachments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments ORDER BY id ASC LIMIT $1 OFFSET $2",
            ATTACHMENT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_attachment()).collect())
    }

    async fn set_download_state(
        &self,
        id: i64,
        state: DownloadState,
        local_path: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE attachments SET download_state = $2, local_path = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(local_path)
        .bind(format_timestamp(at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
