//! Attachment Download Manager
//!
//! Drives concurrent downloads of pending image attachments into the
//! attachments directory. Non-image attachments are marked skipped; image
//! fetches retry with linear backoff before the row transitions to
//! `failed`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::{CancelSignal, JobStatus};
use crate::config::Settings;
use crate::domain::{AttachmentRepository, ChannelAttachment, DownloadState};
use crate::infrastructure::database::DataSourceRegistry;
use crate::infrastructure::repositories::SqlAttachmentRepository;
use crate::shared::error::AppError;

/// Base delay for the linear retry backoff.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Live progress of a download job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadProgress {
    pub total_images: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub current_channel: Option<String>,
}

/// Snapshot record of one download job.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub id: String,
    pub status: JobStatus,
    pub progress: DownloadProgress,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct DownloadJobState {
    current: Option<DownloadJob>,
    cancel: Option<CancelSignal>,
}

struct DownloadManagerInner {
    registry: Arc<DataSourceRegistry>,
    settings: Arc<Settings>,
    http: reqwest::Client,
    state: Mutex<DownloadJobState>,
}

/// Manager enforcing at-most-one running download job.
pub struct DownloadManager {
    inner: Arc<DownloadManagerInner>,
}

impl DownloadManager {
    pub fn new(registry: Arc<DataSourceRegistry>, settings: Arc<Settings>) -> Self {
        Self {
            inner: Arc::new(DownloadManagerInner {
                registry,
                settings,
                http: reqwest::Client::new(),
                state: Mutex::new(DownloadJobState::default()),
            }),
        }
    }

    /// Start a download job. Fails with a conflict while one is busy.
    pub fn start(&self) -> Result<DownloadJob, AppError> {
        let cancel = CancelSignal::new();
        let job = {
            let mut state = self.inner.state.lock();
            if state
                .current
                .as_ref()
                .map(|j| j.status.is_busy())
                .unwrap_or(false)
            {
                return Err(AppError::Conflict("a download job is already running".into()));
            }
            let job = DownloadJob {
                id: Uuid::new_v4().to_string(),
                status: JobStatus::Pending,
                progress: DownloadProgress::default(),
                started_at: None,
                completed_at: None,
                duration_seconds: None,
                error_message: None,
            };
            state.current = Some(job.clone());
            state.cancel = Some(cancel.clone());
            job
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_job(cancel).await;
        });

        Ok(job)
    }

    /// Request cancellation of the running job. Idempotent; returns
    /// whether a busy job was asked to stop.
    pub fn cancel(&self) -> bool {
        let state = self.inner.state.lock();
        match (&state.current, &state.cancel) {
            (Some(job), Some(cancel)) if job.status.is_busy() => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the current (possibly terminal) job record.
    pub fn current_job(&self) -> Option<DownloadJob> {
        self.inner.state.lock().current.clone()
    }

    /// Whether a job is pending or running.
    pub fn is_busy(&self) -> bool {
        self.inner
            .state
            .lock()
            .current
            .as_ref()
            .map(|j| j.status.is_busy())
            .unwrap_or(false)
    }
}

impl DownloadManagerInner {
    async fn run_job(self: Arc<Self>, cancel: CancelSignal) {
        self.update_job(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        });
        tracing::info!("Download job started");

        let outcome = self.execute(&cancel).await;
        let cancelled = cancel.is_cancelled();

        self.update_job(|job| {
            let now = Utc::now();
            job.completed_at = Some(now);
            job.duration_seconds = job
                .started_at
                .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
            match outcome {
                Ok(()) => {
                    job.status = if cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Completed
                    };
                }
                Err(e) => {
                    job.error_message = Some(e.to_string());
                    job.status = if cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Failed
                    };
                }
            }
            tracing::info!(status = %job.status, "Download job finished");
        });
    }

    async fn execute(&self, cancel: &CancelSignal) -> Result<(), AppError> {
        let pool = self.registry.get_active()?;
        let repo = SqlAttachmentRepository::new(pool);
        let pending = repo.list_pending().await?;

        let (images, others): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|p| p.attachment.is_image());

        self.update_job(|job| job.progress.total_images = images.len() as u64);

        // Non-images are excluded from download once and for all.
        for other in &others {
            repo.set_download_state(other.attachment.id, DownloadState::Skipped, None, Utc::now())
                .await?;
            self.update_job(|job| job.progress.skipped += 1);
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        // A continuously refilled pool of up to `concurrency` transfers;
        // the cancel signal is checked between per-attachment fetches, and
        // dropping the stream stops scheduling new ones.
        let concurrency = self.settings.downloads.concurrency.max(1);
        stream::iter(images.iter())
            .for_each_concurrent(concurrency, |pending| {
                let repo = repo.clone();
                async move {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let channel_id = self.download_one(&repo, pending).await;
                    self.update_job(|job| {
                        job.progress.current_channel = Some(channel_id.to_string());
                    });
                }
            })
            .await;

        Ok(())
    }

    /// Fetch one attachment with bounded retries, write it under
    /// `{base}/{channel_id}/{attachment_id}{ext}` and transition the row.
    /// Returns the owning channel for progress reporting.
    async fn download_one(
        &self,
        repo: &SqlAttachmentRepository,
        pending: &ChannelAttachment,
    ) -> i64 {
        let attachment = &pending.attachment;
        let target = self.local_path(pending);
        let max_attempts = self.settings.downloads.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.try_fetch(&attachment.remote_url, &target).await {
                Ok(()) => {
                    let stored = target.to_string_lossy().to_string();
                    if let Err(e) = repo
                        .set_download_state(
                            attachment.id,
                            DownloadState::Downloaded,
                            Some(&stored),
                            Utc::now(),
                        )
                        .await
                    {
                        tracing::error!(attachment_id = attachment.id, error = %e,
                            "Failed to record downloaded attachment");
                        return pending.channel_id;
                    }
                    self.update_job(|job| job.progress.downloaded += 1);
                    return pending.channel_id;
                }
                Err(e) if attempt < max_attempts => {
                    tracing::debug!(attachment_id = attachment.id, attempt, error = %e,
                        "Attachment fetch failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    tracing::warn!(attachment_id = attachment.id, error = %e,
                        "Attachment fetch failed permanently");
                    if let Err(e) = repo
                        .set_download_state(attachment.id, DownloadState::Failed, None, Utc::now())
                        .await
                    {
                        tracing::error!(attachment_id = attachment.id, error = %e,
                            "Failed to record failed attachment");
                    }
                    self.update_job(|job| job.progress.failed += 1);
                    return pending.channel_id;
                }
            }
        }
        pending.channel_id
    }

    async fn try_fetch(&self, url: &str, target: &PathBuf) -> Result<(), AppError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, &bytes).await?;
        Ok(())
    }

    /// `{base}/{channel_id}/{attachment_id}{ext}`
    fn local_path(&self, pending: &ChannelAttachment) -> PathBuf {
        let extension = pending
            .attachment
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        PathBuf::from(&self.settings.downloads.attachments_path)
            .join(pending.channel_id.to_string())
            .join(format!("{}{}", pending.attachment.id, extension))
    }

    fn update_job(&self, f: impl FnOnce(&mut DownloadJob)) {
        let mut state = self.state.lock();
        if let Some(job) = state.current.as_mut() {
            f(job);
        }
    }
}
