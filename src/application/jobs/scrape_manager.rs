//! Scrape Job Manager
//!
//! Owns the long-running scrape task. Holds the data source registry (not
//! a single store) and resolves the active store when the task begins, so
//! a source switch between jobs takes effect without a restart.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::download_manager::DownloadManager;
use super::{CancelSignal, JobStatus};
use crate::application::services::{ScrapeOptions, ScrapeProgressEvent, ScrapeSummary, Scraper};
use crate::config::Settings;
use crate::infrastructure::database::DataSourceRegistry;
use crate::infrastructure::discord::{DiscordChannel, DiscordClientProvider};
use crate::shared::error::AppError;
use crate::shared::snowflake;

/// Bounded retention for past job records; the oldest is evicted.
const HISTORY_LIMIT: usize = 100;

/// Live progress of a scrape job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeProgress {
    pub current_channel: Option<String>,
    pub channels_done: u64,
    pub channels_total: u64,
    pub messages_scraped: u64,
    pub attachments_found: u64,
    pub errors: Vec<String>,
}

/// Snapshot record of one scrape job.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeJob {
    pub id: String,
    #[serde(with = "snowflake::serde_string")]
    pub guild_id: i64,
    #[serde(with = "snowflake::serde_string_vec_opt")]
    pub channel_ids: Option<Vec<i64>>,
    /// `"guild"` for full-guild runs, `"channels"` for a selected subset
    pub scope: &'static str,
    pub status: JobStatus,
    pub progress: ScrapeProgress,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub result: Option<ScrapeSummary>,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct ScrapeState {
    current: Option<ScrapeJob>,
    cancel: Option<CancelSignal>,
    history: VecDeque<ScrapeJob>,
}

struct ScrapeManagerInner {
    registry: Arc<DataSourceRegistry>,
    discord: Arc<dyn DiscordClientProvider>,
    settings: Arc<Settings>,
    downloads: Option<Arc<DownloadManager>>,
    state: Mutex<ScrapeState>,
}

/// Manager enforcing at-most-one running scrape.
pub struct ScrapeManager {
    inner: Arc<ScrapeManagerInner>,
}

impl ScrapeManager {
    pub fn new(
        registry: Arc<DataSourceRegistry>,
        discord: Arc<dyn DiscordClientProvider>,
        settings: Arc<Settings>,
        downloads: Option<Arc<DownloadManager>>,
    ) -> Self {
        Self {
            inner: Arc::new(ScrapeManagerInner {
                registry,
                discord,
                settings,
                downloads,
                state: Mutex::new(ScrapeState::default()),
            }),
        }
    }

    /// Start a scrape job. Fails with a conflict while one is pending or
    /// running, and rejects an explicitly empty channel subset (a no-op
    /// scrape is always caller error).
    pub fn start(
        &self,
        guild_id: i64,
        channel_ids: Option<Vec<i64>>,
    ) -> Result<ScrapeJob, AppError> {
        if let Some(ids) = &channel_ids {
            if ids.is_empty() {
                return Err(AppError::BadRequest("channel_ids must not be empty".into()));
            }
        }
        if !self.inner.discord.has_token() {
            return Err(AppError::Config("DISCORD_TOKEN is not set".into()));
        }

        let cancel = CancelSignal::new();
        let job = {
            let mut state = self.inner.state.lock();
            if state
                .current
                .as_ref()
                .map(|j| j.status.is_busy())
                .unwrap_or(false)
            {
                return Err(AppError::Conflict("a scrape job is already running".into()));
            }

            let job = ScrapeJob {
                id: Uuid::new_v4().to_string(),
                guild_id,
                scope: if channel_ids.is_some() { "channels" } else { "guild" },
                progress: ScrapeProgress {
                    channels_total: channel_ids.as_ref().map_or(0, |ids| ids.len() as u64),
                    ..Default::default()
                },
                channel_ids,
                status: JobStatus::Pending,
                started_at: None,
                completed_at: None,
                duration_seconds: None,
                result: None,
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
    pub fn current_job(&self) -> Option<ScrapeJob> {
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

    /// Whether a Discord credential is configured.
    pub fn has_token(&self) -> bool {
        self.inner.discord.has_token()
    }

    /// Past job records, most recent first.
    pub fn history(&self) -> Vec<ScrapeJob> {
        self.inner.state.lock().history.iter().rev().cloned().collect()
    }

    /// Fetch the guild's live channel listing with a throwaway client.
    ///
    /// Degrades to `None` on any failure, including client construction;
    /// callers fall back to the persisted channel list.
    pub async fn fetch_live_channels(&self, guild_id: i64) -> Option<Vec<DiscordChannel>> {
        let client = self.inner.discord.client().ok()?;
        client.login().await.ok()?;
        client.get_guild_channels(guild_id).await.ok()
    }
}

impl ScrapeManagerInner {
    async fn run_job(self: Arc<Self>, cancel: CancelSignal) {
        let (guild_id, channel_ids) = {
            let state = self.state.lock();
            match state.current.as_ref() {
                Some(job) => (job.guild_id, job.channel_ids.clone()),
                None => return,
            }
        };

        self.update_job(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        });
        tracing::info!(guild_id, "Scrape job started");

        let outcome = self.execute(guild_id, channel_ids, &cancel).await;
        let cancelled = cancel.is_cancelled();
        let completed_ok = outcome.is_ok() && !cancelled;

        self.update_job(|job| {
            let now = Utc::now();
            job.completed_at = Some(now);
            job.duration_seconds = job
                .started_at
                .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
            match outcome {
                Ok(summary) => {
                    job.progress.errors = summary.errors.clone();
                    job.result = Some(summary);
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
            tracing::info!(guild_id, status = %job.status, "Scrape job finished");
        });

        {
            let mut state = self.state.lock();
            if let Some(job) = state.current.clone() {
                state.history.push_back(job);
                while state.history.len() > HISTORY_LIMIT {
                    state.history.pop_front();
                }
            }
        }

        if completed_ok && self.settings.scrape.auto_download {
            if let Some(downloads) = &self.downloads {
                match downloads.start() {
                    Ok(_) => tracing::info!("Auto-started attachment download job"),
                    Err(e) => tracing::warn!(error = %e, "Auto-download not started"),
                }
            }
        }
    }

    async fn execute(
        &self,
        guild_id: i64,
        channel_ids: Option<Vec<i64>>,
        cancel: &CancelSignal,
    ) -> Result<ScrapeSummary, AppError> {
        let pool = self.registry.get_active()?;
        let client = self.discord.client()?;
        client.login().await?;

        let options = ScrapeOptions {
            guild_id,
            channel_ids,
            batch_size: self.settings.scrape.batch_size,
            request_delay: Duration::from_millis(self.settings.scrape.request_delay_ms),
        };
        let scraper = Scraper::new(client, pool, options);
        scraper
            .run(cancel, &|event| self.apply_progress(event))
            .await
    }

    fn apply_progress(&self, event: ScrapeProgressEvent) {
        self.update_job(|job| {
            job.progress.current_channel = Some(event.current_channel);
            job.progress.channels_done = event.channels_done;
            job.progress.channels_total = event.channels_total;
            job.progress.messages_scraped = event.messages_scraped;
            job.progress.attachments_found = event.attachments_found;
            job.progress.errors = event.errors;
        });
    }

    fn update_job(&self, f: impl FnOnce(&mut ScrapeJob)) {
        let mut state = self.state.lock();
        if let Some(job) = state.current.as_mut() {
            f(job);
        }
    }
}
