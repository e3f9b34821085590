//! Cross-Store Transfer Manager
//!
//! Copies the six core tables from the file-backed source to the
//! server-backed target in one background task: count, then batched copy
//! in foreign-key order, then sequence repair on the target. Rows merge by
//! upsert, so re-running a transfer (or resuming after cancellation) is
//! idempotent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::AnyPool;
use uuid::Uuid;

use super::{CancelSignal, JobStatus};
use crate::config::Settings;
use crate::domain::{
    AttachmentRepository, ChannelRepository, GuildRepository, MessageRepository,
    ReactionRepository, UserRepository,
};
use crate::infrastructure::database::{schema, DataSourceRegistry, Dialect};
use crate::infrastructure::repositories::{
    SqlAttachmentRepository, SqlChannelRepository, SqlGuildRepository, SqlMessageRepository,
    SqlReactionRepository, SqlUserRepository,
};
use crate::shared::error::AppError;

/// The fixed transfer endpoints: file-backed store to server-backed store.
pub const SOURCE_NAME: &str = "sqlite";
pub const TARGET_NAME: &str = "postgres";

/// The six core tables in foreign-key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoreTable {
    Guilds,
    Users,
    Channels,
    Messages,
    Attachments,
    Reactions,
}

impl CoreTable {
    const ALL: [CoreTable; 6] = [
        CoreTable::Guilds,
        CoreTable::Users,
        CoreTable::Channels,
        CoreTable::Messages,
        CoreTable::Attachments,
        CoreTable::Reactions,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Guilds => "guilds",
            Self::Users => "users",
            Self::Channels => "channels",
            Self::Messages => "messages",
            Self::Attachments => "attachments",
            Self::Reactions => "reactions",
        }
    }

    async fn count(&self, pool: &AnyPool) -> Result<i64, AppError> {
        match self {
            Self::Guilds => SqlGuildRepository::new(pool.clone()).count().await,
            Self::Users => SqlUserRepository::new(pool.clone()).count().await,
            Self::Channels => SqlChannelRepository::new(pool.clone()).count().await,
            Self::Messages => SqlMessageRepository::new(pool.clone()).count().await,
            Self::Attachments => SqlAttachmentRepository::new(pool.clone()).count().await,
            Self::Reactions => SqlReactionRepository::new(pool.clone()).count().await,
        }
    }

    /// Copy one offset batch: read detached rows from the source, merge
    /// them into the target by primary key. Returns the batch size.
    async fn copy_batch(
        &self,
        source: &AnyPool,
        target: &AnyPool,
        offset: i64,
        limit: i64,
    ) -> Result<usize, AppError> {
        match self {
            Self::Guilds => {
                let rows = SqlGuildRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlGuildRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
            Self::Users => {
                let rows = SqlUserRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlUserRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
            Self::Channels => {
                let rows =
                    SqlChannelRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlChannelRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
            Self::Messages => {
                let rows =
                    SqlMessageRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlMessageRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
            Self::Attachments => {
                let rows =
                    SqlAttachmentRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlAttachmentRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
            Self::Reactions => {
                let rows =
                    SqlReactionRepository::new(source.clone()).list_page(offset, limit).await?;
                SqlReactionRepository::new(target.clone()).bulk_upsert(&rows).await?;
                Ok(rows.len())
            }
        }
    }
}

/// Snapshot record of one transfer job; doubles as the progress record.
#[derive(Debug, Clone, Serialize)]
pub struct TransferJob {
    pub id: String,
    pub status: JobStatus,
    pub current_table: Option<&'static str>,
    pub tables_done: u64,
    pub tables_total: u64,
    pub rows_transferred: u64,
    pub total_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct TransferJobState {
    current: Option<TransferJob>,
    cancel: Option<CancelSignal>,
}

struct TransferManagerInner {
    registry: Arc<DataSourceRegistry>,
    settings: Arc<Settings>,
    state: Mutex<TransferJobState>,
}

/// Manager enforcing at-most-one running transfer.
pub struct TransferManager {
    inner: Arc<TransferManagerInner>,
}

impl TransferManager {
    pub fn new(registry: Arc<DataSourceRegistry>, settings: Arc<Settings>) -> Self {
        Self {
            inner: Arc::new(TransferManagerInner {
                registry,
                settings,
                state: Mutex::new(TransferJobState::default()),
            }),
        }
    }

    /// Start a transfer job. Both endpoints must be registered and
    /// connected; fails with a conflict while a transfer is busy.
    pub fn start(&self) -> Result<TransferJob, AppError> {
        if !self.inner.registry.is_available(SOURCE_NAME)
            || !self.inner.registry.is_available(TARGET_NAME)
        {
            return Err(AppError::BadRequest(format!(
                "transfer requires both '{}' and '{}' data sources",
                SOURCE_NAME, TARGET_NAME
            )));
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
                return Err(AppError::Conflict("a transfer job is already running".into()));
            }
            let job = TransferJob {
                id: Uuid::new_v4().to_string(),
                status: JobStatus::Pending,
                current_table: None,
                tables_done: 0,
                tables_total: CoreTable::ALL.len() as u64,
                rows_transferred: 0,
                total_rows: 0,
                error: None,
                started_at: None,
                finished_at: None,
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
    pub fn current_job(&self) -> Option<TransferJob> {
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

impl TransferManagerInner {
    async fn run_job(self: Arc<Self>, cancel: CancelSignal) {
        self.update_job(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        });
        tracing::info!(source = SOURCE_NAME, target = TARGET_NAME, "Transfer job started");

        let outcome = self.execute(&cancel).await;
        let cancelled = cancel.is_cancelled();

        self.update_job(|job| {
            job.finished_at = Some(Utc::now());
            match outcome {
                Ok(()) => {
                    job.status = if cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Completed
                    };
                }
                Err(e) => {
                    job.error = Some(e.to_string());
                    job.status = if cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Failed
                    };
                }
            }
            tracing::info!(status = %job.status, rows = job.rows_transferred, "Transfer job finished");
        });
    }

    async fn execute(&self, cancel: &CancelSignal) -> Result<(), AppError> {
        let source = self.registry.get(SOURCE_NAME)?;
        let target = self.registry.get(TARGET_NAME)?;

        let copied = self.copy_all(&source, &target, cancel).await;

        // Sequence repair runs even after failure or cancellation so the
        // target stays coherent for direct inserts.
        if self.registry.dialect(TARGET_NAME)? == Dialect::Postgres {
            reset_sequences(&target).await;
        }

        copied
    }

    async fn copy_all(
        &self,
        source: &AnyPool,
        target: &AnyPool,
        cancel: &CancelSignal,
    ) -> Result<(), AppError> {
        // Phase 1: counting.
        let mut total_rows = 0u64;
        for table in CoreTable::ALL {
            total_rows += table.count(source).await?.max(0) as u64;
        }
        self.update_job(|job| job.total_rows = total_rows);

        // Phase 2: batched copy in foreign-key order.
        let batch_size = self.settings.transfer.batch_size.max(1) as i64;
        for table in CoreTable::ALL {
            self.update_job(|job| job.current_table = Some(table.name()));
            let mut offset = 0i64;
            loop {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let copied = table.copy_batch(source, target, offset, batch_size).await?;
                if copied == 0 {
                    break;
                }
                offset += copied as i64;
                self.update_job(|job| job.rows_transferred += copied as u64);
                if (copied as i64) < batch_size {
                    break;
                }
            }
            self.update_job(|job| job.tables_done += 1);
            tracing::debug!(table = table.name(), "Table transferred");
        }
        Ok(())
    }

    fn update_job(&self, f: impl FnOnce(&mut TransferJob)) {
        let mut state = self.state.lock();
        if let Some(job) = state.current.as_mut() {
            f(job);
        }
    }
}

/// Phase 3: advance any database-managed sequence past the maximum
/// existing primary key, so direct inserts on the target do not collide.
/// Tables keyed purely by externally assigned snowflakes have no serial
/// sequence; their statement is a harmless no-op.
async fn reset_sequences(target: &AnyPool) {
    for (table, pk) in schema::CORE_TABLES {
        let statement = format!(
            "SELECT setval(pg_get_serial_sequence('{table}', '{pk}'), \
             (SELECT COALESCE(MAX({pk}), 1) FROM {table}), true)",
            table = table,
            pk = pk
        );
        if let Err(e) = sqlx::query(&statement).execute(target).await {
            tracing::warn!(table, error = %e, "Sequence reset skipped");
        }
    }
}
