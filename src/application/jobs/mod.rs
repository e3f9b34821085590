//! Background Job Managers
//!
//! Three managers share one shape: an optional current job record, a
//! spawned background task, a set-once cancellation signal, and
//! at-most-one-running semantics per job kind. Status reads snapshot the
//! record under a short lock; the record is a point-in-time view, not a
//! synchronized object.

pub mod download_manager;
pub mod scrape_manager;
pub mod transfer_manager;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use download_manager::{DownloadJob, DownloadManager, DownloadProgress};
pub use scrape_manager::{ScrapeJob, ScrapeManager, ScrapeProgress};
pub use transfer_manager::{TransferJob, TransferManager};

/// Lifecycle of a background job.
///
/// Transitions are monotonic per job:
/// `pending -> running -> (completed | failed | cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// A busy job blocks new starts of the same kind.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        !self.is_busy()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Level-triggered, set-once cancellation signal.
///
/// Cloning shares the underlying flag. Tasks poll it at their check
/// points; cancellation never undoes prior writes.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
