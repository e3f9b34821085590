//! Cross-store transfer tests: counting, FK-ordered batched copy,
//! idempotent re-runs and cancellation.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use guild_archiver::application::jobs::{JobStatus, TransferManager};
use guild_archiver::domain::{
    Attachment, AttachmentRepository, Channel, ChannelRepository, Guild, GuildRepository, Message,
    MessageRepository, Reaction, ReactionRepository, User, UserRepository,
};
use guild_archiver::infrastructure::database::DataSourceRegistry;
use guild_archiver::infrastructure::repositories::{
    SqlAttachmentRepository, SqlChannelRepository, SqlGuildRepository, SqlMessageRepository,
    SqlReactionRepository, SqlUserRepository,
};
use guild_archiver::shared::error::AppError;

use crate::common::*;

/// Seed the source store with a small FK-consistent archive. Returns the
/// total row count across the six tables.
async fn seed_source(registry: &DataSourceRegistry, messages: i64) -> u64 {
    let pool = registry.get("sqlite").unwrap();
    SqlGuildRepository::new(pool.clone())
        .upsert(&Guild { id: 1, name: "g".into(), owner_id: 1, ..Default::default() })
        .await
        .unwrap();
    SqlUserRepository::new(pool.clone())
        .upsert(&User { id: 7, username: "u".into(), ..Default::default() })
        .await
        .unwrap();
    SqlChannelRepository::new(pool.clone())
        .upsert(&Channel { id: 2, guild_id: 1, name: "c".into(), ..Default::default() })
        .await
        .unwrap();

    let message_repo = SqlMessageRepository::new(pool.clone());
    for id in 0..messages {
        message_repo
            .upsert(&Message {
                id: 100 + id,
                channel_id: 2,
                author_id: 7,
                content: format!("m{}", id),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    SqlAttachmentRepository::new(pool.clone())
        .upsert(&Attachment {
            id: 900,
            message_id: 100,
            filename: "cat.png".into(),
            remote_url: "https://cdn/cat.png".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    SqlReactionRepository::new(pool)
        .upsert(&Reaction {
            message_id: 100,
            emoji_name: "👍".into(),
            count: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    // guild + user + channel + messages + attachment + reaction
    3 + messages as u64 + 2
}

async fn wait_for_terminal(manager: &TransferManager) -> JobStatus {
    for _ in 0..500 {
        if let Some(job) = manager.current_job() {
            if job.status.is_terminal() {
                return job.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transfer job never reached a terminal state");
}

#[tokio::test]
async fn transfer_copies_all_tables_in_order() {
    let registry = dual_registry().await;
    let total = seed_source(&registry, 5).await;
    let manager = Arc::new(TransferManager::new(registry.clone(), Arc::new(test_settings())));

    manager.start().unwrap();
    let status = wait_for_terminal(&manager).await;
    assert_eq!(status, JobStatus::Completed);

    let job = manager.current_job().unwrap();
    assert_eq!(job.tables_total, 6);
    assert_eq!(job.tables_done, 6);
    assert_eq!(job.total_rows, total);
    assert_eq!(job.rows_transferred, total);
    assert!(job.finished_at.is_some());

    // Target primary keys are a superset of (here: equal to) the source's.
    let target = registry.get("postgres").unwrap();
    assert_eq!(SqlGuildRepository::new(target.clone()).count().await.unwrap(), 1);
    assert_eq!(SqlUserRepository::new(target.clone()).count().await.unwrap(), 1);
    assert_eq!(SqlChannelRepository::new(target.clone()).count().await.unwrap(), 1);
    assert_eq!(SqlMessageRepository::new(target.clone()).count().await.unwrap(), 5);
    assert_eq!(SqlAttachmentRepository::new(target.clone()).count().await.unwrap(), 1);
    assert_eq!(SqlReactionRepository::new(target.clone()).count().await.unwrap(), 1);

    let copied = SqlMessageRepository::new(target).get(100).await.unwrap().unwrap();
    assert_eq!(copied.content, "m0");
}

#[tokio::test]
async fn transfer_is_idempotent_over_existing_rows() {
    let registry = dual_registry().await;
    let total = seed_source(&registry, 3).await;
    let manager = Arc::new(TransferManager::new(registry.clone(), Arc::new(test_settings())));

    manager.start().unwrap();
    assert_eq!(wait_for_terminal(&manager).await, JobStatus::Completed);
    manager.start().unwrap();
    assert_eq!(wait_for_terminal(&manager).await, JobStatus::Completed);

    let job = manager.current_job().unwrap();
    assert_eq!(job.rows_transferred, total);
    let target = registry.get("postgres").unwrap();
    assert_eq!(SqlMessageRepository::new(target).count().await.unwrap(), 3);
}

#[tokio::test]
async fn transfer_requires_both_sources() {
    let registry = test_registry().await;
    let manager = Arc::new(TransferManager::new(registry, Arc::new(test_settings())));
    let result = manager.start();
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(manager.current_job().is_none());
}

#[tokio::test]
async fn cancelled_transfer_stops_and_keeps_partial_state() {
    let registry = dual_registry().await;
    seed_source(&registry, 10).await;
    let manager = Arc::new(TransferManager::new(registry.clone(), Arc::new(test_settings())));

    manager.start().unwrap();
    // Cancel before the task first runs; it stops at its first batch
    // check point.
    assert!(manager.cancel());

    let status = wait_for_terminal(&manager).await;
    assert_eq!(status, JobStatus::Cancelled);
    assert!(!manager.is_busy());

    // A subsequent transfer resumes cleanly thanks to upsert semantics.
    manager.start().unwrap();
    assert_eq!(wait_for_terminal(&manager).await, JobStatus::Completed);
    let target = registry.get("postgres").unwrap();
    assert_eq!(SqlMessageRepository::new(target).count().await.unwrap(), 10);
}
