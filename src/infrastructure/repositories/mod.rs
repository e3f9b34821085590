//! Repository Implementations
//!
//! Implementations of the domain repository traits over `sqlx::AnyPool`,
//! so the same code serves the file-backed SQLite store and the
//! server-backed PostgreSQL store.
//!
//! ## Portability conventions
//!
//! The `Any` driver exposes only basic column kinds, so the row types here
//! decode `i64`/`String` and convert at the mapper boundary:
//!
//! - timestamps travel as RFC 3339 TEXT (`format_timestamp`/`parse_timestamp`)
//! - booleans travel as INTEGER 0/1
//! - placeholders are `$1..$n` and upserts are `INSERT .. ON CONFLICT`,
//!   which both dialects execute unchanged
//!
//! Each repository also exposes inherent `*_with(executor, ..)` functions
//! that run against any executor, so the scraper can span several
//! repositories inside one transaction.

pub mod attachment_repository;
pub mod channel_repository;
pub mod guild_repository;
pub mod message_repository;
pub mod reaction_repository;
pub mod user_repository;

pub use attachment_repository::SqlAttachmentRepository;
pub use channel_repository::SqlChannelRepository;
pub use guild_repository::SqlGuildRepository;
pub use message_repository::SqlMessageRepository;
pub use reaction_repository::SqlReactionRepository;
pub use user_repository::SqlUserRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Encode a timestamp for storage. Fixed-width UTC RFC 3339 so that stored
/// values also sort correctly as text.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp. Values are always written by
/// `format_timestamp`; anything unparseable decodes to the epoch rather
/// than poisoning a whole row read.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Decode an optional stored timestamp.
pub(crate) fn parse_timestamp_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.map(parse_timestamp)
}
