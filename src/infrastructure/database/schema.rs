//! Archive Schema
//!
//! Idempotent DDL for the six core tables, written in the SQL subset both
//! dialects accept: BIGINT/INTEGER/TEXT columns, RFC 3339 TEXT timestamps,
//! INTEGER 0/1 booleans, `CREATE TABLE IF NOT EXISTS`.
//!
//! Cascading deletes are declared for completeness; the archiver itself has
//! no delete path.

use sqlx::AnyPool;

/// The six core tables in foreign-key order, with their primary key column.
/// The transfer manager copies tables in exactly this order.
pub const CORE_TABLES: [(&str, &str); 6] = [
    ("guilds", "id"),
    ("users", "id"),
    ("channels", "id"),
    ("messages", "id"),
    ("attachments", "id"),
    ("reactions", "message_id"),
];

const DDL: [&str; 10] = [
    r#"
    CREATE TABLE IF NOT EXISTS guilds (
        id               BIGINT PRIMARY KEY,
        name             TEXT NOT NULL,
        owner_id         BIGINT NOT NULL,
        member_count     BIGINT NOT NULL DEFAULT 0,
        first_scraped_at TEXT,
        last_scraped_at  TEXT,
        scrape_count     BIGINT NOT NULL DEFAULT 0,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGINT PRIMARY KEY,
        username      TEXT NOT NULL,
        discriminator TEXT NOT NULL DEFAULT '0',
        display_name  TEXT,
        avatar_url    TEXT,
        bot           INTEGER NOT NULL DEFAULT 0,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS channels (
        id              BIGINT PRIMARY KEY,
        guild_id        BIGINT NOT NULL REFERENCES guilds(id) ON DELETE CASCADE,
        name            TEXT NOT NULL,
        kind            TEXT NOT NULL DEFAULT 'text',
        topic           TEXT,
        position        BIGINT NOT NULL DEFAULT 0,
        parent_id       BIGINT,
        message_count   BIGINT NOT NULL DEFAULT 0,
        last_scraped_at TEXT,
        last_message_id BIGINT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id               BIGINT PRIMARY KEY,
        channel_id       BIGINT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
        author_id        BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content          TEXT NOT NULL DEFAULT '',
        clean_content    TEXT NOT NULL DEFAULT '',
        sent_at          TEXT NOT NULL,
        edited_at        TEXT,
        pinned           INTEGER NOT NULL DEFAULT 0,
        tts              INTEGER NOT NULL DEFAULT 0,
        mention_everyone INTEGER NOT NULL DEFAULT 0,
        embeds_json      TEXT NOT NULL DEFAULT '[]',
        reference_id     BIGINT,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id             BIGINT PRIMARY KEY,
        message_id     BIGINT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
        filename       TEXT NOT NULL,
        content_type   TEXT,
        size           BIGINT NOT NULL DEFAULT 0,
        remote_url     TEXT NOT NULL,
        proxy_url      TEXT,
        width          BIGINT,
        height         BIGINT,
        local_path     TEXT,
        download_state TEXT NOT NULL DEFAULT 'pending',
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reactions (
        message_id     BIGINT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
        emoji_id       BIGINT NOT NULL DEFAULT 0,
        emoji_name     TEXT NOT NULL,
        emoji_animated INTEGER NOT NULL DEFAULT 0,
        count          BIGINT NOT NULL CHECK (count >= 1),
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL,
        PRIMARY KEY (message_id, emoji_id, emoji_name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_channels_guild_id ON channels (guild_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_channel_id ON messages (channel_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_author_id ON messages (author_id)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_message_id ON attachments (message_id)",
];

/// Create the archive schema if it does not exist yet.
///
/// Safe to run on every startup and against stores that already hold data.
pub async fn ensure_schema(pool: &AnyPool) -> Result<(), sqlx::Error> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
