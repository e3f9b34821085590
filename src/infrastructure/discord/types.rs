//! Discord wire types.
//!
//! Deserialization targets for the REST payloads the archiver consumes.
//! Snowflakes arrive as JSON strings and are decoded to `i64` here; embeds
//! stay opaque `serde_json::Value`s and are re-encoded canonically by the
//! scraper.

use serde::Deserialize;

use crate::domain::ChannelKind;
use crate::shared::snowflake;

fn de_snowflake<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    snowflake::serde_string::deserialize(deserializer)
}

fn de_snowflake_opt<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    snowflake::serde_string_opt::deserialize(deserializer)
}

/// A guild as returned by `GET /guilds/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordGuild {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub member_count: Option<i64>,
    #[serde(default)]
    pub approximate_member_count: Option<i64>,
}

impl DiscordGuild {
    /// Best available member count; the plain field is only present on
    /// gateway payloads, REST reports the approximate one.
    pub fn effective_member_count(&self) -> i64 {
        self.member_count
            .or(self.approximate_member_count)
            .unwrap_or(0)
    }
}

/// A channel or thread as returned by channel listings.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: i64,
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub guild_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub channel_type: u8,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub parent_id: Option<i64>,
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub last_message_id: Option<i64>,
}

impl DiscordChannel {
    /// Map the wire channel type code to the archive's channel kind.
    ///
    /// Codes from the Discord API: 0 text, 2 voice, 4 category, 5
    /// announcement, 10/11 public thread, 12 private thread, 13 stage,
    /// 15 forum. Unknown codes archive as text.
    pub fn kind(&self) -> ChannelKind {
        match self.channel_type {
            0 => ChannelKind::Text,
            2 => ChannelKind::Voice,
            4 => ChannelKind::Category,
            5 => ChannelKind::Announcement,
            10 | 11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            13 => ChannelKind::StageVoice,
            15 => ChannelKind::Forum,
            _ => ChannelKind::Text,
        }
    }

    /// Display name, empty for DM-style payloads that carry none.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_default()
    }
}

/// A user object embedded in messages and `GET /users/@me`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: Option<bool>,
}

impl DiscordUser {
    /// CDN URL of the user's avatar, when one is set.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash))
    }
}

/// An attachment object embedded in messages.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAttachment {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: i64,
    pub url: String,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

/// An emoji object inside a reaction.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordEmoji {
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: Option<bool>,
}

/// An aggregated reaction on a message.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordReaction {
    pub emoji: DiscordEmoji,
    #[serde(default)]
    pub count: i64,
}

/// The reply linkage of a message.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessageReference {
    #[serde(default, deserialize_with = "de_snowflake_opt")]
    pub message_id: Option<i64>,
}

/// A message as returned by `GET /channels/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: i64,
    #[serde(deserialize_with = "de_snowflake")]
    pub channel_id: i64,
    pub author: DiscordUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<DiscordAttachment>,
    #[serde(default)]
    pub reactions: Option<Vec<DiscordReaction>>,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
    #[serde(default)]
    pub message_reference: Option<DiscordMessageReference>,
}

impl DiscordMessage {
    /// Resolve `<@id>` / `<@!id>` mention markup to `@username` using the
    /// mention list shipped with the message. Markup for users outside the
    /// list (and channel/role mentions) is left as-is.
    pub fn clean_content(&self) -> String {
        let mut cleaned = self.content.clone();
        for user in &self.mentions {
            let display = format!("@{}", user.global_name.as_deref().unwrap_or(&user.username));
            cleaned = cleaned
                .replace(&format!("<@{}>", user.id), &display)
                .replace(&format!("<@!{}>", user.id), &display);
        }
        cleaned
    }
}

/// Wrapper shape of the thread listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadListing {
    #[serde(default)]
    pub threads: Vec<DiscordChannel>,
}
