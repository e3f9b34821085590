//! Discord-style Snowflake ID interpretation.
//!
//! Snowflake IDs are 64-bit integers with embedded timestamp information.
//! All identifiers in the archive are assigned by Discord; this module only
//! parses and formats them, it never generates new ones.
//!
//! ## Structure
//!
//! ```text
//! 64                         22          17          12          0
//! +---------------------------+-----------+-----------+-----------+
//! |         timestamp         |  worker   |  process  |  sequence |
//! |          (42 bits)        |  (5 bits) |  (5 bits) |  (12 bits)|
//! +---------------------------+-----------+-----------+-----------+
//! ```

use chrono::{DateTime, TimeZone, Utc};

/// Discord epoch: 2015-01-01T00:00:00Z in milliseconds
pub const DISCORD_EPOCH: u64 = 1420070400000;

/// Extract the millisecond timestamp embedded in a snowflake.
pub fn timestamp_millis(id: i64) -> u64 {
    ((id as u64) >> 22) + DISCORD_EPOCH
}

/// Get the creation time encoded in a snowflake.
pub fn created_at(id: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp_millis(id) as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Parse a snowflake from its decimal string form.
///
/// Discord serializes snowflakes as JSON strings to avoid precision loss in
/// JavaScript clients; the archive does the same on its own wire.
pub fn parse(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().filter(|id| *id >= 0)
}

/// Serde adapter for fields that are snowflakes on the wire (strings) and
/// `i64` in memory.
pub mod serde_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid snowflake: {}", s)))
    }
}

/// Serde adapter for optional snowflake fields.
pub mod serde_string_opt {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_some(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => super::parse(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid snowflake: {}", s))),
            None => Ok(None),
        }
    }
}

/// Serde adapter for optional lists of snowflakes.
pub mod serde_string_vec_opt {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ids: &Option<Vec<i64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ids {
            Some(ids) => {
                let strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                serializer.serialize_some(&strings)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<i64>>, D::Error> {
        let strings = Option::<Vec<String>>::deserialize(deserializer)?;
        match strings {
            Some(strings) => strings
                .iter()
                .map(|s| {
                    super::parse(s)
                        .ok_or_else(|| de::Error::custom(format!("invalid snowflake: {}", s)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            None => Ok(None),
        }
    }
}
