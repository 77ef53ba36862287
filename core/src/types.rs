//! Domain DTOs for the chirp backend.
//!
//! # Design
//! These mirror the backend's JSON but are defined independently of the
//! mock-server crate; the integration test catches schema drift. Fields the
//! backend omits in some responses (the tweet list embedded in an account,
//! the author reference inside a tweet) are `Option` or `#[serde(default)]`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// RFC 3339, or an ISO timestamp without offset read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| {
            parse_timestamp(&raw)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
        })
        .transpose()
}

/// Like counts come back as `null` until the first like.
fn nullable_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// A registered account as returned by the account endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub handle: String,
    pub email: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tweets: Vec<Tweet>,
}

/// Owning account reference embedded in a tweet. Some endpoints only send
/// the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRef {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hashtag {
    pub id: i64,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    pub media_type: String,
    #[serde(default)]
    pub tweet_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tweet {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default, deserialize_with = "nullable_count")]
    pub likes: u64,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Tweet {
    /// Id of the owning account, from whichever field the backend filled in.
    pub fn author_id(&self) -> Option<i64> {
        self.account.as_ref().map(|a| a.id).or(self.account_id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.hashtags.iter().map(|h| h.tag.as_str())
    }
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub handle: String,
}

/// Login payload. Sent form-encoded, never as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Body of the post and edit calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TweetInput {
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
}

/// Login response. The caller decides where to keep the token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Like response: the tweet id and its like count after the like landed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikedTweet {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable_count")]
    pub likes: u64,
}
