use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::db::FeedKind;
use crate::error::FeedError;

pub const DEFAULT_TIMELINE_URL: &str = "https://api.twitter.com/1.1/statuses/user_timeline.json";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Offset from UTC, in minutes, that stored timestamps are converted to
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub twitter: TwitterSettings,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_database_url() -> String {
    "sqlite:xfeed.db?mode=rwc".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_user_agent() -> String {
    "xfeed/0.1 (Feed Aggregator)".to_string()
}

fn default_timeline_url() -> String {
    DEFAULT_TIMELINE_URL.to_string()
}

fn default_is_active() -> bool {
    true
}

/// The `[twitter]` table. Every field may be absent; only Twitter refreshes
/// need them, see [`TwitterSettings::credentials`].
#[derive(Debug, Deserialize, Clone)]
pub struct TwitterSettings {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token_key: Option<String>,
    pub access_token_secret: Option<String>,
    #[serde(default = "default_timeline_url")]
    pub timeline_url: String,
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            consumer_key: None,
            consumer_secret: None,
            access_token_key: None,
            access_token_secret: None,
            timeline_url: default_timeline_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token_key: String,
    pub access_token_secret: String,
}

impl TwitterSettings {
    pub fn credentials(&self) -> Result<TwitterCredentials, FeedError> {
        fn required(
            value: &Option<String>,
            name: &'static str,
        ) -> Result<String, FeedError> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(FeedError::MissingCredentials(name)),
            }
        }

        Ok(TwitterCredentials {
            consumer_key: required(&self.consumer_key, "consumer key")?,
            consumer_secret: required(&self.consumer_secret, "consumer secret")?,
            access_token_key: required(&self.access_token_key, "access token key")?,
            access_token_secret: required(&self.access_token_secret, "access token secret")?,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub kind: FeedKind,
    /// URL for RSS feeds, screen name for Twitter feeds
    pub target: String,
    pub uuid: Option<String>,
    pub api_point: Option<String>,
    pub website: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

impl FeedConfig {
    /// The configured uuid, or one derived from kind and target so that
    /// repeated syncs of the same feed land on the same row.
    pub fn uuid(&self) -> String {
        match &self.uuid {
            Some(uuid) => uuid.clone(),
            None => {
                let key = format!("{}:{}", self.kind.as_str(), self.target);
                Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
            }
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if offset_from_minutes(config.utc_offset_minutes).is_none() {
            anyhow::bail!(
                "utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            );
        }
        Ok(config)
    }

    pub fn offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes).unwrap_or_else(|| Utc.fix())
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}
