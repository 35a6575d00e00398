use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::{Config, TwitterSettings};
use crate::db::{Database, Feed, FeedKind};
use crate::error::FeedError;
use crate::rss;
use crate::twitter::TwitterClient;

/// Where a feed's items come from, derived from the stored feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Twitter {
        screen_name: String,
        api_point: Option<String>,
    },
    Rss {
        target: String,
    },
}

impl From<&Feed> for FeedSource {
    fn from(feed: &Feed) -> Self {
        match feed.kind {
            FeedKind::Twitter => FeedSource::Twitter {
                screen_name: feed.target.trim_start_matches('@').to_string(),
                api_point: feed.api_point.clone().filter(|p| !p.trim().is_empty()),
            },
            FeedKind::Rss => FeedSource::Rss {
                target: feed.target.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub feed: String,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    pub inserted: usize,
}

pub struct Refresher {
    client: Client,
    db: Arc<Database>,
    twitter: TwitterSettings,
    offset: FixedOffset,
    refreshing: Arc<AtomicBool>,
}

/// Clears the `refreshing` flag when dropped, including when the refresh
/// future is cancelled.
struct RefreshGuard(Arc<AtomicBool>);

impl RefreshGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard(flag.clone()))
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Refresher {
    pub fn new(db: Arc<Database>, config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            db,
            twitter: config.twitter.clone(),
            offset: config.offset(),
            refreshing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Refreshes every active feed, one after another. A failing feed is
    /// logged and does not stop the others. Returns `None` when another
    /// refresh of all feeds is still running in this process.
    pub async fn refresh_all_active(&self) -> Result<Option<RefreshSummary>, FeedError> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            info!("Refresh already in progress, skipping");
            return Ok(None);
        };

        self.do_refresh_all().await.map(Some)
    }

    async fn do_refresh_all(&self) -> Result<RefreshSummary, FeedError> {
        let feeds = self.db.get_active_feeds().await?;
        info!("Refreshing {} active feeds", feeds.len());

        let mut summary = RefreshSummary::default();
        for feed in &feeds {
            match self.refresh(feed).await {
                Ok(report) => {
                    summary.refreshed += 1;
                    summary.inserted += report.inserted;
                }
                Err(e) => {
                    error!("{}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Feed refresh complete: {} refreshed, {} failed, {} new items",
            summary.refreshed, summary.failed, summary.inserted
        );
        Ok(summary)
    }

    pub async fn refresh_by_uuid(&self, uuid: &str) -> Result<RefreshReport, FeedError> {
        let feed = self
            .db
            .get_feed_by_uuid(uuid)
            .await?
            .ok_or_else(|| FeedError::NotFound(uuid.to_string()))?;
        self.refresh(&feed).await
    }

    /// Reconciles one feed, then stamps `last_refreshed` whether or not that
    /// succeeded, then hands the reconcile outcome back.
    pub async fn refresh(&self, feed: &Feed) -> Result<RefreshReport, FeedError> {
        info!("Refreshing {} feed '{}' ({})", feed.kind.display_name(), feed.name, feed.target);

        let outcome = self.reconcile(feed).await;

        let now = Utc::now().with_timezone(&self.offset);
        let last_error = outcome.as_ref().err().map(|e| e.to_string());
        let stamped = self
            .db
            .update_feed_refreshed(feed.id, &now, last_error.as_deref())
            .await;

        match (outcome, stamped) {
            (Ok(report), Ok(())) => {
                info!(
                    "Added {} items to feed '{}', {} already stored",
                    report.inserted, report.feed, report.skipped
                );
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), stamped) => {
                if let Err(stamp_err) = stamped {
                    error!(
                        "Failed to record refresh time of feed '{}': {}",
                        feed.name, stamp_err
                    );
                }
                warn!("Refresh of feed '{}' failed: {}", feed.name, e);
                Err(e)
            }
        }
    }

    async fn reconcile(&self, feed: &Feed) -> Result<RefreshReport, FeedError> {
        match FeedSource::from(feed) {
            FeedSource::Twitter {
                screen_name,
                api_point,
            } => {
                self.refresh_twitter(feed, &screen_name, api_point.as_deref())
                    .await
            }
            FeedSource::Rss { target } => self.refresh_rss(feed, &target).await,
        }
    }

    async fn refresh_twitter(
        &self,
        feed: &Feed,
        screen_name: &str,
        api_point: Option<&str>,
    ) -> Result<RefreshReport, FeedError> {
        let credentials = self.twitter.credentials()?;
        let endpoint = api_point.unwrap_or(&self.twitter.timeline_url);

        let statuses = TwitterClient::new(&self.client, credentials)
            .user_timeline(endpoint, screen_name)
            .await
            .map_err(|e| FeedError::failed(&feed.name, e))?;

        let mut known: HashSet<String> = self
            .db
            .tweet_ogids(feed.id)
            .await
            .map_err(|e| FeedError::failed(&feed.name, e))?
            .into_iter()
            .collect();

        let mut report = RefreshReport {
            feed: feed.name.clone(),
            inserted: 0,
            skipped: 0,
        };

        for status in &statuses {
            if !known.insert(status.ogid()) {
                report.skipped += 1;
                continue;
            }

            let tweet = status
                .to_new_tweet(&self.offset)
                .map_err(|e| FeedError::failed(&feed.name, e))?;

            let inserted = self
                .db
                .insert_tweet(feed.id, &tweet)
                .await
                .map_err(|e| FeedError::failed(&feed.name, e))?;
            if inserted {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        Ok(report)
    }

    async fn refresh_rss(&self, feed: &Feed, target: &str) -> Result<RefreshReport, FeedError> {
        let url = rss::parse_target(target).ok_or_else(|| FeedError::InvalidTarget {
            feed: feed.name.clone(),
            target: target.to_string(),
        })?;

        let parsed = rss::fetch(&self.client, &url)
            .await
            .map_err(|e| FeedError::failed(&feed.name, e))?;

        let channel = rss::channel_data(&parsed, &self.offset);
        self.db
            .upsert_channel_data(feed.id, &channel)
            .await
            .map_err(|e| FeedError::failed(&feed.name, e))?;

        let mut known: HashSet<String> = self
            .db
            .rss_item_ogids(feed.id)
            .await
            .map_err(|e| FeedError::failed(&feed.name, e))?
            .into_iter()
            .collect();

        let language = channel.language.unwrap_or_default();
        let fetched_at = Utc::now();
        let mut report = RefreshReport {
            feed: feed.name.clone(),
            inserted: 0,
            skipped: 0,
        };

        for entry in &parsed.entries {
            if !known.insert(entry.id.clone()) {
                report.skipped += 1;
                continue;
            }

            let item = rss::to_new_item(entry, &language, &self.offset, fetched_at);
            let inserted = self
                .db
                .insert_rss_item(feed.id, &item)
                .await
                .map_err(|e| FeedError::failed(&feed.name, e))?;
            if inserted {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        Ok(report)
    }
}
