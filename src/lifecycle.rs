//! Maintenance operations on stored feeds, addressed by feed uuid.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use tracing::info;

use crate::db::{Database, Feed, FeedKind, ItemCounts};
use crate::error::FeedError;

pub async fn find_feed(db: &Database, uuid: &str) -> Result<Feed, FeedError> {
    db.get_feed_by_uuid(uuid)
        .await?
        .ok_or_else(|| FeedError::NotFound(uuid.to_string()))
}

/// Midnight at the start of `date` in `offset`.
pub fn start_of_day(date: NaiveDate, offset: &FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, *offset)
}

/// Removes the feed's items dated before the start of `date`.
pub async fn clean_up(
    db: &Database,
    uuid: &str,
    date: NaiveDate,
    offset: &FixedOffset,
    scope: Option<FeedKind>,
) -> Result<(Feed, ItemCounts), FeedError> {
    let feed = find_feed(db, uuid).await?;
    let counts = db
        .clean_up(feed.id, &start_of_day(date, offset), scope)
        .await?;
    info!(
        "Cleaned up feed '{}' before {}: {} tweets, {} RSS items removed",
        feed.name, date, counts.tweets, counts.rss_items
    );
    Ok((feed, counts))
}

pub async fn flush(
    db: &Database,
    uuid: &str,
    scope: Option<FeedKind>,
) -> Result<(Feed, ItemCounts), FeedError> {
    let feed = find_feed(db, uuid).await?;
    let counts = db.flush(feed.id, scope).await?;
    info!(
        "Flushed feed '{}': {} tweets, {} RSS items removed",
        feed.name, counts.tweets, counts.rss_items
    );
    Ok((feed, counts))
}

pub async fn set_active(db: &Database, uuid: &str, active: bool) -> Result<Feed, FeedError> {
    let feed = find_feed(db, uuid).await?;
    if !db.set_active(feed.id, active).await? {
        return Err(FeedError::NotFound(uuid.to_string()));
    }
    info!("Set feed '{}' is_active to {}", feed.name, active);
    Ok(Feed {
        is_active: active,
        ..feed
    })
}
