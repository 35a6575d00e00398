use chrono::{DateTime, FixedOffset, Utc};
use feed_rs::model::{Entry, Feed as ParsedFeed};
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::db::{ChannelData, NewRssItem};

/// Accepts only absolute URLs that name a host, so a target like
/// `example.com/feed.xml` is rejected before anything is fetched.
pub fn parse_target(target: &str) -> Option<Url> {
    Url::parse(target.trim()).ok().filter(|url| url.has_host())
}

pub async fn fetch(client: &Client, url: &Url) -> anyhow::Result<ParsedFeed> {
    debug!("Fetching RSS document {}", url);
    let bytes = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    Ok(parser::parse(&bytes[..])?)
}

pub fn channel_data(feed: &ParsedFeed, offset: &FixedOffset) -> ChannelData {
    ChannelData {
        title: feed
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default(),
        subtitle: feed.description.as_ref().map(|t| t.content.clone()),
        link: feed.links.first().map(|l| l.href.clone()),
        language: feed.language.clone(),
        pub_date: feed.published.map(|d| d.with_timezone(offset)),
        last_build_date: feed.updated.map(|d| d.with_timezone(offset)),
        generator: feed.generator.as_ref().map(|g| g.content.clone()),
        copyright: feed.rights.as_ref().map(|t| t.content.clone()),
    }
}

/// Builds a storable item from a parsed entry. Entries without a date get
/// `fallback_date`.
pub fn to_new_item(
    entry: &Entry,
    language: &str,
    offset: &FixedOffset,
    fallback_date: DateTime<Utc>,
) -> NewRssItem {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let description = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    NewRssItem {
        ogid: entry.id.clone(),
        ogid_is_link: !link.is_empty() && entry.id == link,
        pub_date: entry
            .published
            .or(entry.updated)
            .unwrap_or(fallback_date)
            .with_timezone(offset),
        language: language.to_string(),
        title: entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string()),
        description,
        link,
    }
}
