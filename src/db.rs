use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Deserialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::config::FeedConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FeedKind {
    Twitter,
    Rss,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Twitter => "twitter",
            FeedKind::Rss => "rss",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FeedKind::Twitter => "Twitter",
            FeedKind::Rss => "RSS",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub kind: FeedKind,
    pub uuid: String,
    pub target: String,
    pub api_point: Option<String>,
    pub website: Option<String>,
    pub last_refreshed: Option<String>,
    pub last_error: Option<String>,
    pub is_active: bool,
    pub created_on: String,
    pub modified_on: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Tweet {
    pub id: i64,
    pub feed_id: i64,
    pub ogid: String,
    pub create_date: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub language: String,
    pub profile_image_url: String,
    pub source: String,
    pub text: String,
    pub to_user_id: Option<String>,
    pub to_user_screen_name: Option<String>,
    pub to_status_id: Option<String>,
    pub hide: bool,
    pub created_on: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct RssItem {
    pub id: i64,
    pub feed_id: i64,
    pub ogid: String,
    pub ogid_is_link: bool,
    pub pub_date: String,
    pub language: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub hide: bool,
    pub created_on: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct RssChannelData {
    pub feed_id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub pub_date: Option<String>,
    pub last_build_date: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub modified_on: String,
}

#[derive(Debug, Clone)]
pub struct NewTweet {
    pub ogid: String,
    pub create_date: DateTime<FixedOffset>,
    pub from_user_id: String,
    pub from_user_name: String,
    pub language: String,
    pub profile_image_url: String,
    pub source: String,
    pub text: String,
    pub to_user_id: Option<String>,
    pub to_user_screen_name: Option<String>,
    pub to_status_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRssItem {
    pub ogid: String,
    pub ogid_is_link: bool,
    pub pub_date: DateTime<FixedOffset>,
    pub language: String,
    pub title: String,
    pub description: String,
    pub link: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelData {
    pub title: String,
    pub subtitle: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub last_build_date: Option<DateTime<FixedOffset>>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
}

/// Per item type row counts, returned by counting and deleting queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub tweets: u64,
    pub rss_items: u64,
}

/// Stored form of every timestamp column. SQLite's date functions accept the
/// offset suffix, so comparisons go through `julianday()`.
pub fn timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn includes(scope: Option<FeedKind>, kind: FeedKind) -> bool {
    scope.map_or(true, |s| s == kind)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('twitter', 'rss')),
                uuid TEXT NOT NULL UNIQUE,
                target TEXT NOT NULL,
                api_point TEXT,
                website TEXT,
                last_refreshed TEXT,
                last_error TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_on TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                modified_on TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tweets (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                ogid TEXT NOT NULL,
                create_date TEXT NOT NULL,
                from_user_id TEXT NOT NULL,
                from_user_name TEXT NOT NULL,
                language TEXT NOT NULL,
                profile_image_url TEXT NOT NULL,
                source TEXT NOT NULL,
                text TEXT NOT NULL,
                to_user_id TEXT,
                to_user_screen_name TEXT,
                to_status_id TEXT,
                hide INTEGER NOT NULL DEFAULT 0,
                created_on TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE(feed_id, ogid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rss_items (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                ogid TEXT NOT NULL,
                ogid_is_link INTEGER NOT NULL DEFAULT 0,
                pub_date TEXT NOT NULL,
                language TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                link TEXT NOT NULL,
                hide INTEGER NOT NULL DEFAULT 0,
                created_on TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE(feed_id, ogid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rss_channel_data (
                feed_id INTEGER PRIMARY KEY REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                subtitle TEXT,
                link TEXT,
                language TEXT,
                pub_date TEXT,
                last_build_date TEXT,
                generator TEXT,
                copyright TEXT,
                modified_on TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tweets_feed_create_date
            ON tweets(feed_id, create_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_rss_items_feed_pub_date
            ON rss_items(feed_id, pub_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or updates configured feeds by uuid. `is_active` from the
    /// config only seeds new rows; afterwards it belongs to `set_active`.
    pub async fn sync_feeds(&self, configs: &[FeedConfig]) -> anyhow::Result<()> {
        for config in configs {
            sqlx::query(
                r#"
                INSERT INTO feeds (name, kind, uuid, target, api_point, website, is_active)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(uuid) DO UPDATE SET
                    name = excluded.name,
                    kind = excluded.kind,
                    target = excluded.target,
                    api_point = excluded.api_point,
                    website = excluded.website,
                    modified_on = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
                "#,
            )
            .bind(&config.name)
            .bind(config.kind)
            .bind(config.uuid())
            .bind(&config.target)
            .bind(&config.api_point)
            .bind(&config.website)
            .bind(config.is_active)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get_all_feeds(&self) -> sqlx::Result<Vec<Feed>> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds ORDER BY kind, name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_active_feeds(&self) -> sqlx::Result<Vec<Feed>> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE is_active = 1 ORDER BY kind, name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_feed(&self, feed_id: i64) -> sqlx::Result<Option<Feed>> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_feed_by_uuid(&self, uuid: &str) -> sqlx::Result<Option<Feed>> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_feed_refreshed(
        &self,
        feed_id: i64,
        at: &DateTime<FixedOffset>,
        error: Option<&str>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_refreshed = ?, last_error = ?,
                modified_on = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            WHERE id = ?
            "#,
        )
        .bind(timestamp(at))
        .bind(error)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns false when no feed has the given id.
    pub async fn set_active(&self, feed_id: i64, active: bool) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET is_active = ?, modified_on = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            WHERE id = ?
            "#,
        )
        .bind(active)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn tweet_ogids(&self, feed_id: i64) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar("SELECT ogid FROM tweets WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn rss_item_ogids(&self, feed_id: i64) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar("SELECT ogid FROM rss_items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Returns false when the feed already holds a tweet with this ogid.
    pub async fn insert_tweet(&self, feed_id: i64, tweet: &NewTweet) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO tweets (
                feed_id, ogid, create_date, from_user_id, from_user_name, language,
                profile_image_url, source, text, to_user_id, to_user_screen_name, to_status_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, ogid) DO NOTHING
            "#,
        )
        .bind(feed_id)
        .bind(&tweet.ogid)
        .bind(timestamp(&tweet.create_date))
        .bind(&tweet.from_user_id)
        .bind(&tweet.from_user_name)
        .bind(&tweet.language)
        .bind(&tweet.profile_image_url)
        .bind(&tweet.source)
        .bind(&tweet.text)
        .bind(&tweet.to_user_id)
        .bind(&tweet.to_user_screen_name)
        .bind(&tweet.to_status_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns false when the feed already holds an item with this ogid.
    pub async fn insert_rss_item(&self, feed_id: i64, item: &NewRssItem) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO rss_items (
                feed_id, ogid, ogid_is_link, pub_date, language, title, description, link
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, ogid) DO NOTHING
            "#,
        )
        .bind(feed_id)
        .bind(&item.ogid)
        .bind(item.ogid_is_link)
        .bind(timestamp(&item.pub_date))
        .bind(&item.language)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.link)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn upsert_channel_data(&self, feed_id: i64, data: &ChannelData) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rss_channel_data (
                feed_id, title, subtitle, link, language, pub_date, last_build_date,
                generator, copyright
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id) DO UPDATE SET
                title = excluded.title,
                subtitle = excluded.subtitle,
                link = excluded.link,
                language = excluded.language,
                pub_date = excluded.pub_date,
                last_build_date = excluded.last_build_date,
                generator = excluded.generator,
                copyright = excluded.copyright,
                modified_on = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            "#,
        )
        .bind(feed_id)
        .bind(&data.title)
        .bind(&data.subtitle)
        .bind(&data.link)
        .bind(&data.language)
        .bind(data.pub_date.as_ref().map(timestamp))
        .bind(data.last_build_date.as_ref().map(timestamp))
        .bind(&data.generator)
        .bind(&data.copyright)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_channel_data(&self, feed_id: i64) -> sqlx::Result<Option<RssChannelData>> {
        sqlx::query_as::<_, RssChannelData>("SELECT * FROM rss_channel_data WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_tweets_for_feed(&self, feed_id: i64) -> sqlx::Result<Vec<Tweet>> {
        sqlx::query_as::<_, Tweet>(
            r#"
            SELECT * FROM tweets
            WHERE feed_id = ?
            ORDER BY julianday(create_date), id
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_rss_items_for_feed(&self, feed_id: i64) -> sqlx::Result<Vec<RssItem>> {
        sqlx::query_as::<_, RssItem>(
            r#"
            SELECT * FROM rss_items
            WHERE feed_id = ?
            ORDER BY julianday(pub_date), id
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_item_counts(&self, feed_id: i64) -> sqlx::Result<ItemCounts> {
        let tweets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        let rss_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rss_items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(ItemCounts {
            tweets: tweets as u64,
            rss_items: rss_items as u64,
        })
    }

    pub async fn set_tweet_hidden(&self, tweet_id: i64, hide: bool) -> sqlx::Result<bool> {
        let result = sqlx::query("UPDATE tweets SET hide = ? WHERE id = ?")
            .bind(hide)
            .bind(tweet_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_rss_item_hidden(&self, item_id: i64, hide: bool) -> sqlx::Result<bool> {
        let result = sqlx::query("UPDATE rss_items SET hide = ? WHERE id = ?")
            .bind(hide)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Deletes items published strictly before `before`, optionally only of
    /// one item type.
    pub async fn clean_up(
        &self,
        feed_id: i64,
        before: &DateTime<FixedOffset>,
        scope: Option<FeedKind>,
    ) -> sqlx::Result<ItemCounts> {
        let before = timestamp(before);
        let mut counts = ItemCounts::default();

        if includes(scope, FeedKind::Twitter) {
            counts.tweets = sqlx::query(
                "DELETE FROM tweets WHERE feed_id = ? AND julianday(create_date) < julianday(?)",
            )
            .bind(feed_id)
            .bind(&before)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }

        if includes(scope, FeedKind::Rss) {
            counts.rss_items = sqlx::query(
                "DELETE FROM rss_items WHERE feed_id = ? AND julianday(pub_date) < julianday(?)",
            )
            .bind(feed_id)
            .bind(&before)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }

        Ok(counts)
    }

    pub async fn flush(&self, feed_id: i64, scope: Option<FeedKind>) -> sqlx::Result<ItemCounts> {
        let mut counts = ItemCounts::default();

        if includes(scope, FeedKind::Twitter) {
            counts.tweets = sqlx::query("DELETE FROM tweets WHERE feed_id = ?")
                .bind(feed_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }

        if includes(scope, FeedKind::Rss) {
            counts.rss_items = sqlx::query("DELETE FROM rss_items WHERE feed_id = ?")
                .bind(feed_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn create_feed_config(name: &str, kind: FeedKind, target: &str) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            uuid: Some(format!("uuid-{}", name.to_lowercase().replace(' ', "-"))),
            api_point: None,
            website: None,
            is_active: true,
        }
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
    }

    fn new_tweet(ogid: &str, create_date: DateTime<FixedOffset>) -> NewTweet {
        NewTweet {
            ogid: ogid.to_string(),
            create_date,
            from_user_id: "42".to_string(),
            from_user_name: "project".to_string(),
            language: "en".to_string(),
            profile_image_url: "https://img.example.com/42.png".to_string(),
            source: "web".to_string(),
            text: format!("tweet {}", ogid),
            to_user_id: None,
            to_user_screen_name: None,
            to_status_id: None,
        }
    }

    fn new_rss_item(ogid: &str, pub_date: DateTime<FixedOffset>) -> NewRssItem {
        NewRssItem {
            ogid: ogid.to_string(),
            ogid_is_link: false,
            pub_date,
            language: "en".to_string(),
            title: format!("Title {}", ogid),
            description: format!("<p>{}</p>", ogid),
            link: format!("https://news.example.com/{}", ogid),
        }
    }

    async fn setup_feed(db: &Database, kind: FeedKind) -> Feed {
        let config = create_feed_config("Test", kind, "https://test.example.com/rss");
        db.sync_feeds(&[config]).await.unwrap();
        db.get_feed_by_uuid("uuid-test").await.unwrap().unwrap()
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            let feeds = db.get_all_feeds().await.unwrap();
            assert!(feeds.is_empty());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            assert!(db.initialize().await.is_ok());
        }

        #[tokio::test]
        async fn test_kind_constrained() {
            let db = create_test_db().await;
            let result = sqlx::query(
                "INSERT INTO feeds (name, kind, uuid, target) VALUES ('x', 'mastodon', 'u', 't')",
            )
            .execute(&db.pool)
            .await;
            assert!(result.is_err());
        }
    }

    mod sync_feeds_tests {
        use super::*;

        #[tokio::test]
        async fn test_sync_multiple_feeds() {
            let db = create_test_db().await;
            let configs = vec![
                create_feed_config("News", FeedKind::Rss, "https://news.example.com/rss"),
                create_feed_config("Tweets", FeedKind::Twitter, "project"),
            ];

            db.sync_feeds(&configs).await.unwrap();

            let feeds = db.get_all_feeds().await.unwrap();
            assert_eq!(feeds.len(), 2);
            // Ordered by kind, then name
            assert_eq!(feeds[0].kind, FeedKind::Rss);
            assert_eq!(feeds[1].kind, FeedKind::Twitter);
            assert!(feeds.iter().all(|f| f.last_refreshed.is_none()));
        }

        #[tokio::test]
        async fn test_sync_updates_existing_feed_but_keeps_active_flag() {
            let db = create_test_db().await;
            let mut config = create_feed_config("News", FeedKind::Rss, "https://a.example.com/rss");
            db.sync_feeds(&[config.clone()]).await.unwrap();

            let feed = db.get_feed_by_uuid("uuid-news").await.unwrap().unwrap();
            db.set_active(feed.id, false).await.unwrap();

            config.name = "Renamed".to_string();
            config.target = "https://b.example.com/rss".to_string();
            db.sync_feeds(&[config]).await.unwrap();

            let feeds = db.get_all_feeds().await.unwrap();
            assert_eq!(feeds.len(), 1);
            assert_eq!(feeds[0].name, "Renamed");
            assert_eq!(feeds[0].target, "https://b.example.com/rss");
            assert!(!feeds[0].is_active);
        }
    }

    mod get_feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_get_feed_by_uuid() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Rss).await;
            assert_eq!(feed.name, "Test");
            assert_eq!(db.get_feed(feed.id).await.unwrap().unwrap().uuid, "uuid-test");
        }

        #[tokio::test]
        async fn test_get_nonexistent_feed() {
            let db = create_test_db().await;
            assert!(db.get_feed(999).await.unwrap().is_none());
            assert!(db.get_feed_by_uuid("missing").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_active_feeds_filtered() {
            let db = create_test_db().await;
            let configs = vec![
                create_feed_config("A", FeedKind::Rss, "https://a.example.com/rss"),
                create_feed_config("B", FeedKind::Rss, "https://b.example.com/rss"),
            ];
            db.sync_feeds(&configs).await.unwrap();
            let b = db.get_feed_by_uuid("uuid-b").await.unwrap().unwrap();

            assert!(db.set_active(b.id, false).await.unwrap());

            let active = db.get_active_feeds().await.unwrap();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].name, "A");
        }

        #[tokio::test]
        async fn test_set_active_unknown_feed() {
            let db = create_test_db().await;
            assert!(!db.set_active(999, true).await.unwrap());
        }
    }

    mod item_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_tweet_dedups_on_ogid() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Twitter).await;

            assert!(db.insert_tweet(feed.id, &new_tweet("1", utc(2024, 1, 1))).await.unwrap());
            assert!(!db.insert_tweet(feed.id, &new_tweet("1", utc(2024, 1, 2))).await.unwrap());

            let tweets = db.get_tweets_for_feed(feed.id).await.unwrap();
            assert_eq!(tweets.len(), 1);
            assert_eq!(tweets[0].create_date, "2024-01-01T12:00:00+00:00");
            assert_eq!(db.tweet_ogids(feed.id).await.unwrap(), vec!["1".to_string()]);
        }

        #[tokio::test]
        async fn test_same_ogid_different_feeds() {
            let db = create_test_db().await;
            let configs = vec![
                create_feed_config("A", FeedKind::Rss, "https://a.example.com/rss"),
                create_feed_config("B", FeedKind::Rss, "https://b.example.com/rss"),
            ];
            db.sync_feeds(&configs).await.unwrap();
            let a = db.get_feed_by_uuid("uuid-a").await.unwrap().unwrap();
            let b = db.get_feed_by_uuid("uuid-b").await.unwrap().unwrap();

            assert!(db.insert_rss_item(a.id, &new_rss_item("x", utc(2024, 1, 1))).await.unwrap());
            assert!(db.insert_rss_item(b.id, &new_rss_item("x", utc(2024, 1, 1))).await.unwrap());

            assert_eq!(db.get_item_counts(a.id).await.unwrap().rss_items, 1);
            assert_eq!(db.get_item_counts(b.id).await.unwrap().rss_items, 1);
        }

        #[tokio::test]
        async fn test_rss_items_ordered_by_pub_date_across_offsets() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Rss).await;
            let plus_five = FixedOffset::east_opt(5 * 3600).unwrap();

            // 13:00+05:00 is 08:00 UTC, earlier than 12:00 UTC
            let early = plus_five.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap();
            db.insert_rss_item(feed.id, &new_rss_item("late", utc(2024, 1, 1)))
                .await
                .unwrap();
            db.insert_rss_item(feed.id, &new_rss_item("early", early))
                .await
                .unwrap();

            let items = db.get_rss_items_for_feed(feed.id).await.unwrap();
            assert_eq!(items[0].ogid, "early");
            assert_eq!(items[1].ogid, "late");
        }

        #[tokio::test]
        async fn test_hide_flags() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Twitter).await;
            db.insert_tweet(feed.id, &new_tweet("1", utc(2024, 1, 1))).await.unwrap();
            db.insert_rss_item(feed.id, &new_rss_item("a", utc(2024, 1, 1))).await.unwrap();

            let tweet = &db.get_tweets_for_feed(feed.id).await.unwrap()[0];
            let item = &db.get_rss_items_for_feed(feed.id).await.unwrap()[0];
            assert!(!tweet.hide);

            assert!(db.set_tweet_hidden(tweet.id, true).await.unwrap());
            assert!(db.set_rss_item_hidden(item.id, true).await.unwrap());
            assert!(!db.set_tweet_hidden(999, true).await.unwrap());

            assert!(db.get_tweets_for_feed(feed.id).await.unwrap()[0].hide);
            assert!(db.get_rss_items_for_feed(feed.id).await.unwrap()[0].hide);
        }
    }

    mod channel_data_tests {
        use super::*;

        #[tokio::test]
        async fn test_upsert_replaces_in_place() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Rss).await;

            let first = ChannelData {
                title: "First".to_string(),
                generator: Some("gen 1".to_string()),
                pub_date: Some(utc(2024, 1, 1)),
                ..Default::default()
            };
            db.upsert_channel_data(feed.id, &first).await.unwrap();

            let second = ChannelData {
                title: "Second".to_string(),
                copyright: Some("(c) Example".to_string()),
                ..Default::default()
            };
            db.upsert_channel_data(feed.id, &second).await.unwrap();

            let stored = db.get_channel_data(feed.id).await.unwrap().unwrap();
            assert_eq!(stored.title, "Second");
            assert_eq!(stored.copyright.as_deref(), Some("(c) Example"));
            assert!(stored.generator.is_none());
            assert!(stored.pub_date.is_none());

            let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rss_channel_data")
                .fetch_one(&db.pool)
                .await
                .unwrap();
            assert_eq!(rows, 1);
        }

        #[tokio::test]
        async fn test_missing_channel_data() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Rss).await;
            assert!(db.get_channel_data(feed.id).await.unwrap().is_none());
        }
    }

    mod lifecycle_tests {
        use super::*;

        async fn setup_mixed_feed(db: &Database) -> Feed {
            let feed = setup_feed(db, FeedKind::Rss).await;
            for day in 1..=4 {
                db.insert_tweet(feed.id, &new_tweet(&format!("t{}", day), utc(2024, 1, day)))
                    .await
                    .unwrap();
                db.insert_rss_item(feed.id, &new_rss_item(&format!("r{}", day), utc(2024, 1, day)))
                    .await
                    .unwrap();
            }
            feed
        }

        #[tokio::test]
        async fn test_clean_up_removes_only_older_items() {
            let db = create_test_db().await;
            let feed = setup_mixed_feed(&db).await;

            // Items on days 1 and 2 are strictly earlier; day 3 equals the bound
            let counts = db.clean_up(feed.id, &utc(2024, 1, 3), None).await.unwrap();
            assert_eq!(counts, ItemCounts { tweets: 2, rss_items: 2 });

            let remaining = db.get_rss_items_for_feed(feed.id).await.unwrap();
            let ogids: Vec<_> = remaining.iter().map(|i| i.ogid.as_str()).collect();
            assert_eq!(ogids, vec!["r3", "r4"]);
            assert_eq!(db.get_item_counts(feed.id).await.unwrap().tweets, 2);
        }

        #[tokio::test]
        async fn test_clean_up_scoped_to_kind() {
            let db = create_test_db().await;
            let feed = setup_mixed_feed(&db).await;

            let counts = db
                .clean_up(feed.id, &(utc(2024, 1, 4) + Duration::days(1)), Some(FeedKind::Twitter))
                .await
                .unwrap();
            assert_eq!(counts, ItemCounts { tweets: 4, rss_items: 0 });
            assert_eq!(
                db.get_item_counts(feed.id).await.unwrap(),
                ItemCounts { tweets: 0, rss_items: 4 }
            );
        }

        #[tokio::test]
        async fn test_flush_removes_everything() {
            let db = create_test_db().await;
            let feed = setup_mixed_feed(&db).await;

            let counts = db.flush(feed.id, None).await.unwrap();
            assert_eq!(counts, ItemCounts { tweets: 4, rss_items: 4 });
            assert_eq!(db.get_item_counts(feed.id).await.unwrap(), ItemCounts::default());
        }

        #[tokio::test]
        async fn test_flush_scoped_to_kind() {
            let db = create_test_db().await;
            let feed = setup_mixed_feed(&db).await;

            let counts = db.flush(feed.id, Some(FeedKind::Rss)).await.unwrap();
            assert_eq!(counts, ItemCounts { tweets: 0, rss_items: 4 });
            assert_eq!(db.get_item_counts(feed.id).await.unwrap().tweets, 4);
        }
    }

    mod update_feed_refreshed_tests {
        use super::*;

        #[tokio::test]
        async fn test_records_time_and_error() {
            let db = create_test_db().await;
            let feed = setup_feed(&db, FeedKind::Rss).await;

            db.update_feed_refreshed(feed.id, &utc(2024, 5, 1), Some("Connection timeout"))
                .await
                .unwrap();
            let feed = db.get_feed(feed.id).await.unwrap().unwrap();
            assert_eq!(feed.last_refreshed.as_deref(), Some("2024-05-01T12:00:00+00:00"));
            assert_eq!(feed.last_error.as_deref(), Some("Connection timeout"));

            db.update_feed_refreshed(feed.id, &utc(2024, 5, 2), None).await.unwrap();
            let feed = db.get_feed(feed.id).await.unwrap().unwrap();
            assert!(feed.last_error.is_none());
        }
    }
}
