//! Minimal Twitter REST client: just enough to read a user timeline with an
//! OAuth 1.0a signed request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use tracing::debug;
use url::Url;

use crate::config::TwitterCredentials;
use crate::db::NewTweet;

type HmacSha1 = Hmac<Sha1>;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub id: u64,
    pub created_at: String,
    #[serde(alias = "full_text")]
    pub text: String,
    #[serde(default)]
    pub source: String,
    pub user: User,
    pub in_reply_to_user_id: Option<u64>,
    pub in_reply_to_screen_name: Option<String>,
    pub in_reply_to_status_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    pub screen_name: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

impl Status {
    pub fn ogid(&self) -> String {
        self.id.to_string()
    }

    pub fn created_at(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
    }

    /// Converts into a storable tweet with `create_date` in `offset`.
    pub fn to_new_tweet(&self, offset: &FixedOffset) -> Result<NewTweet, chrono::ParseError> {
        Ok(NewTweet {
            ogid: self.ogid(),
            create_date: self.created_at()?.with_timezone(offset),
            from_user_id: self.user.id.to_string(),
            from_user_name: self.user.screen_name.clone(),
            language: self.user.lang.clone().unwrap_or_default(),
            profile_image_url: self.user.profile_image_url.clone().unwrap_or_default(),
            source: self.source.clone(),
            text: self.text.clone(),
            to_user_id: self.in_reply_to_user_id.map(|id| id.to_string()),
            to_user_screen_name: self.in_reply_to_screen_name.clone(),
            to_status_id: self.in_reply_to_status_id.map(|id| id.to_string()),
        })
    }
}

pub struct TwitterClient<'a> {
    client: &'a Client,
    credentials: TwitterCredentials,
}

impl<'a> TwitterClient<'a> {
    pub fn new(client: &'a Client, credentials: TwitterCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Fetches the most recent statuses of `screen_name` from the timeline
    /// endpoint (which may already carry query parameters).
    pub async fn user_timeline(
        &self,
        endpoint: &str,
        screen_name: &str,
    ) -> anyhow::Result<Vec<Status>> {
        let mut url = Url::parse(endpoint)?;
        url.query_pairs_mut()
            .append_pair("screen_name", screen_name)
            .append_pair("tweet_mode", "extended");

        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let header = authorization_header(
            "GET",
            &url,
            &self.credentials,
            &nonce,
            Utc::now().timestamp(),
        )?;

        debug!("Requesting timeline of @{} from {}", screen_name, url);
        let statuses = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Status>>()
            .await?;

        Ok(statuses)
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// The OAuth 1.0a signature base string: method, base URL and the sorted,
/// percent-encoded parameter string, each encoded and joined with `&`.
pub fn signature_base(method: &str, url: &Url, oauth_params: &[(&str, String)]) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url.as_str()),
        encode(&param_string)
    )
}

pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> anyhow::Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing key: {}", e))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn authorization_header(
    method: &str,
    url: &Url,
    credentials: &TwitterCredentials,
    nonce: &str,
    timestamp: i64,
) -> anyhow::Result<String> {
    let mut oauth_params = vec![
        ("oauth_consumer_key", credentials.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", credentials.access_token_key.clone()),
        ("oauth_version", "1.0".to_string()),
    ];

    let base = signature_base(method, url, &oauth_params);
    let signature = sign(
        &base,
        &credentials.consumer_secret,
        &credentials.access_token_secret,
    )?;
    oauth_params.push(("oauth_signature", signature));
    oauth_params.sort_by(|a, b| a.0.cmp(b.0));

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}
