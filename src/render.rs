use std::sync::OnceLock;

use askama::Template;
use askama_escape::Html;
use regex::Regex;

use crate::db::{RssItem, Tweet};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListType {
    #[default]
    Ul,
    Ol,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Ul => "ul",
            ListType::Ol => "ol",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Maximum number of items; `None` renders all of them
    pub amount: Option<usize>,
    pub list_class: Option<String>,
    pub item_class: Option<String>,
    pub list_type: ListType,
    pub show_profile_image: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            amount: None,
            list_class: None,
            item_class: None,
            list_type: ListType::Ul,
            show_profile_image: true,
        }
    }
}

/// The stored items of one feed, in display order.
pub enum FeedItems<'a> {
    Tweets(&'a [Tweet]),
    RssItems(&'a [RssItem]),
}

struct ListRow {
    show_image: bool,
    image_url: String,
    user_name: String,
    body_class: &'static str,
    body: String,
}

#[derive(Template)]
#[template(path = "feed_list.html")]
struct FeedListTemplate<'a> {
    list_type: &'static str,
    list_class: &'a str,
    item_class: &'a str,
    rows: Vec<ListRow>,
}

/// Renders the visible items as an HTML list fragment. Tweet text is escaped
/// and has bare URLs turned into links; RSS descriptions are emitted as
/// supplied.
pub fn generate_feed_list(items: FeedItems<'_>, options: &ListOptions) -> Result<String, RenderError> {
    let limit = match options.amount {
        Some(0) => return Err(RenderError::InvalidAmount),
        Some(n) => n,
        None => usize::MAX,
    };

    let (default_list_class, default_item_class, rows): (_, _, Vec<ListRow>) = match items {
        FeedItems::Tweets(tweets) => (
            "tweet-list",
            "tweet",
            tweets
                .iter()
                .filter(|t| !t.hide)
                .take(limit)
                .map(|t| ListRow {
                    show_image: options.show_profile_image,
                    image_url: t.profile_image_url.clone(),
                    user_name: t.from_user_name.clone(),
                    body_class: "tweet-body",
                    body: urlize(&t.text),
                })
                .collect(),
        ),
        FeedItems::RssItems(rss_items) => (
            "rss-list",
            "rss-item",
            rss_items
                .iter()
                .filter(|i| !i.hide)
                .take(limit)
                .map(|i| ListRow {
                    show_image: false,
                    image_url: String::new(),
                    user_name: String::new(),
                    body_class: "rss-item-body",
                    body: i.description.clone(),
                })
                .collect(),
        ),
    };

    let template = FeedListTemplate {
        list_type: options.list_type.as_str(),
        list_class: options.list_class.as_deref().unwrap_or(default_list_class),
        item_class: options.item_class.as_deref().unwrap_or(default_item_class),
        rows,
    };

    Ok(template.render()?)
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://[^\s<>"']+"#).expect("URL pattern is valid")
    })
}

fn escape_html(text: &str) -> String {
    askama_escape::escape(text, Html).to_string()
}

/// Splits sentence punctuation and unbalanced closing brackets off the end
/// of a matched URL.
fn split_trailing(url: &str) -> (&str, &str) {
    let mut end = url.len();
    while let Some(c) = url[..end].chars().last() {
        let candidate = &url[..end];
        let strip = match c {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => candidate.matches('(').count() < candidate.matches(')').count(),
            ']' => candidate.matches('[').count() < candidate.matches(']').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= c.len_utf8();
    }
    url.split_at(end)
}

/// HTML-escapes `text` and wraps every bare http(s) URL in an anchor
/// pointing at itself.
pub fn urlize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for found in url_pattern().find_iter(text) {
        let (url, trailing) = split_trailing(found.as_str());
        out.push_str(&escape_html(&text[last..found.start()]));
        let url = escape_html(url);
        out.push_str(&format!(r#"<a href="{url}">{url}</a>"#));
        out.push_str(&escape_html(trailing));
        last = found.end();
    }
    out.push_str(&escape_html(&text[last..]));

    out
}
