use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use neutralnews_common::Outlet;
use regex::Regex;
use tracing::{info, warn};

const FEED_WORKERS: usize = 16;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const USER_AGENT: &str = "NeutralNewsBot/1.0 (+https://neutralnews.internal)";

/// A single raw feed entry, before enrichment. Carries everything the
/// article enricher (C3) needs to decide whether to scrape the body.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub outlet: Outlet,
    pub link: String,
    pub title: String,
    pub description: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub image_url: Option<String>,
}

/// Fetches and parses the RSS/Atom feed for every registered outlet, bounded
/// by a worker pool. A single outlet failing (403, timeout, malformed XML)
/// never aborts the batch — it just contributes zero items.
pub struct FeedFetcher {
    client: reqwest::Client,
    workers: usize,
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self::with_workers(FEED_WORKERS)
    }

    pub fn with_workers(workers: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build feed HTTP client");
        Self { client, workers }
    }

    /// Fetch every outlet's feed in parallel and return the aggregated raw
    /// items across all outlets.
    pub async fn fetch_all(&self, outlets: &[Outlet]) -> Vec<RawItem> {
        let results: Vec<Vec<RawItem>> = stream::iter(outlets.iter().copied().map(|outlet| {
            let client = self.client.clone();
            async move { Self::fetch_outlet(&client, outlet).await }
        }))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        results.into_iter().flatten().collect()
    }

    async fn fetch_outlet(client: &reqwest::Client, outlet: Outlet) -> Vec<RawItem> {
        let feed_url = outlet.profile().feed_url;
        let resp = match client.get(feed_url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(feed_url, error = %e, "feed request failed");
                return Vec::new();
            }
        };

        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            warn!(feed_url, "feed denied with 403, skipping outlet");
            return Vec::new();
        }
        if !resp.status().is_success() {
            warn!(feed_url, status = %resp.status(), "non-200 feed response, skipping outlet");
            return Vec::new();
        }

        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(feed_url, error = %e, "failed to read feed body");
                return Vec::new();
            }
        };

        let feed = match feed_rs::parser::parse(&bytes[..]) {
            Ok(f) => f,
            Err(e) => {
                warn!(feed_url, error = %e, "failed to parse feed XML");
                return Vec::new();
            }
        };

        let items: Vec<RawItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::entry_to_raw_item(outlet, entry))
            .collect();

        info!(feed_url, items = items.len(), "feed fetched");
        items
    }

    fn entry_to_raw_item(outlet: Outlet, entry: feed_rs::model::Entry) -> Option<RawItem> {
        let link = entry.links.first().map(|l| l.href.clone())?;
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let pub_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));
        let categories = entry.categories.into_iter().map(|c| c.term).collect();
        let image_url = image_url_from_media(&entry.media)
            .or_else(|| first_img_src(&description));

        Some(RawItem {
            outlet,
            link,
            title,
            description,
            pub_date,
            categories,
            image_url,
        })
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// First present of `media:content` or `enclosure` image reference
/// (feed-rs surfaces both as `MediaObject`s on the entry).
fn image_url_from_media(media: &[feed_rs::model::MediaObject]) -> Option<String> {
    media
        .iter()
        .flat_map(|m| m.content.iter())
        .find(|c| {
            c.content_type
                .as_ref()
                .map(|ct| ct.ty().as_ref().eq_ignore_ascii_case("image"))
                .unwrap_or(true)
        })
        .and_then(|c| c.url.as_ref())
        .map(|u| u.to_string())
}

/// Fallback: first `<img>` tag inside the raw description HTML.
fn first_img_src(description: &str) -> Option<String> {
    let re = Regex::new(r#"<img[^>]+src\s*=\s*["']([^"']+)["']"#).ok()?;
    re.captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_img_src_from_description() {
        let desc = r#"<p>intro</p><img src="https://example.com/a.jpg" alt="x"/>"#;
        assert_eq!(first_img_src(desc).as_deref(), Some("https://example.com/a.jpg"));
    }

    #[test]
    fn no_img_tag_returns_none() {
        assert_eq!(first_img_src("<p>no image here</p>"), None);
    }
}
