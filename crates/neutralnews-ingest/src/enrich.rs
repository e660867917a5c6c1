use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use neutralnews_common::{content_hash, normalize_link, tunables, word_count, Article, Outlet};
use neutralnews_robots::{Purpose, RobotsGate};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::warn;
use uuid::Uuid;

use crate::feed::RawItem;

const ENRICH_WORKERS: usize = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const USER_AGENT: &str = "NeutralNewsBot/1.0 (+https://neutralnews.internal)";

/// Per-outlet observable counters. Incremented as items are processed;
/// printed at the end of the enrichment stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutletCounters {
    pub requests_made: u64,
    pub successful_scrapes: u64,
    pub empty_content: u64,
    pub short_content: u64,
    pub duplicate_content: u64,
    pub blocked_by_robots: u64,
}

/// Scrapes article bodies with fallback to the raw feed description,
/// deduplicates by content hash within the run, and emits finished
/// `Article` records.
pub struct ArticleEnricher {
    client: reqwest::Client,
    robots: std::sync::Arc<RobotsGate>,
    seen_content: Mutex<HashSet<u64>>,
    workers: usize,
}

impl ArticleEnricher {
    pub fn new(robots: std::sync::Arc<RobotsGate>) -> Self {
        Self::with_workers(robots, ENRICH_WORKERS)
    }

    pub fn with_workers(robots: std::sync::Arc<RobotsGate>, workers: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build enrich HTTP client");
        Self {
            client,
            robots,
            seen_content: Mutex::new(HashSet::new()),
            workers,
        }
    }

    /// Enrich a batch of raw items already filtered against existing
    /// per-outlet links. Returns finished articles plus per-outlet counters.
    pub async fn enrich_all(
        &self,
        items: Vec<RawItem>,
    ) -> (Vec<Article>, HashMap<Outlet, OutletCounters>) {
        let results: Vec<(Outlet, Option<Article>, bool)> =
            stream::iter(items.into_iter().map(|item| async move {
                self.enrich_one(item).await
            }))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut counters: HashMap<Outlet, OutletCounters> = HashMap::new();
        let mut articles = Vec::new();
        for (outlet, article, _) in results {
            let entry = counters.entry(outlet).or_default();
            entry.requests_made += 1;
            if let Some(article) = article {
                entry.successful_scrapes += 1;
                articles.push(article);
            }
        }
        (articles, counters)
    }

    async fn enrich_one(&self, item: RawItem) -> (Outlet, Option<Article>, bool) {
        let outlet = item.outlet;

        let needs_scraping = word_count(&item.description) < tunables::MIN_WORDS;
        let mut body = item.description.clone();
        let mut scraped = false;

        if needs_scraping && !item.link.is_empty() {
            match self.robots.allowed(&item.link, Purpose::Body).await {
                neutralnews_robots::Decision::Allow => {
                    if let Some(domain) = url::Url::parse(&item.link)
                        .ok()
                        .and_then(|u| u.host_str().map(|h| h.to_string()))
                    {
                        self.robots.wait(&domain).await;
                    }
                    if let Some(extracted) = self.scrape_body(&item.link).await {
                        body = extracted;
                        scraped = true;
                    }
                }
                neutralnews_robots::Decision::Deny(reason) => {
                    warn!(link = %item.link, reason = %reason, "blocked by robots, keeping raw description");
                }
            }
        }

        if body.trim().is_empty() {
            return (outlet, None, scraped);
        }

        let hash = content_hash(&body);
        {
            let mut seen = self.seen_content.lock().expect("seen_content poisoned");
            if !seen.insert(hash) {
                return (outlet, None, scraped);
            }
        }

        if word_count(&body) < tunables::MIN_SCRAPED_WORDS {
            return (outlet, None, scraped);
        }

        let pub_date = item.pub_date.unwrap_or_else(Utc::now);
        let category = item.categories.into_iter().next().unwrap_or_else(|| "sinCategoria".to_string());

        let article = Article {
            article_id: Uuid::new_v4(),
            outlet,
            link: normalize_link_preserving(&item.link),
            title: item.title,
            raw_description: item.description,
            scraped_description: if scraped { Some(body) } else { None },
            category,
            image_url: item.image_url,
            pub_date,
            created_at: Utc::now(),
            updated_at: None,
            group_id: None,
            embedding: None,
            neutral_score: None,
        };

        (outlet, Some(article), scraped)
    }

    /// Fetch the page and run it through Readability extraction. Failures
    /// of any kind (network, parse, empty result) are swallowed — body
    /// extraction never raises, it just falls back to the raw description.
    async fn scrape_body(&self, link: &str) -> Option<String> {
        let resp = self.client.get(link).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let bytes = resp.bytes().await.ok()?;
        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let parsed_url = url::Url::parse(link).ok();
        let input = TransformInput {
            url: parsed_url.as_ref(),
            content: &bytes,
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };
        let text = transform_content_input(input, &config);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Unlike `normalize_link`, which is only for dedup comparison, the value
/// actually stored keeps its original scheme and casing.
fn normalize_link_preserving(link: &str) -> String {
    link.trim_end_matches('/').to_string()
}

/// Pre-filter: drop raw items whose normalized link is already known for
/// that outlet in the store.
pub fn filter_known_links(items: Vec<RawItem>, known_links: &HashSet<String>) -> Vec<RawItem> {
    items
        .into_iter()
        .filter(|item| !known_links.contains(&normalize_link(&item.link)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_out_known_links() {
        let items = vec![
            RawItem {
                outlet: Outlet::ElPais,
                link: "https://elpais.com/a/".to_string(),
                title: "t".to_string(),
                description: "d".to_string(),
                pub_date: None,
                categories: vec![],
                image_url: None,
            },
            RawItem {
                outlet: Outlet::ElPais,
                link: "https://elpais.com/b".to_string(),
                title: "t2".to_string(),
                description: "d2".to_string(),
                pub_date: None,
                categories: vec![],
                image_url: None,
            },
        ];
        let mut known = HashSet::new();
        known.insert(normalize_link("https://elpais.com/a"));
        let remaining = filter_known_links(items, &known);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].link, "https://elpais.com/b");
    }
}
