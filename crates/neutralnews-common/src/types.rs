use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outlets::Outlet;

/// A single fetched/enriched news item. Identity is `article_id`; `link` is
/// globally unique across all articles (enforced by the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: Uuid,
    pub outlet: Outlet,
    pub link: String,
    pub title: String,
    pub raw_description: String,
    pub scraped_description: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub group_id: Option<i64>,
    pub embedding: Option<Vec<f32>>,
    pub neutral_score: Option<i32>,
}

impl Article {
    /// The text body used as the grouping/embedding description, preferring
    /// the scraped body over the raw feed description.
    pub fn best_description(&self) -> &str {
        self.scraped_description
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.raw_description)
    }
}

/// The neutral rendition of a group of articles covering the same event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutralGroup {
    pub group_id: i64,
    pub neutral_title: String,
    pub neutral_description: String,
    pub category: String,
    pub relevance: i32,
    pub source_ids: Vec<Uuid>,
    pub image_url: Option<String>,
    pub image_medium: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Process-wide tunables. See the data model invariants for provenance of
/// each constant; none of these should be re-derived at call sites.
pub mod tunables {
    pub const MIN_SOURCES: usize = 3;
    pub const SOURCES_LIMIT: usize = 16;
    pub const MAX_GROUP_SIZE: usize = 25;
    pub const MIN_SUBDIVISION_SIZE: usize = 5;
    pub const CLUSTER_EPS: f64 = 0.2125;
    pub const NEIGHBOR_K: usize = if MIN_SOURCES > 5 { MIN_SOURCES } else { 5 };
    pub const SUBDIV_SIM: f64 = 0.65;
    pub const NEW_GROUP_SIM: f64 = 0.85;
    pub const TARGET_SUBGROUP_SIZE: usize = 8;
    pub const RECENT_WINDOW_HOURS: i64 = 48;
    pub const RETENTION_DAYS: i64 = 7;
    pub const MIN_WORDS: usize = 100;
    pub const MIN_SCRAPED_WORDS: usize = 100;
    pub const MAX_DOMAINS: usize = 50;
    pub const DOMAIN_DELAY_SECS: f64 = 0.5;
    pub const CALLS_PER_MINUTE: u32 = 500;
    pub const INITIAL_WORKERS: usize = 10;
    pub const MAX_WORKERS: usize = 25;
    pub const EMBED_BATCH_SIZE: usize = 256;
    pub const EMBED_PERSIST_BATCH: usize = 50;
}

/// FNV-1a hash, stable across process restarts (unlike `DefaultHasher`,
/// which randomizes its seed). Used for the run-scoped content dedup set.
pub fn content_hash(content: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for byte in content.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Simple word-count helper used for the scrape-needed and scrape-quality
/// gates (`MIN_WORDS`, `MIN_SCRAPED_WORDS`).
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalize a link for dedup comparison: scheme stripped, lower-cased,
/// trailing slash removed.
pub fn normalize_link(link: &str) -> String {
    link.to_lowercase()
        .replacen("https://", "", 1)
        .replacen("http://", "", 1)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_and_trailing_slash() {
        assert_eq!(
            normalize_link("HTTPS://Example.com/news/foo/"),
            "example.com/news/foo"
        );
        assert_eq!(normalize_link("http://example.com/news/foo"), "example.com/news/foo");
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(content_hash("hello world"), content_hash("hello world"));
        assert_ne!(content_hash("hello world"), content_hash("hello there"));
    }

    #[test]
    fn word_count_counts_whitespace_separated_tokens() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count(""), 0);
    }
}
