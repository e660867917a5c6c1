use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use neutralnews_common::tunables::RECENT_WINDOW_HOURS;
use neutralnews_common::Outlet;
use neutralnews_embed::EmbeddingStage;
use neutralnews_grouping::{GroupItem, GroupingEngine};
use neutralnews_ingest::{filter_known_links, ArticleEnricher, FeedFetcher};
use neutralnews_neutralizer::Neutralizer;
use neutralnews_retention::RetentionSweeper;
use neutralnews_robots::RobotsGate;
use neutralnews_store::ArticleStore;
use tracing::info;

/// One pass over every outlet: fetch feeds, enrich, embed, group, and
/// neutralize whatever groups changed. Idempotent: articles already in the
/// store are skipped by link, embeddings already present are skipped, and
/// unchanged groups are skipped by the neutralizer's own change detection.
pub async fn ingest_and_neutralize(
    store: Arc<ArticleStore>,
    robots: Arc<RobotsGate>,
    embed: Arc<EmbeddingStage>,
    neutralizer: Arc<Neutralizer>,
) -> Result<()> {
    let outlets = Outlet::all();

    info!(outlets = outlets.len(), "fetching feeds");
    let raw_items = FeedFetcher::new().fetch_all(outlets).await;
    info!(items = raw_items.len(), "fetched feed items");

    let mut known_links: HashSet<String> = HashSet::new();
    for &outlet in outlets {
        known_links.extend(store.list_links_by_outlet(outlet).await?);
    }
    let new_items = filter_known_links(raw_items, &known_links);
    info!(new_items = new_items.len(), "items after dedup against the store");

    let (mut articles, counters) = ArticleEnricher::new(robots).enrich_all(new_items).await;
    for (outlet, c) in &counters {
        info!(
            outlet = outlet.tag(),
            requests = c.requests_made,
            scraped = c.successful_scrapes,
            empty = c.empty_content,
            short = c.short_content,
            duplicate = c.duplicate_content,
            blocked = c.blocked_by_robots,
            "enrichment counters"
        );
    }

    let persisted = store.put_articles_batch(&articles).await?;
    info!(persisted, "persisted new articles");

    embed.run(&mut articles, &store).await?;

    let since = Utc::now() - Duration::hours(RECENT_WINDOW_HOURS);
    let recent = store.query_articles(since, None).await?;
    let items: Vec<GroupItem> = recent
        .iter()
        .map(|a| GroupItem {
            article_id: a.article_id,
            outlet: a.outlet,
            title: a.title.clone(),
            scraped_description: a.scraped_description.clone(),
            raw_description: a.raw_description.clone(),
            embedding: a.embedding.clone().unwrap_or_default(),
            pub_date: a.pub_date,
            created_at: a.created_at,
            existing_group_id: a.group_id,
        })
        .collect();
    info!(candidates = items.len(), "grouping candidates in the recent window");

    let engine = GroupingEngine::new(store.clone());
    let assignments = engine.group(items).await?;
    let updates: Vec<_> = assignments
        .iter()
        .map(|a| (a.article_id, a.group_id))
        .collect();
    store.update_group_ids_batch(&updates).await?;

    let touched: HashSet<i64> = assignments.iter().filter_map(|a| a.group_id).collect();
    let group_ids: Vec<i64> = touched.into_iter().collect();
    info!(groups = group_ids.len(), "neutralizing touched groups");

    let results = neutralizer.run(group_ids).await;
    let mut outcomes: HashMap<&str, u32> = HashMap::new();
    for r in &results {
        let key = r.reason.as_deref().unwrap_or(if r.success { "ok" } else { "failed" });
        *outcomes.entry(key).or_default() += 1;
    }
    info!(?outcomes, "neutralization pass complete");

    Ok(())
}

pub async fn retention_sweep(store: Arc<ArticleStore>, retention_days: i64) -> Result<()> {
    let sweeper = RetentionSweeper::new(store).with_retention_days(retention_days);
    let report = sweeper.run().await?;
    info!(
        articles_deleted = report.articles_deleted,
        groups_deleted = report.groups_deleted,
        protected = report.protected_count,
        "retention sweep complete"
    );
    Ok(())
}
