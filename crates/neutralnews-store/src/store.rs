use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use neutralnews_common::{Article, NeutralGroup, Outlet};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::rows::{ArticleRow, GroupRow};

/// Generic batch-write ceiling. Individual operations re-batch below this
/// when the document/row size pushes them over (embeddings, article
/// deletes) per the store contract.
const GENERIC_BATCH: usize = 450;
const EMBEDDING_BATCH: usize = 50;
const ARTICLE_DELETE_BATCH: usize = 200;
const PUB_DATE_MAX_AGE_DAYS: i64 = 3;

/// Partial update for an existing `NeutralGroup`. `None` fields are left
/// untouched; used by the neutralizer's update path, which only patches
/// `{neutral_title, neutral_description, category, relevance, source_ids,
/// updated_at}` plus `date`/`image_*` when those were recomputed.
#[derive(Debug, Default, Clone)]
pub struct GroupPatch {
    pub neutral_title: Option<String>,
    pub neutral_description: Option<String>,
    pub category: Option<String>,
    pub relevance: Option<i32>,
    pub source_ids: Option<Vec<Uuid>>,
    pub date: Option<DateTime<Utc>>,
    pub image_url: Option<Option<String>>,
    pub image_medium: Option<Option<String>>,
}

#[derive(Clone)]
pub struct ArticleStore {
    pool: PgPool,
}

impl ArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Articles ---------------------------------------------------------

    /// Insert an article if its link is not already present. Returns
    /// `true` if a row was inserted, `false` if it was skipped as a
    /// pre-existing link (idempotent ingestion).
    pub async fn put_article(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (article_id, outlet, link, title, raw_description, scraped_description,
                 category, image_url, pub_date, created_at, updated_at, group_id,
                 embedding, neutral_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (link) DO NOTHING
            "#,
        )
        .bind(article.article_id)
        .bind(article.outlet.tag())
        .bind(&article.link)
        .bind(&article.title)
        .bind(&article.raw_description)
        .bind(&article.scraped_description)
        .bind(&article.category)
        .bind(&article.image_url)
        .bind(article.pub_date)
        .bind(article.created_at)
        .bind(article.updated_at)
        .bind(article.group_id)
        .bind(&article.embedding)
        .bind(article.neutral_score)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a batch of articles, committing in chunks of `GENERIC_BATCH`.
    /// Returns the number actually inserted (existing links are skipped).
    pub async fn put_articles_batch(&self, articles: &[Article]) -> Result<usize> {
        let mut inserted = 0usize;
        for chunk in articles.chunks(GENERIC_BATCH) {
            for article in chunk {
                match self.put_article(article).await {
                    Ok(true) => inserted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(link = %article.link, error = %e, "failed to persist article, dropping from batch");
                    }
                }
            }
        }
        Ok(inserted)
    }

    pub async fn exists_by_link(&self, link: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM articles WHERE link = $1")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn list_links_by_outlet(&self, outlet: Outlet) -> Result<HashSet<String>> {
        let links: Vec<String> =
            sqlx::query_scalar("SELECT link FROM articles WHERE outlet = $1")
                .bind(outlet.tag())
                .fetch_all(&self.pool)
                .await?;
        Ok(links.into_iter().collect())
    }

    /// Articles with `pub_date >= pub_date_since`, optionally restricted to
    /// a set of group ids (used to pull in reference items).
    pub async fn query_articles(
        &self,
        pub_date_since: DateTime<Utc>,
        group_id_in: Option<&[i64]>,
    ) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = match group_id_in {
            Some(ids) => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM articles
                    WHERE pub_date >= $1 AND (group_id = ANY($2) OR group_id IS NULL)
                    "#,
                )
                .bind(pub_date_since)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM articles WHERE pub_date >= $1")
                    .bind(pub_date_since)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        let articles = rows.into_iter().map(Article::from).collect();
        Ok(self.clamp_stale_pub_dates(articles).await)
    }

    /// Enforces article invariant (c): `pub_date` no older than `created_at
    /// - 3 days`. Stale values are clamped to `created_at`, persisted via
    /// `clamp_pub_date`, and the in-memory copies fixed up before being
    /// handed back to the caller, so grouping and neutralization never see
    /// an unclamped date.
    async fn clamp_stale_pub_dates(&self, mut articles: Vec<Article>) -> Vec<Article> {
        for article in &mut articles {
            let cutoff = article.created_at - Duration::days(PUB_DATE_MAX_AGE_DAYS);
            if article.pub_date < cutoff {
                match self.clamp_pub_date(article.article_id, article.created_at).await {
                    Ok(()) => article.pub_date = article.created_at,
                    Err(e) => warn!(
                        article_id = %article.article_id,
                        error = %e,
                        "failed to clamp stale pub_date"
                    ),
                }
            }
        }
        articles
    }

    pub async fn put_embedding(&self, article_id: Uuid, embedding: &[f32]) -> Result<()> {
        sqlx::query("UPDATE articles SET embedding = $1 WHERE article_id = $2")
            .bind(embedding)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Re-batched at `EMBEDDING_BATCH` (smaller than the generic ceiling
    /// because embedding vectors make each row heavier).
    pub async fn put_embeddings_batch(&self, items: &[(Uuid, Vec<f32>)]) -> Result<()> {
        for chunk in items.chunks(EMBEDDING_BATCH) {
            for (id, embedding) in chunk {
                if let Err(e) = self.put_embedding(*id, embedding).await {
                    warn!(article_id = %id, error = %e, "failed to persist embedding");
                }
            }
        }
        Ok(())
    }

    pub async fn update_group_id(&self, article_id: Uuid, group_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE articles SET group_id = $1, updated_at = now() WHERE article_id = $2")
            .bind(group_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_group_ids_batch(&self, updates: &[(Uuid, Option<i64>)]) -> Result<()> {
        for chunk in updates.chunks(GENERIC_BATCH) {
            for (id, group_id) in chunk {
                if let Err(e) = self.update_group_id(*id, *group_id).await {
                    warn!(article_id = %id, error = %e, "failed to update group_id");
                }
            }
        }
        Ok(())
    }

    pub async fn update_neutral_score(&self, article_id: Uuid, score: i32) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET neutral_score = $1, updated_at = now() WHERE article_id = $2",
        )
        .bind(score)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clamp a pub_date older than `created_at - 3 days` back to
    /// `created_at`, persisting the fix. Self-healing rule enforced on
    /// read, ahead of grouping/neutralization.
    pub async fn clamp_pub_date(&self, article_id: Uuid, created_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE articles SET pub_date = $1 WHERE article_id = $2")
            .bind(created_at)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete articles by id, batched at `ARTICLE_DELETE_BATCH` (smaller
    /// than the generic ceiling to stay within transaction size). Returns
    /// the number of rows actually deleted.
    pub async fn delete_articles(&self, ids: &[Uuid]) -> Result<u64> {
        let mut deleted = 0u64;
        for chunk in ids.chunks(ARTICLE_DELETE_BATCH) {
            let result = sqlx::query("DELETE FROM articles WHERE article_id = ANY($1)")
                .bind(chunk)
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    // -- Neutral groups -----------------------------------------------------

    pub async fn get_group(&self, group_id: i64) -> Result<Option<NeutralGroup>> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT * FROM neutral_groups WHERE group_id = $1")
                .bind(group_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(NeutralGroup::from))
    }

    pub async fn put_group(&self, group: &NeutralGroup) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO neutral_groups
                (group_id, neutral_title, neutral_description, category, relevance,
                 source_ids, image_url, image_medium, date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (group_id) DO UPDATE SET
                neutral_title = EXCLUDED.neutral_title,
                neutral_description = EXCLUDED.neutral_description,
                category = EXCLUDED.category,
                relevance = EXCLUDED.relevance,
                source_ids = EXCLUDED.source_ids,
                image_url = EXCLUDED.image_url,
                image_medium = EXCLUDED.image_medium,
                date = EXCLUDED.date,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(group.group_id)
        .bind(&group.neutral_title)
        .bind(&group.neutral_description)
        .bind(&group.category)
        .bind(group.relevance)
        .bind(&group.source_ids)
        .bind(&group.image_url)
        .bind(&group.image_medium)
        .bind(group.date)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Partial update for the neutralizer's "changed" path.
    pub async fn patch_group(&self, group_id: i64, patch: GroupPatch) -> Result<()> {
        let current = self.get_group(group_id).await?;
        let Some(current) = current else {
            return Ok(());
        };
        let merged = NeutralGroup {
            neutral_title: patch.neutral_title.unwrap_or(current.neutral_title),
            neutral_description: patch.neutral_description.unwrap_or(current.neutral_description),
            category: patch.category.unwrap_or(current.category),
            relevance: patch.relevance.unwrap_or(current.relevance),
            source_ids: patch.source_ids.unwrap_or(current.source_ids),
            date: patch.date.unwrap_or(current.date),
            image_url: patch.image_url.unwrap_or(current.image_url),
            image_medium: patch.image_medium.unwrap_or(current.image_medium),
            updated_at: Some(Utc::now()),
            ..current
        };
        self.put_group(&merged).await
    }

    pub async fn delete_group(&self, group_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM neutral_groups WHERE group_id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_groups(&self, ids: &[i64]) -> Result<u64> {
        let mut deleted = 0u64;
        for chunk in ids.chunks(GENERIC_BATCH) {
            let result = sqlx::query("DELETE FROM neutral_groups WHERE group_id = ANY($1)")
                .bind(chunk)
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    pub async fn query_recent_groups(&self, since: DateTime<Utc>) -> Result<Vec<NeutralGroup>> {
        let rows: Vec<GroupRow> =
            sqlx::query_as("SELECT * FROM neutral_groups WHERE date >= $1")
                .bind(since)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(NeutralGroup::from).collect())
    }

    pub async fn list_group_ids_recent(&self, since: DateTime<Utc>) -> Result<HashSet<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT group_id FROM neutral_groups WHERE date >= $1")
                .bind(since)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    /// Article ids aged past `time_threshold` by `created_at`. Retention
    /// candidates before the protected-set filter is applied.
    pub async fn list_article_ids_older_than(&self, time_threshold: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT article_id FROM articles WHERE created_at < $1")
                .bind(time_threshold)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Group ids aged past `time_threshold` by `created_at`. Unlike article
    /// retention, groups are deleted unconditionally once aged: a group is
    /// itself the thing that keeps its sources protected, so once it ages
    /// out there is nothing left to protect it in turn.
    pub async fn list_group_ids_older_than(&self, time_threshold: DateTime<Utc>) -> Result<Vec<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT group_id FROM neutral_groups WHERE created_at < $1")
                .bind(time_threshold)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    pub async fn list_group_items(&self, group_id: i64) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> =
            sqlx::query_as("SELECT * FROM articles WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        let articles = rows.into_iter().map(Article::from).collect();
        Ok(self.clamp_stale_pub_dates(articles).await)
    }

    pub async fn count_group_items(&self, group_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM articles WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Remove a single article from a group: clears its `group_id` and
    /// drops it from the group's `source_ids` array.
    pub async fn remove_source_from_group(&self, group_id: i64, article_id: Uuid) -> Result<()> {
        self.update_group_id(article_id, None).await?;
        sqlx::query(
            "UPDATE neutral_groups SET source_ids = array_remove(source_ids, $1) WHERE group_id = $2",
        )
        .bind(article_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Highest known group id, excluding the 7-digit subdivision id range
    /// (>= 1_000_000), so fresh top-level ids never collide with
    /// subdivisions.
    pub async fn max_top_level_group_id(&self) -> Result<i64> {
        let max_group: Option<i64> = sqlx::query_scalar(
            "SELECT max(group_id) FROM neutral_groups WHERE group_id < 1000000",
        )
        .fetch_one(&self.pool)
        .await?;
        let max_article: Option<i64> = sqlx::query_scalar(
            "SELECT max(group_id) FROM articles WHERE group_id < 1000000",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(max_group.into_iter().chain(max_article).max().unwrap_or(0))
    }
}
