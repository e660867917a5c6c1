use chrono::{DateTime, Utc};
use neutralnews_common::{Article, NeutralGroup, Outlet};
use uuid::Uuid;

/// Flat row shape matching the `articles` table. `Outlet` is stored as its
/// stable tag string since sqlx has no direct mapping for our enum.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub article_id: Uuid,
    pub outlet: String,
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

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            article_id: row.article_id,
            outlet: Outlet::from_tag(&row.outlet).unwrap_or(Outlet::ElPais),
            link: row.link,
            title: row.title,
            raw_description: row.raw_description,
            scraped_description: row.scraped_description,
            category: row.category,
            image_url: row.image_url,
            pub_date: row.pub_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            group_id: row.group_id,
            embedding: row.embedding,
            neutral_score: row.neutral_score,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GroupRow {
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

impl From<GroupRow> for NeutralGroup {
    fn from(row: GroupRow) -> Self {
        NeutralGroup {
            group_id: row.group_id,
            neutral_title: row.neutral_title,
            neutral_description: row.neutral_description,
            category: row.category,
            relevance: row.relevance,
            source_ids: row.source_ids,
            image_url: row.image_url,
            image_medium: row.image_medium,
            date: row.date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
