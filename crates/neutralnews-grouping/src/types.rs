use chrono::{DateTime, Utc};
use neutralnews_common::Outlet;
use uuid::Uuid;

/// One article as seen by the grouping engine. `existing_group_id` marks it
/// as a *reference* item already belonging to a live `NeutralGroup`.
#[derive(Debug, Clone)]
pub struct GroupItem {
    pub article_id: Uuid,
    pub outlet: Outlet,
    pub title: String,
    pub scraped_description: Option<String>,
    pub raw_description: String,
    pub embedding: Vec<f32>,
    pub pub_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub existing_group_id: Option<i64>,
}

impl GroupItem {
    pub fn is_reference(&self) -> bool {
        self.existing_group_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupAssignment {
    pub article_id: Uuid,
    pub group_id: Option<i64>,
}
