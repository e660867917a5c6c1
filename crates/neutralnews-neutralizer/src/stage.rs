use std::sync::Arc;

use neutralnews_common::{Article, LlmErrorClass, NeutralGroup, PipelineError};
use neutralnews_store::{ArticleStore, GroupPatch};
use tracing::{info, warn};
use uuid::Uuid;

use neutralnews_common::tunables::MIN_SOURCES;

use crate::image::select_most_neutral_image;
use crate::llm::{classify, LlmClient};
use crate::prompt::{user_message, SourceRating, SYSTEM_PROMPT};
use crate::rate_limiter::RateLimiter;
use crate::sources::{prepare_sources_text, reduced_sources_text, select_sources, CandidateSource};

/// Outcome of processing one group, matching the structured result record
/// every stage emits at its boundary: nothing escapes as a raw error.
#[derive(Debug, Clone)]
pub struct GroupResult {
    pub group_id: i64,
    pub success: bool,
    pub reason: Option<String>,
}

enum Classification {
    Unchanged,
    Changed { stored: NeutralGroup },
    New,
}

pub struct Neutralizer {
    store: Arc<ArticleStore>,
    llm: Arc<dyn LlmClient>,
    rate_limiter: Arc<RateLimiter>,
}

impl Neutralizer {
    pub fn new(store: Arc<ArticleStore>, llm: Arc<dyn LlmClient>, calls_per_minute: u32) -> Self {
        Self {
            store,
            llm,
            rate_limiter: Arc::new(RateLimiter::new(calls_per_minute)),
        }
    }

    /// Neutralizes every group in `group_ids`, newest-`pub_date`-first, and
    /// returns one result record per group. Rate-limited groups are queued
    /// and retried once, serially, after the main pass.
    pub async fn run(&self, group_ids: Vec<i64>) -> Vec<GroupResult> {
        let mut with_dates = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            let members = self.store.list_group_items(group_id).await.unwrap_or_default();
            let most_recent = members.iter().map(|a| a.pub_date).max();
            with_dates.push((group_id, most_recent));
        }
        with_dates.sort_by(|a, b| b.1.cmp(&a.1));

        let mut results = Vec::new();
        for (group_id, _) in &with_dates {
            let result = self.process_group(*group_id).await;
            if matches!(result.reason.as_deref(), Some("rate_limited")) {
                self.rate_limiter.queue_for_retry(*group_id).await;
            } else {
                results.push(result);
            }
        }

        if self.rate_limiter.has_retry_work().await {
            info!("retrying rate-limited groups at reduced concurrency");
            for group_id in self.rate_limiter.drain_retry_queue().await {
                results.push(self.process_group(group_id).await);
            }
        }

        results
    }

    async fn classify(&self, group_id: i64, current_source_ids: &[Uuid]) -> Classification {
        match self.store.get_group(group_id).await {
            Ok(Some(stored)) => {
                let mut stored_sorted = stored.source_ids.clone();
                stored_sorted.sort();
                let mut current_sorted = current_source_ids.to_vec();
                current_sorted.sort();

                if stored_sorted == current_sorted {
                    Classification::Unchanged
                } else {
                    Classification::Changed { stored }
                }
            }
            _ => Classification::New,
        }
    }

    /// Returns true when the update should be skipped, per the normative
    /// rule: skip only when the change ratio is small AND the absolute
    /// source count increase is not one of the defined "significant"
    /// jumps. Both conditions must hold to skip.
    fn should_skip_update(existing_count: usize, current_count: usize, changed: usize) -> bool {
        const MIN_CHANGE_RATIO: f64 = 0.5;
        let change_ratio = changed as f64 / (existing_count.max(1) as f64);
        let significant_increase = matches!(
            (existing_count, current_count),
            (3..=5, 6..) | (6..=8, 9..) | (9..=11, 12..) | (12..=13, 14..)
        );
        change_ratio < MIN_CHANGE_RATIO && !significant_increase
    }

    async fn process_group(&self, group_id: i64) -> GroupResult {
        let members = match self.store.list_group_items(group_id).await {
            Ok(m) => m,
            Err(e) => {
                return GroupResult {
                    group_id,
                    success: false,
                    reason: Some(format!("store read failed: {e}")),
                }
            }
        };

        let current_source_ids: Vec<Uuid> = members.iter().map(|a| a.article_id).collect();
        let classification = self.classify(group_id, &current_source_ids).await;
        if matches!(classification, Classification::Unchanged) {
            return GroupResult {
                group_id,
                success: true,
                reason: Some("unchanged".to_string()),
            };
        }

        let selection = match select_sources(&members) {
            Some(s) => s,
            None => {
                self.unassign(group_id, &members.iter().map(|a| a.article_id).collect::<Vec<_>>())
                    .await;
                return GroupResult {
                    group_id,
                    success: false,
                    reason: Some(
                        PipelineError::InsufficientSources { group_id }.to_string(),
                    ),
                };
            }
        };

        if let Classification::Changed { stored } = &classification {
            let existing_count = stored.source_ids.len();
            let current_count = selection.kept.len();
            let changed = {
                let mut existing_sorted = stored.source_ids.clone();
                existing_sorted.sort();
                let mut current_sorted: Vec<Uuid> =
                    selection.kept.iter().map(|s| s.article_id).collect();
                current_sorted.sort();
                existing_sorted
                    .iter()
                    .filter(|id| !current_sorted.contains(id))
                    .count()
                    + current_sorted
                        .iter()
                        .filter(|id| !existing_sorted.contains(id))
                        .count()
            };

            if Self::should_skip_update(existing_count, current_count, changed) {
                self.unassign(group_id, &selection.dropped).await;
                return GroupResult {
                    group_id,
                    success: true,
                    reason: Some("update_skipped".to_string()),
                };
            }
        }

        self.rate_limiter.check(group_id).await;

        let sources_text = prepare_sources_text(&selection.kept);
        let user = user_message(&sources_text);
        let analysis = match self.complete_with_retries(group_id, &user).await {
            Ok(a) => a,
            Err(message) => match classify(&message) {
                LlmErrorClass::ContextLengthExceeded if selection.kept.len() > MIN_SOURCES => {
                    warn!(group_id, "context length exceeded, retrying with 3 shortest sources");
                    let reduced = reduced_sources_text(&selection.kept);
                    let reduced_user = user_message(&reduced);
                    match self.llm.complete(SYSTEM_PROMPT, &reduced_user).await {
                        Ok(a) => a,
                        Err(_) => {
                            warn!(group_id, "reduced retry still failed, treating as rate limited");
                            self.rate_limiter.force_cooldown(2).await;
                            return GroupResult {
                                group_id,
                                success: false,
                                reason: Some("rate_limited".to_string()),
                            };
                        }
                    }
                }
                _ => return self.handle_llm_error(group_id, &message).await,
            },
        };

        self.unassign(group_id, &selection.dropped).await;
        self.update_neutral_scores(&members, &selection.kept, &analysis.source_ratings).await;

        let now = chrono::Utc::now();
        let source_ids: Vec<Uuid> = selection.kept.iter().map(|s| s.article_id).collect();
        let oldest_date = Self::oldest_member_date(&members, &source_ids, now);
        let (image_url, image_medium) =
            match select_most_neutral_image(&selection.kept, &analysis.source_ratings) {
                Some((url, medium)) => (Some(url), Some(medium)),
                None => (None, None),
            };

        let patch = GroupPatch {
            neutral_title: Some(analysis.neutral_title.clone()),
            neutral_description: Some(analysis.neutral_description.clone()),
            category: Some(analysis.category.clone()),
            relevance: Some(analysis.relevance),
            source_ids: Some(source_ids.clone()),
            date: Some(oldest_date),
            image_url: Some(image_url.clone()),
            image_medium: Some(image_medium.clone()),
        };

        let write_result = if matches!(classification, Classification::New) {
            self.store
                .put_group(&NeutralGroup {
                    group_id,
                    neutral_title: analysis.neutral_title,
                    neutral_description: analysis.neutral_description,
                    category: analysis.category,
                    relevance: analysis.relevance,
                    source_ids,
                    image_url,
                    image_medium,
                    date: oldest_date,
                    created_at: now,
                    updated_at: None,
                })
                .await
        } else {
            self.store.patch_group(group_id, patch).await
        };

        match write_result {
            Ok(()) => GroupResult {
                group_id,
                success: true,
                reason: None,
            },
            Err(e) => GroupResult {
                group_id,
                success: false,
                reason: Some(
                    PipelineError::StoreWriteFailure(e.to_string()).to_string(),
                ),
            },
        }
    }

    /// Calls the LLM, retrying transient ("other") errors locally up to 3
    /// attempts with 2/4/8s backoff. Rate-limit and context-length errors
    /// are returned immediately: they have their own handling one level up.
    async fn complete_with_retries(
        &self,
        group_id: i64,
        user: &str,
    ) -> Result<crate::prompt::NeutralAnalysis, String> {
        const BACKOFFS_SECS: [u64; 3] = [2, 4, 8];
        let mut last_err = String::new();
        for (attempt, backoff) in BACKOFFS_SECS.iter().enumerate() {
            match self.llm.complete(SYSTEM_PROMPT, user).await {
                Ok(a) => return Ok(a),
                Err(message) => {
                    if !matches!(classify(&message), LlmErrorClass::Other) {
                        return Err(message);
                    }
                    warn!(group_id, attempt, "transient LLM error, retrying");
                    last_err = message;
                    tokio::time::sleep(std::time::Duration::from_secs(*backoff)).await;
                }
            }
        }
        Err(last_err)
    }

    async fn handle_llm_error(&self, group_id: i64, message: &str) -> GroupResult {
        match classify(message) {
            LlmErrorClass::RateLimited => {
                warn!(group_id, "LLM rate limited, enforcing cooldown");
                self.rate_limiter.force_cooldown(2).await;
                GroupResult {
                    group_id,
                    success: false,
                    reason: Some("rate_limited".to_string()),
                }
            }
            LlmErrorClass::ContextLengthExceeded | LlmErrorClass::Other => GroupResult {
                group_id,
                success: false,
                reason: Some(
                    PipelineError::InvalidPayload {
                        group_id,
                        reason: message.to_string(),
                    }
                    .to_string(),
                ),
            },
        }
    }

    /// `NeutralGroup.date` is the oldest `pub_date` among the final kept
    /// members, not the most recent — falls back to `now` only if `kept_ids`
    /// somehow matches no member.
    fn oldest_member_date(
        members: &[Article],
        kept_ids: &[Uuid],
        now: chrono::DateTime<chrono::Utc>,
    ) -> chrono::DateTime<chrono::Utc> {
        members
            .iter()
            .filter(|a| kept_ids.contains(&a.article_id))
            .map(|a| a.pub_date)
            .min()
            .unwrap_or(now)
    }

    async fn unassign(&self, group_id: i64, article_ids: &[Uuid]) {
        for &article_id in article_ids {
            if let Err(e) = self.store.remove_source_from_group(group_id, article_id).await {
                warn!(group_id, %article_id, error = %e, "failed to unassign source from group");
            }
        }
    }

    /// Matches each `source_ratings` entry (by `source_medium`) to the kept
    /// source with that outlet's display name, and writes the rating as that
    /// article's `neutral_score` when it differs from the stored value.
    async fn update_neutral_scores(
        &self,
        members: &[Article],
        kept: &[CandidateSource],
        source_ratings: &[SourceRating],
    ) {
        for candidate in kept {
            let display_name = candidate.outlet.profile().display_name;
            let Some(rating) = source_ratings
                .iter()
                .find(|r| r.source_medium == display_name)
            else {
                continue;
            };

            let current = members
                .iter()
                .find(|a| a.article_id == candidate.article_id)
                .and_then(|a| a.neutral_score);

            if current == Some(rating.rating) {
                continue;
            }

            if let Err(e) = self
                .store
                .update_neutral_score(candidate.article_id, rating.rating)
                .await
            {
                warn!(
                    article_id = %candidate.article_id,
                    error = %e,
                    "failed to write neutral_score"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use neutralnews_common::Outlet;

    #[test]
    fn skip_requires_both_low_ratio_and_no_significant_jump() {
        // Small ratio, no threshold crossed: skip.
        assert!(Neutralizer::should_skip_update(5, 5, 1));
        // Ratio alone over threshold: never skip.
        assert!(!Neutralizer::should_skip_update(5, 6, 3));
        // Low ratio but a defined significant jump (4 -> 9 crosses 6): never skip.
        assert!(!Neutralizer::should_skip_update(4, 9, 1));
    }

    fn member(minutes_ago: i64) -> Article {
        let now = chrono::Utc::now();
        Article {
            article_id: Uuid::new_v4(),
            outlet: Outlet::ElPais,
            link: format!("https://example.com/{}", Uuid::new_v4()),
            title: "title".to_string(),
            raw_description: "description".to_string(),
            scraped_description: None,
            category: "sinCategoria".to_string(),
            image_url: None,
            pub_date: now - Duration::minutes(minutes_ago),
            created_at: now - Duration::minutes(minutes_ago),
            updated_at: None,
            group_id: None,
            embedding: None,
            neutral_score: None,
        }
    }

    #[test]
    fn oldest_member_date_picks_the_minimum_pub_date_among_kept_members() {
        let newest = member(1);
        let oldest = member(1000);
        let dropped = member(2000);
        let kept_ids = vec![newest.article_id, oldest.article_id];
        let now = chrono::Utc::now();

        let result = Neutralizer::oldest_member_date(
            &[newest.clone(), oldest.clone(), dropped],
            &kept_ids,
            now,
        );
        assert_eq!(result, oldest.pub_date);
        assert!(result < newest.pub_date);
    }

    #[test]
    fn oldest_member_date_falls_back_to_now_when_no_member_matches() {
        let now = chrono::Utc::now();
        let result = Neutralizer::oldest_member_date(&[member(5)], &[Uuid::new_v4()], now);
        assert_eq!(result, now);
    }
}
