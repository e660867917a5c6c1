use std::collections::HashSet;

use neutralnews_common::NeutralGroup;
use uuid::Uuid;

/// Union of `source_ids` across every group still active at the retention
/// cutoff (its `date` is no older than the window). Any article id in this
/// set survives the sweep regardless of the article's own age.
pub fn protected_article_ids(active_groups: &[NeutralGroup]) -> HashSet<Uuid> {
    active_groups
        .iter()
        .flat_map(|g| g.source_ids.iter().copied())
        .collect()
}

/// Candidates minus the protected set, in original order.
pub fn articles_to_delete(candidates: Vec<Uuid>, protected: &HashSet<Uuid>) -> Vec<Uuid> {
    candidates
        .into_iter()
        .filter(|id| !protected.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn group(source_ids: Vec<Uuid>) -> NeutralGroup {
        let now = Utc::now();
        NeutralGroup {
            group_id: 1,
            neutral_title: "t".to_string(),
            neutral_description: "d".to_string(),
            category: "sinCategoria".to_string(),
            relevance: 5,
            source_ids,
            image_url: None,
            image_medium: None,
            date: now,
            created_at: now,
            updated_at: None,
        }
    }

    #[test]
    fn protected_set_is_the_union_of_active_group_sources() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let groups = vec![group(vec![a, b]), group(vec![b, c])];
        let protected = protected_article_ids(&groups);
        assert_eq!(protected.len(), 3);
        assert!(protected.contains(&a) && protected.contains(&b) && protected.contains(&c));
    }

    #[test]
    fn referenced_candidates_are_excluded_from_deletion() {
        let protected_id = Uuid::new_v4();
        let unreferenced_id = Uuid::new_v4();
        let protected = HashSet::from([protected_id]);
        let to_delete = articles_to_delete(vec![protected_id, unreferenced_id], &protected);
        assert_eq!(to_delete, vec![unreferenced_id]);
    }
}
