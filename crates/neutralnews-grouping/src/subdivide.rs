use std::collections::HashSet;

use neutralnews_common::tunables::{MIN_SUBDIVISION_SIZE, SUBDIV_SIM, TARGET_SUBGROUP_SIZE};

use crate::kmeans::kmeans;
use crate::similarity::mean_pairwise_similarity;

/// A cluster member fed into k-means subdivision. `idx` points back into the
/// current batch's item slice; members loaded only from the store (existing
/// group members not present in this batch) carry `idx: None` and
/// contribute to the similarity/k-means computation but never get their
/// group reassigned here — they only move when they themselves pass
/// through grouping as reference items in a later run.
pub struct SubdivisionMember {
    pub idx: Option<usize>,
    pub embedding: Vec<f32>,
}

/// Left-pads `parent_id`'s decimal digits to 7, e.g. 42 -> 4200000. Bumps
/// past any id already in `used_ids` within the `[base, base+num_subgroups)`
/// range to avoid collisions with ids minted earlier in the same run.
pub fn derive_base_id(parent_id: i64, num_subgroups: usize, used_ids: &HashSet<i64>) -> i64 {
    let digits = parent_id.unsigned_abs().to_string();
    let mut base_id = if digits.len() >= 7 {
        parent_id
    } else {
        let padded = format!("{}{}", digits, "0".repeat(7 - digits.len()));
        padded.parse().unwrap_or(7_777_777)
    };

    let target_end = base_id + num_subgroups as i64;
    if let Some(max_conflict) = used_ids
        .iter()
        .copied()
        .filter(|&id| id >= base_id && id < target_end)
        .max()
    {
        base_id = base_id.max(max_conflict + 1);
    }
    base_id
}

/// Runs k-means subdivision over `members`, writing accepted sub-cluster ids
/// into `assigned_group` for batch members. Returns the ids actually
/// created; an empty result means no sub-cluster passed the similarity gate
/// and the caller should fall back to `parent_id` for its batch members.
pub fn subdivide(
    members: &[SubdivisionMember],
    parent_id: i64,
    used_ids: &mut HashSet<i64>,
    assigned_group: &mut [Option<i64>],
) -> Vec<i64> {
    if members.len() < MIN_SUBDIVISION_SIZE {
        return vec![];
    }

    let embeddings: Vec<Vec<f32>> = members.iter().map(|m| m.embedding.clone()).collect();
    let num_subgroups = (members.len() / TARGET_SUBGROUP_SIZE).max(2).min(5);
    let labels = kmeans(&embeddings, num_subgroups);
    let base_id = derive_base_id(parent_id, num_subgroups, used_ids);

    let mut created = Vec::new();
    for subtopic in 0..num_subgroups {
        let member_indices: Vec<usize> = (0..members.len())
            .filter(|&i| labels[i] == subtopic)
            .collect();
        if member_indices.len() < 2 {
            continue;
        }

        let cluster_embeddings: Vec<Vec<f32>> =
            member_indices.iter().map(|&i| embeddings[i].clone()).collect();
        let similarity = mean_pairwise_similarity(&cluster_embeddings);
        if similarity < SUBDIV_SIM {
            continue;
        }

        let new_group_id = base_id + subtopic as i64;
        used_ids.insert(new_group_id);
        for &i in &member_indices {
            if let Some(batch_idx) = members[i].idx {
                assigned_group[batch_idx] = Some(new_group_id);
            }
        }
        created.push(new_group_id);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_ids_to_seven_digits() {
        let used = HashSet::new();
        assert_eq!(derive_base_id(42, 2, &used), 4_200_000);
        assert_eq!(derive_base_id(123, 3, &used), 1_230_000);
    }

    #[test]
    fn leaves_already_long_ids_untouched() {
        let used = HashSet::new();
        assert_eq!(derive_base_id(4_200_000, 2, &used), 4_200_000);
    }

    #[test]
    fn bumps_past_conflicting_ids() {
        let mut used = HashSet::new();
        used.insert(4_200_000);
        used.insert(4_200_001);
        assert_eq!(derive_base_id(42, 2, &used), 4_200_002);
    }
}
