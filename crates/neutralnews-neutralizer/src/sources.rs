use chrono::{DateTime, Utc};
use neutralnews_common::tunables::{MIN_SOURCES, SOURCES_LIMIT};
use neutralnews_common::{Article, Outlet};
use uuid::Uuid;

/// A source considered for one neutralization call. Carries only what the
/// prompt and dedup logic need; built from the group's member `Article`s.
#[derive(Debug, Clone)]
pub struct CandidateSource {
    pub article_id: Uuid,
    pub outlet: Outlet,
    pub title: String,
    pub scraped_description: String,
    pub effective_date: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl CandidateSource {
    /// Drops the article unless it has everything the prompt needs: a
    /// title, a non-empty scraped/raw description, and an outlet. `None`
    /// here means "missing a required field", not "empty string allowed".
    pub fn from_article(article: &Article) -> Option<Self> {
        let scraped_description = article.best_description();
        if article.title.is_empty() || scraped_description.is_empty() {
            return None;
        }
        Some(CandidateSource {
            article_id: article.article_id,
            outlet: article.outlet,
            title: article.title.clone(),
            scraped_description: scraped_description.to_string(),
            effective_date: article.pub_date.max(article.created_at),
            image_url: article.image_url.clone(),
        })
    }
}

pub struct SelectionResult {
    pub kept: Vec<CandidateSource>,
    /// Article ids dropped during selection: per-outlet dedup losers and
    /// anything past the `SOURCES_LIMIT` cutoff. These must be unassigned
    /// from the group in the store.
    pub dropped: Vec<Uuid>,
}

/// Drops sources missing required fields, then keeps at most one source per
/// outlet (the most recently published), then caps the result at
/// `SOURCES_LIMIT`. Returns `None` if fewer than `MIN_SOURCES` remain after
/// all three steps.
pub fn select_sources(articles: &[Article]) -> Option<SelectionResult> {
    let valid: Vec<CandidateSource> = articles.iter().filter_map(CandidateSource::from_article).collect();
    if valid.len() < MIN_SOURCES {
        return None;
    }

    let mut dropped = Vec::new();
    let mut by_outlet: std::collections::HashMap<Outlet, CandidateSource> =
        std::collections::HashMap::new();

    for source in valid {
        match by_outlet.get(&source.outlet) {
            Some(existing) if existing.effective_date >= source.effective_date => {
                dropped.push(source.article_id);
            }
            Some(existing) => {
                dropped.push(existing.article_id);
                by_outlet.insert(source.outlet, source);
            }
            None => {
                by_outlet.insert(source.outlet, source);
            }
        }
    }

    let mut kept: Vec<CandidateSource> = by_outlet.into_values().collect();
    kept.sort_by_key(|s| std::cmp::Reverse(s.effective_date));

    if kept.len() > SOURCES_LIMIT {
        for excess in kept.split_off(SOURCES_LIMIT) {
            dropped.push(excess.article_id);
        }
    }

    if kept.len() < MIN_SOURCES {
        dropped.extend(kept.iter().map(|s| s.article_id));
        return None;
    }

    Some(SelectionResult { kept, dropped })
}

/// Builds the per-source prompt block, truncating any description that's
/// more than 3x the group's average length (and over 10,000 chars) down to
/// roughly twice the average.
pub fn prepare_sources_text(sources: &[CandidateSource]) -> String {
    let avg_len = sources
        .iter()
        .map(|s| s.scraped_description.chars().count())
        .sum::<usize>() as f64
        / sources.len().max(1) as f64;

    let mut text = String::new();
    for (i, source) in sources.iter().enumerate() {
        let desc_len = source.scraped_description.chars().count();
        let description = if desc_len as f64 > avg_len * 3.0 && desc_len > 10_000 {
            let truncated_len = ((avg_len * 2.0).max(10_000.0)) as usize;
            let truncated: String = source.scraped_description.chars().take(truncated_len).collect();
            format!("{truncated}... [truncado por longitud excesiva]")
        } else {
            source.scraped_description.clone()
        };

        text.push_str(&format!(
            "Fuente {}: {}\nTitular: {}\nDescripción: {}\n\n",
            i + 1,
            source.outlet.profile().display_name,
            source.title,
            description
        ));
    }
    text
}

/// Last-resort payload after a context-length error: the 3 shortest sources
/// (by description length), truncated aggressively (5000/3000/2000 chars
/// for the 1st/2nd/3rd) rather than by the usual outlier rule.
pub fn reduced_sources_text(sources: &[CandidateSource]) -> String {
    let mut by_length: Vec<&CandidateSource> = sources.iter().collect();
    by_length.sort_by_key(|s| s.scraped_description.chars().count());
    by_length.truncate(3);

    let max_lengths = [5000usize, 3000, 2000];
    let mut text = String::new();
    for (i, source) in by_length.into_iter().enumerate() {
        let max_length = max_lengths[i.min(2)];
        let desc_len = source.scraped_description.chars().count();
        let description = if desc_len > max_length {
            let truncated: String = source.scraped_description.chars().take(max_length).collect();
            format!("{truncated}... [truncado por longitud excesiva]")
        } else {
            source.scraped_description.clone()
        };
        text.push_str(&format!(
            "Fuente {}: {}\nTitular: {}\nDescripción: {}\n\n",
            i + 1,
            source.outlet.profile().display_name,
            source.title,
            description
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn source(outlet: Outlet, minutes_ago: i64) -> CandidateSource {
        CandidateSource {
            article_id: Uuid::new_v4(),
            outlet,
            title: "title".to_string(),
            scraped_description: "description".to_string(),
            effective_date: Utc::now() - Duration::minutes(minutes_ago),
            image_url: None,
        }
    }

    fn article(outlet: Outlet, minutes_ago: i64) -> Article {
        let now = Utc::now();
        Article {
            article_id: Uuid::new_v4(),
            outlet,
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
    fn keeps_most_recent_source_per_outlet_and_drops_the_rest() {
        let older = article(Outlet::ElPais, 100);
        let newer = article(Outlet::ElPais, 1);
        let third_outlet = article(Outlet::ElMundo, 5);
        let newer_id = newer.article_id;
        let older_id = older.article_id;

        let result = select_sources(&[older, newer, third_outlet]).unwrap();
        assert_eq!(result.kept.len(), 2);
        assert!(result.kept.iter().any(|s| s.article_id == newer_id));
        assert!(!result.kept.iter().any(|s| s.article_id == older_id));
        assert!(result.dropped.contains(&older_id));
    }

    #[test]
    fn returns_none_when_fewer_than_min_sources_survive_dedup() {
        let a = article(Outlet::ElPais, 10);
        let b = article(Outlet::ElPais, 5);
        assert!(select_sources(&[a, b]).is_none());
    }

    #[test]
    fn reduced_text_keeps_only_the_three_shortest_sources() {
        let sources: Vec<CandidateSource> = [
            (Outlet::ElPais, 1000),
            (Outlet::ElMundo, 100),
            (Outlet::Abc, 9000),
            (Outlet::Cope, 50),
        ]
        .into_iter()
        .map(|(outlet, len)| CandidateSource {
            scraped_description: "x".repeat(len),
            ..source(outlet, 0)
        })
        .collect();

        let text = reduced_sources_text(&sources);
        assert_eq!(text.matches("Fuente").count(), 3);
        assert!(!text.contains(Outlet::Abc.profile().display_name));
    }

    #[test]
    fn truncates_outlier_length_descriptions() {
        let short = CandidateSource {
            scraped_description: "a".repeat(100),
            ..source(Outlet::ElPais, 0)
        };
        let long = CandidateSource {
            outlet: Outlet::ElMundo,
            scraped_description: "b".repeat(20_000),
            ..source(Outlet::ElMundo, 0)
        };
        let text = prepare_sources_text(&[short, long]);
        assert!(text.contains("truncado"));
    }
}
