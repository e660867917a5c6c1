use std::sync::Arc;

use neutralnews_common::tunables::{EMBED_BATCH_SIZE, EMBED_PERSIST_BATCH};
use neutralnews_common::Article;
use neutralnews_store::ArticleStore;
use tracing::warn;
use uuid::Uuid;

use crate::provider::EmbedProvider;

/// Unit-normalizes a vector in place; zero vectors are left alone (the
/// grouping engine treats an exact zero vector as "no useful direction" and
/// it sorts cleanly into the outlier class on its own).
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn input_text(article: &Article) -> String {
    format!("{} {}", article.title, article.best_description())
}

/// Given a candidate set, computes embeddings for anything still missing
/// one. Embeddings are encoded in micro-batches of `EMBED_BATCH_SIZE`, then
/// persisted re-batched at `EMBED_PERSIST_BATCH` (store does the
/// re-batching; this stage just hands it everything new at once). Items
/// that still lack an embedding after a failed encode are assigned the
/// zero vector so they can still participate (as likely outliers).
pub struct EmbeddingStage {
    provider: Arc<dyn EmbedProvider>,
    dimension_hint: usize,
}

impl EmbeddingStage {
    pub fn new(provider: Arc<dyn EmbedProvider>, dimension_hint: usize) -> Self {
        Self {
            provider,
            dimension_hint,
        }
    }

    /// Mutates `articles` in place, filling in `embedding` for any article
    /// that didn't already have one, and persists the new vectors via
    /// `store`.
    pub async fn run(&self, articles: &mut [Article], store: &ArticleStore) -> anyhow::Result<()> {
        let needs_embedding: Vec<usize> = articles
            .iter()
            .enumerate()
            .filter(|(_, a)| a.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if needs_embedding.is_empty() {
            return Ok(());
        }

        let mut computed: Vec<(Uuid, Vec<f32>)> = Vec::with_capacity(needs_embedding.len());

        for chunk in needs_embedding.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = chunk.iter().map(|&i| input_text(&articles[i])).collect();

            match self.provider.encode(&texts).await {
                Ok(vectors) if vectors.len() == chunk.len() => {
                    for (&idx, mut vector) in chunk.iter().zip(vectors) {
                        normalize(&mut vector);
                        articles[idx].embedding = Some(vector.clone());
                        computed.push((articles[idx].article_id, vector));
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = chunk.len(),
                        got = vectors.len(),
                        "embedding provider returned mismatched batch size, falling back to zero vectors"
                    );
                    self.assign_zero_vectors(articles, chunk, &mut computed);
                }
                Err(e) => {
                    warn!(error = %e, batch_size = chunk.len(), "embedding batch failed, falling back to zero vectors");
                    self.assign_zero_vectors(articles, chunk, &mut computed);
                }
            }
        }

        store.put_embeddings_batch(&computed).await?;
        Ok(())
    }

    fn assign_zero_vectors(
        &self,
        articles: &mut [Article],
        indices: &[usize],
        computed: &mut Vec<(Uuid, Vec<f32>)>,
    ) {
        for &idx in indices {
            let zero = vec![0.0f32; self.dimension_hint];
            articles[idx].embedding = Some(zero.clone());
            computed.push((articles[idx].article_id, zero));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
