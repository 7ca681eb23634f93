// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Hybrid Search Engine
//!
//! Runs the vector-similarity and fulltext queries concurrently, then hands
//! both result sets to the [`ScoreMerger`] for normalization, weighting and
//! ranking.
//!
//! Each channel fetches a candidate pool of `top_k * candidate_multiplier`
//! records (never fewer than `top_k`) so that records ranked low by one
//! channel but high by the other still reach the merger.

use std::sync::Arc;
use std::time::Duration;

use crate::application::within;
use crate::domain::config::{DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_STORE_TIMEOUT};
use crate::domain::repository::{RepositoryError, SkillStore};
use crate::domain::scoring::{ScoreMerger, SearchHit};
use crate::domain::skill::{validate_embedding, validate_unit_interval};

pub struct HybridSearchEngine {
    store: Arc<dyn SkillStore>,
    merger: ScoreMerger,
    candidate_multiplier: usize,
    timeout: Duration,
}

impl HybridSearchEngine {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self {
            store,
            merger: ScoreMerger::default(),
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_merger(mut self, merger: ScoreMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ranked skills for the query. A blank `query_text` searches by
    /// embedding alone.
    pub async fn hybrid_search(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, RepositoryError> {
        validate_embedding(query_embedding)?;
        validate_unit_interval("min_score", min_score)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let pool = top_k.saturating_mul(self.candidate_multiplier).max(top_k);
        let text = query_text.trim();

        let vector = within(
            self.timeout,
            "vector_query",
            self.store.vector_query(query_embedding, pool),
        );
        let keyword = async {
            if text.is_empty() {
                Ok(Vec::new())
            } else {
                within(self.timeout, "keyword_query", self.store.keyword_query(text, pool)).await
            }
        };
        let (vector_records, keyword_records) = tokio::try_join!(vector, keyword)?;

        tracing::debug!(
            "Hybrid search fetched {} vector and {} keyword candidates (pool {})",
            vector_records.len(),
            keyword_records.len(),
            pool
        );

        self.merger.merge(vector_records, keyword_records, min_score, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{IndexManager, SkillRepository};
    use crate::domain::scoring::FusionWeights;
    use crate::domain::skill::{NewSkill, Skill, SkillId, EMBEDDING_DIM};
    use crate::infrastructure::InMemorySkillStore;

    fn embedding(weights: &[(usize, f32)]) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        for &(axis, value) in weights {
            v[axis] = value;
        }
        v
    }

    async fn seed(
        store: &Arc<InMemorySkillStore>,
        title: &str,
        keywords: &[&str],
        emb: Vec<f32>,
    ) -> Skill {
        SkillRepository::new(store.clone())
            .create(
                Skill::create_new(NewSkill {
                    title: title.to_string(),
                    problem: format!("{title} problem"),
                    resolution: "See runbook".to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    embedding: emb,
                    ..Default::default()
                })
                .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn initialized_store() -> Arc<InMemorySkillStore> {
        let store = Arc::new(InMemorySkillStore::new());
        IndexManager::new(store.clone()).initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_vector_only_search_ranks_by_similarity() {
        let store = initialized_store().await;
        let close = seed(&store, "Test: close", &[], embedding(&[(0, 1.0)])).await;
        let far = seed(&store, "Test: far", &[], embedding(&[(0, 0.5), (1, 1.0)])).await;

        let engine = HybridSearchEngine::new(store);
        let hits = engine.hybrid_search(&embedding(&[(0, 1.0)]), "", 5, 0.0).await.unwrap();

        assert_eq!(hits[0].skill.skill_id, close.skill_id);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].skill.skill_id, far.skill_id);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_keyword_channel_boosts_matching_skill() {
        let store = initialized_store().await;
        let query = embedding(&[(0, 1.0)]);
        let plain = seed(
            &store,
            "Test: alpha",
            &["printer"],
            embedding(&[(0, 1.0), (1, 0.2)]),
        )
        .await;
        let matching = seed(
            &store,
            "Test: bravo",
            &["vpn", "tunnel"],
            embedding(&[(0, 1.0), (1, 0.2)]),
        )
        .await;

        let engine = HybridSearchEngine::new(store);
        let hits = engine.hybrid_search(&query, "vpn tunnel", 5, 0.0).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].skill.skill_id, matching.skill_id);
        assert_eq!(hits[1].skill.skill_id, plain.skill_id);
        // Only one keyword record, so it normalizes to 1.0
        assert!((hits[0].score - (hits[1].score + 0.3)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_min_score_and_top_k() {
        let store = initialized_store().await;
        for axis in 0..4 {
            seed(
                &store,
                &format!("Test: {axis}"),
                &[],
                embedding(&[(0, 1.0), (1, axis as f32)]),
            )
            .await;
        }

        let engine = HybridSearchEngine::new(store);
        let hits = engine.hybrid_search(&embedding(&[(0, 1.0)]), "", 2, 0.0).await.unwrap();
        assert_eq!(hits.len(), 2);

        let hits = engine.hybrid_search(&embedding(&[(0, 1.0)]), "", 10, 0.6).await.unwrap();
        assert!(hits.iter().all(|h| h.score >= 0.6));
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_stored_record_does_not_fail_search() {
        let store = initialized_store().await;
        let valid = seed(&store, "Test: valid", &[], embedding(&[(0, 1.0)])).await;

        let mut broken = valid.clone();
        broken.skill_id = SkillId::generate();
        broken.embedding.truncate(384);
        store.insert(&broken).await.unwrap();

        let engine = HybridSearchEngine::new(store);
        let hits = engine.hybrid_search(&embedding(&[(0, 1.0)]), "", 5, 0.0).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].skill.skill_id, valid.skill_id);
    }

    #[tokio::test]
    async fn test_zero_top_k_skips_store() {
        // Uninitialized store: any query would fail
        let engine = HybridSearchEngine::new(Arc::new(InMemorySkillStore::new()));
        let hits = engine.hybrid_search(&embedding(&[(0, 1.0)]), "vpn", 0, 0.0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let engine = HybridSearchEngine::new(Arc::new(InMemorySkillStore::new()));
        let err = engine.hybrid_search(&[1.0; 3], "", 5, 0.0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_index_surfaces_database_error() {
        let engine = HybridSearchEngine::new(Arc::new(InMemorySkillStore::new()));
        let err = engine.hybrid_search(&embedding(&[(0, 1.0)]), "", 5, 0.0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[tokio::test]
    async fn test_custom_weights() {
        let store = initialized_store().await;
        let skill = seed(&store, "Test: weights", &["vpn"], embedding(&[(0, 1.0)])).await;

        let engine = HybridSearchEngine::new(store)
            .with_merger(ScoreMerger::new(FusionWeights::new(0.5, 0.5).unwrap()))
            .with_candidate_multiplier(3);
        let hits = engine.hybrid_search(&embedding(&[(1, 1.0)]), "vpn", 5, 0.0).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].skill.skill_id, skill.skill_id);
        assert!((hits[0].score - 0.5).abs() < 1e-6);
    }
}
