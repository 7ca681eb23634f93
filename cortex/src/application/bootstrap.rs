// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process bootstrap: builds every service over one shared store from a
//! validated [`CortexConfig`].

use std::sync::Arc;

use crate::application::store_factory::{create_skill_store, StoreHandle};
use crate::application::{
    DuplicateDetector, HybridSearchEngine, IndexManager, InitializationReport, SkillRepository,
};
use crate::domain::config::CortexConfig;
use crate::domain::repository::{RepositoryError, SkillStore};
use crate::domain::scoring::ScoreMerger;

pub struct SkillCortex {
    pub repository: SkillRepository,
    pub duplicates: DuplicateDetector,
    pub search: HybridSearchEngine,
    pub indexes: IndexManager,
    handle: StoreHandle,
}

impl SkillCortex {
    pub fn from_config(config: &CortexConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let handle = create_skill_store(&config.store)?;
        Self::assemble(handle, config)
    }

    /// Wire the services over an existing store.
    pub fn with_store(store: Arc<dyn SkillStore>, config: &CortexConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Self::assemble(
            StoreHandle {
                store,
                connections: None,
            },
            config,
        )
    }

    fn assemble(handle: StoreHandle, config: &CortexConfig) -> anyhow::Result<Self> {
        let store = handle.store.clone();
        let timeout = config.store.timeout;
        let merger = ScoreMerger::new(config.search.fusion_weights()?);

        Ok(Self {
            repository: SkillRepository::new(store.clone()).with_timeout(timeout),
            duplicates: DuplicateDetector::new(store.clone())
                .with_timeout(timeout)
                .with_default_threshold(config.duplicate.threshold),
            search: HybridSearchEngine::new(store.clone())
                .with_merger(merger)
                .with_candidate_multiplier(config.search.candidate_multiplier)
                .with_timeout(timeout),
            indexes: IndexManager::new(store).with_timeout(timeout),
            handle,
        })
    }

    pub async fn initialize(&self) -> Result<InitializationReport, RepositoryError> {
        self.indexes.initialize().await
    }

    pub fn store(&self) -> Arc<dyn SkillStore> {
        self.handle.store.clone()
    }

    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skill::{NewSkill, Skill, EMBEDDING_DIM};

    #[tokio::test]
    async fn test_bootstrap_from_default_config() {
        let cortex = SkillCortex::from_config(&CortexConfig::default()).unwrap();
        cortex.initialize().await.unwrap();

        let mut embedding = vec![0.0; EMBEDDING_DIM];
        embedding[7] = 1.0;
        let skill = cortex
            .repository
            .create(
                Skill::create_new(NewSkill {
                    title: "Test: bootstrap".to_string(),
                    problem: "Email stuck in outbox".to_string(),
                    resolution: "Clear the outbox cache".to_string(),
                    keywords: vec!["email".to_string(), "outbox".to_string()],
                    embedding: embedding.clone(),
                    ..Default::default()
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let dup = cortex.duplicates.find_duplicate_default(&embedding).await.unwrap();
        assert_eq!(dup.map(|s| s.skill_id), Some(skill.skill_id.clone()));

        let hits = cortex.search.hybrid_search(&embedding, "outbox", 3, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);

        cortex.shutdown().await;
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CortexConfig::default();
        config.search.keyword_weight = 0.9;
        assert!(SkillCortex::from_config(&config).is_err());
    }
}
