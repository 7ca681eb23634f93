// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Index Manager
//!
//! Bootstrap-time provisioning of the store schema: the skill-id uniqueness
//! constraint, the cosine vector index, the fulltext index and any data
//! migrations the store's ledger has not recorded yet. Every step is
//! idempotent, so `initialize` is safe to run on every process start.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::application::within;
use crate::domain::config::DEFAULT_STORE_TIMEOUT;
use crate::domain::migration::MIGRATIONS;
use crate::domain::repository::{RepositoryError, SkillStore};
use crate::domain::skill::EMBEDDING_DIM;

/// What a call to [`IndexManager::initialize`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitializationReport {
    /// Migrations applied by this call, in order.
    pub applied: Vec<String>,
    /// Migrations the ledger already recorded.
    pub skipped: Vec<String>,
}

pub struct IndexManager {
    store: Arc<dyn SkillStore>,
    timeout: Duration,
}

impl IndexManager {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn initialize(&self) -> Result<InitializationReport, RepositoryError> {
        within(self.timeout, "ensure_constraints", self.store.ensure_constraints()).await?;
        within(
            self.timeout,
            "ensure_vector_index",
            self.store.ensure_vector_index(EMBEDDING_DIM),
        )
        .await?;
        within(self.timeout, "ensure_fulltext_index", self.store.ensure_fulltext_index()).await?;

        let recorded: HashSet<String> =
            within(self.timeout, "applied_migrations", self.store.applied_migrations())
                .await?
                .into_iter()
                .collect();

        let mut report = InitializationReport::default();
        for migration in MIGRATIONS {
            let id = migration.id().to_string();
            if recorded.contains(&id) {
                report.skipped.push(id);
                continue;
            }

            tracing::info!("Applying migration {}: {}", id, migration.description());
            within(self.timeout, "apply_migration", self.store.apply_migration(*migration)).await?;
            report.applied.push(id);
        }

        tracing::info!(
            "Store initialized ({} migrations applied, {} already recorded)",
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SkillRepository;
    use crate::domain::skill::{NewSkill, Skill};
    use crate::infrastructure::InMemorySkillStore;

    #[tokio::test]
    async fn test_initialize_provisions_indexes_and_migrations() {
        let store = Arc::new(InMemorySkillStore::new());
        let report = IndexManager::new(store.clone()).initialize().await.unwrap();

        assert_eq!(report.applied, vec!["0001_keyword_text", "0002_usage_defaults"]);
        assert!(report.skipped.is_empty());
        assert_eq!(store.vector_index_dimensions().await, Some(EMBEDDING_DIM));
        assert!(store.has_fulltext_index().await);
        assert!(store.has_unique_constraint().await);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = Arc::new(InMemorySkillStore::new());
        let repo = SkillRepository::new(store.clone());
        let manager = IndexManager::new(store.clone());

        manager.initialize().await.unwrap();
        let skill = repo
            .create(
                Skill::create_new(NewSkill {
                    title: "Test: idempotent".to_string(),
                    problem: "p".to_string(),
                    resolution: "r".to_string(),
                    embedding: vec![0.5; EMBEDDING_DIM],
                    ..Default::default()
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let second = manager.initialize().await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped.len(), MIGRATIONS.len());

        let ledger = store.ledger().await;
        assert_eq!(ledger.len(), MIGRATIONS.len());
        assert_eq!(repo.get(&skill.skill_id).await.unwrap(), Some(skill));
    }
}
