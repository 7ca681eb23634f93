// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Skill Repository
//!
//! Versioned CRUD over [`Skill`] records.
//!
//! ## Optimistic concurrency
//!
//! `update` and `record_usage` are read-modify-write cycles closed by a
//! conditional write: the store commits the new record only if the stored
//! `version` still equals the version that was read. If another writer got
//! there first the call fails with [`RepositoryError::Conflict`]; nothing is
//! retried here, the caller decides whether to re-read and try again.

use std::sync::Arc;
use std::time::Duration;

use crate::application::within;
use crate::domain::config::DEFAULT_STORE_TIMEOUT;
use crate::domain::repository::{CommitOutcome, RepositoryError, SkillStore};
use crate::domain::skill::{Skill, SkillId, SkillUpdate};

pub struct SkillRepository {
    store: Arc<dyn SkillStore>,
    timeout: Duration,
}

impl SkillRepository {
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

    /// Persist a new skill and return it unchanged.
    pub async fn create(&self, skill: Skill) -> Result<Skill, RepositoryError> {
        skill.validate()?;
        within(self.timeout, "insert", self.store.insert(&skill)).await?;
        tracing::info!("Created skill {} ({})", skill.skill_id, skill.title);
        Ok(skill)
    }

    pub async fn get(&self, id: &SkillId) -> Result<Option<Skill>, RepositoryError> {
        within(self.timeout, "fetch", self.store.fetch(id))
            .await?
            .map(|props| props.into_skill())
            .transpose()
    }

    /// Apply the present fields of `changes`, bumping `version` by one.
    pub async fn update(
        &self,
        id: &SkillId,
        changes: SkillUpdate,
    ) -> Result<Skill, RepositoryError> {
        changes.validate()?;
        let current = self.load_existing(id).await?;
        let read_version = current.version;

        if let Some(expected) = changes.expected_version {
            if expected != read_version {
                return Err(RepositoryError::Conflict(format!(
                    "skill {id} is at version {read_version}, expected {expected}"
                )));
            }
        }

        let mut next = current;
        next.apply(changes);
        self.commit(next, read_version).await
    }

    /// Count one use of the skill through the versioned commit path.
    pub async fn record_usage(
        &self,
        id: &SkillId,
        confirmed: bool,
    ) -> Result<Skill, RepositoryError> {
        let mut skill = self.load_existing(id).await?;
        let read_version = skill.version;
        skill.record_usage(confirmed);
        self.commit(skill, read_version).await
    }

    pub async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        if within(self.timeout, "remove", self.store.remove(id)).await? {
            tracing::info!("Deleted skill {}", id);
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("skill {id}")))
        }
    }

    /// Delete every skill whose title starts with `prefix`.
    pub async fn purge_by_title_prefix(&self, prefix: &str) -> Result<usize, RepositoryError> {
        if prefix.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "purge prefix must not be empty".to_string(),
            ));
        }
        let removed = within(
            self.timeout,
            "remove_by_title_prefix",
            self.store.remove_by_title_prefix(prefix),
        )
        .await?;
        tracing::info!("Purged {} skills with title prefix {:?}", removed, prefix);
        Ok(removed)
    }

    pub async fn count(&self) -> Result<usize, RepositoryError> {
        within(self.timeout, "count", self.store.count()).await
    }

    async fn load_existing(&self, id: &SkillId) -> Result<Skill, RepositoryError> {
        self.get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("skill {id}")))
    }

    async fn commit(&self, skill: Skill, read_version: u64) -> Result<Skill, RepositoryError> {
        let outcome = within(
            self.timeout,
            "commit_if_version",
            self.store.commit_if_version(&skill, read_version),
        )
        .await?;

        match outcome {
            CommitOutcome::Committed => {
                tracing::debug!("Committed skill {} at version {}", skill.skill_id, skill.version);
                Ok(skill)
            }
            CommitOutcome::Missing => Err(RepositoryError::NotFound(format!(
                "skill {} was deleted during update",
                skill.skill_id
            ))),
            CommitOutcome::Stale { current_version } => {
                tracing::warn!(
                    "Lost update on skill {}: read version {}, store now at {}",
                    skill.skill_id,
                    read_version,
                    current_version
                );
                Err(RepositoryError::Conflict(format!(
                    "skill {} was modified concurrently (read version {}, now {})",
                    skill.skill_id, read_version, current_version
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skill::{NewSkill, EMBEDDING_DIM};
    use crate::infrastructure::InMemorySkillStore;

    fn embedding(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[axis] = 1.0;
        v
    }

    fn new_skill(title: &str) -> Skill {
        Skill::create_new(NewSkill {
            title: title.to_string(),
            problem: "VPN drops every few minutes".to_string(),
            resolution: "1. Update the client\n2. Disable IPv6".to_string(),
            keywords: vec!["vpn".to_string(), "network".to_string()],
            embedding: embedding(1),
            product_area: "network".to_string(),
            issue_type: "connectivity".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn repository() -> SkillRepository {
        SkillRepository::new(Arc::new(InMemorySkillStore::new()))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        let found = repo.get(&skill.skill_id).await.unwrap().unwrap();
        assert_eq!(found, skill);
        assert_eq!(found.version, 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let repo = repository();
        assert!(repo.get(&SkillId::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_existing_id_conflicts() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        let err = repo.create(skill).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_dimension() {
        let repo = repository();
        let mut skill = new_skill("Test: vpn");
        skill.embedding.truncate(10);

        let err = repo.create(skill).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_increments_version_and_keeps_other_fields() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        let updated = repo
            .update(
                &skill.skill_id,
                SkillUpdate {
                    resolution: Some("Reinstall the client".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.resolution, "Reinstall the client");
        assert_eq!(updated.title, skill.title);
        assert_eq!(updated.embedding, skill.embedding);
        assert_eq!(updated.created_at, skill.created_at);
        assert!(updated.updated_at >= skill.updated_at);

        let stored = repo.get(&skill.skill_id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let repo = repository();
        let err = repo
            .update(&SkillId::from("nonexistent-id"), SkillUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_with_stale_expected_version_conflicts() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        let first = SkillUpdate {
            confidence: Some(0.8),
            expected_version: Some(1),
            ..Default::default()
        };
        repo.update(&skill.skill_id, first.clone()).await.unwrap();

        let err = repo.update(&skill.skill_id, first).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = repo.get(&skill.skill_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_updates_one_wins() {
        let store = Arc::new(InMemorySkillStore::new().with_latency(Duration::from_millis(20)));
        let repo = SkillRepository::new(store);
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        let a = repo.update(
            &skill.skill_id,
            SkillUpdate {
                title: Some("Test: vpn (a)".to_string()),
                ..Default::default()
            },
        );
        let b = repo.update(
            &skill.skill_id,
            SkillUpdate {
                title: Some("Test: vpn (b)".to_string()),
                ..Default::default()
            },
        );
        let (a, b) = tokio::join!(a, b);

        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(loser, RepositoryError::Conflict(_)));

        let stored = repo.get(&skill.skill_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_record_usage() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        repo.record_usage(&skill.skill_id, false).await.unwrap();
        let used = repo.record_usage(&skill.skill_id, true).await.unwrap();

        assert_eq!(used.times_used, 2);
        assert_eq!(used.times_confirmed, 1);
        assert_eq!(used.version, 3);

        let err = repo.record_usage(&SkillId::from("missing"), true).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repository();
        let skill = repo.create(new_skill("Test: vpn")).await.unwrap();

        repo.delete(&skill.skill_id).await.unwrap();
        assert!(repo.get(&skill.skill_id).await.unwrap().is_none());

        let err = repo.delete(&skill.skill_id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_purge_by_title_prefix() {
        let repo = repository();
        repo.create(new_skill("Test: one")).await.unwrap();
        repo.create(new_skill("Test: two")).await.unwrap();
        let keep = repo.create(new_skill("Production skill")).await.unwrap();

        assert_eq!(repo.purge_by_title_prefix("Test: ").await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get(&keep.skill_id).await.unwrap().is_some());

        let err = repo.purge_by_title_prefix("  ").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_slow_store_times_out_as_transient() {
        let store = Arc::new(InMemorySkillStore::new().with_latency(Duration::from_millis(200)));
        let repo = SkillRepository::new(store).with_timeout(Duration::from_millis(20));

        let err = repo.count().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Transient(_)));
        assert!(err.is_retryable());
    }
}
