// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Duplicate Detector
//!
//! Advisory nearest-neighbour check run before authoring a new skill. The
//! decision compares the cosine similarity between the query and the nearest
//! stored embedding against a threshold; the similarity is recomputed locally
//! because stores rescale it differently (Neo4j reports `(1 + cos) / 2`).
//! Never blocks or rejects a write.

use std::sync::Arc;
use std::time::Duration;

use crate::application::within;
use crate::domain::config::{DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_STORE_TIMEOUT};
use crate::domain::repository::{RepositoryError, SkillStore};
use crate::domain::scoring::cosine_similarity;
use crate::domain::skill::{validate_embedding, validate_unit_interval, Skill};

pub struct DuplicateDetector {
    store: Arc<dyn SkillStore>,
    timeout: Duration,
    default_threshold: f64,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
            default_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    /// Nearest existing skill whose cosine similarity to `embedding` is at
    /// least `threshold`, if any.
    pub async fn find_duplicate(
        &self,
        embedding: &[f32],
        threshold: f64,
    ) -> Result<Option<Skill>, RepositoryError> {
        validate_embedding(embedding)?;
        validate_unit_interval("threshold", threshold)?;

        let nearest = within(self.timeout, "vector_query", self.store.vector_query(embedding, 1))
            .await?
            .into_iter()
            .next();

        let Some(candidate) = nearest else {
            return Ok(None);
        };

        let skill = candidate.properties.into_skill()?;
        let similarity = cosine_similarity(embedding, &skill.embedding);
        if similarity >= threshold {
            tracing::debug!(
                "Duplicate candidate {} (similarity {:.4} >= {})",
                skill.skill_id,
                similarity,
                threshold
            );
            Ok(Some(skill))
        } else {
            Ok(None)
        }
    }

    pub async fn find_duplicate_default(
        &self,
        embedding: &[f32],
    ) -> Result<Option<Skill>, RepositoryError> {
        self.find_duplicate(embedding, self.default_threshold).await
    }
}
