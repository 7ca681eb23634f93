// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Skill Store Interface
//!
//! Persistence contract for the [`Skill`] aggregate. The trait is defined in
//! the domain layer and implemented in `crate::infrastructure`:
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemorySkillStore` | process-local map, for development and tests |
//! | `Neo4jSkillStore` | Neo4j with native vector + fulltext indexes |
//!
//! Stores are deliberately thin. They answer point reads/writes, the two
//! ranking queries and schema DDL; validation, version arithmetic and score
//! fusion live in the application layer.

use async_trait::async_trait;

use crate::domain::migration::Migration;
use crate::domain::skill::{Skill, SkillId, SkillProperties, ValidationError};

/// A stored record paired with the raw score a ranking query assigned it.
///
/// Raw scores are store- and channel-specific and are not comparable across
/// channels until normalized by the score merger.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProperties {
    pub properties: SkillProperties,
    pub raw_score: f64,
}

impl ScoredProperties {
    pub fn new(properties: SkillProperties, raw_score: f64) -> Self {
        Self { properties, raw_score }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// No record with that id exists.
    Missing,
    /// The stored version moved on since it was read.
    Stale { current_version: u64 },
}

#[async_trait]
pub trait SkillStore: Send + Sync {
    /// Persist a new record. Fails with [`RepositoryError::Conflict`] if the id exists.
    async fn insert(&self, skill: &Skill) -> Result<(), RepositoryError>;

    async fn fetch(&self, id: &SkillId) -> Result<Option<SkillProperties>, RepositoryError>;

    /// Replace the stored record with `skill` only if the stored version
    /// still equals `expected_version`. Field set and version commit together.
    async fn commit_if_version(
        &self,
        skill: &Skill,
        expected_version: u64,
    ) -> Result<CommitOutcome, RepositoryError>;

    /// Returns whether a record was removed.
    async fn remove(&self, id: &SkillId) -> Result<bool, RepositoryError>;

    /// Remove every record whose title starts with `prefix`; returns the count.
    async fn remove_by_title_prefix(&self, prefix: &str) -> Result<usize, RepositoryError>;

    async fn count(&self) -> Result<usize, RepositoryError>;

    /// Nearest neighbours of `embedding`, best first, at most `k`.
    async fn vector_query(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError>;

    /// Fulltext matches for `text`, most relevant first, at most `k`.
    async fn keyword_query(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError>;

    /// Create the skill-id uniqueness constraint if missing.
    async fn ensure_constraints(&self) -> Result<(), RepositoryError>;

    /// Create the cosine vector index with `dimensions` if missing.
    async fn ensure_vector_index(&self, dimensions: usize) -> Result<(), RepositoryError>;

    /// Create the fulltext index over title, problem and keyword text if missing.
    async fn ensure_fulltext_index(&self) -> Result<(), RepositoryError>;

    /// Ids of migrations already recorded in the ledger.
    async fn applied_migrations(&self) -> Result<Vec<String>, RepositoryError>;

    /// Run one data migration and record it in the ledger.
    async fn apply_migration(&self, migration: Migration) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network, timeout or overload. Safe for the caller to retry.
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }
}

impl From<ValidationError> for RepositoryError {
    fn from(err: ValidationError) -> Self {
        RepositoryError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
