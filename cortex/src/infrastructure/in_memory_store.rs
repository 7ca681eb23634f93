// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory skill store for development and tests.
//!
//! Mirrors the observable behaviour of the Neo4j adapter closely enough for
//! the application services to be tested against it: ranking queries fail
//! until the corresponding index exists, inserts respect id uniqueness, and
//! schema/ledger state can be inspected.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::migration::Migration;
use crate::domain::repository::{CommitOutcome, RepositoryError, ScoredProperties, SkillStore};
use crate::domain::scoring::cosine_similarity;
use crate::domain::skill::{Skill, SkillId, SkillProperties};

// BM25 parameters
const K1: f64 = 1.2;
const B: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<String, SkillProperties>,
    unique_constraint: bool,
    vector_index: Option<usize>,
    fulltext_index: bool,
    ledger: Vec<LedgerEntry>,
}

pub struct InMemorySkillStore {
    state: Arc<RwLock<StoreState>>,
    latency: Option<Duration>,
}

impl InMemorySkillStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            latency: None,
        }
    }

    /// Delay every call by `latency`, to exercise deadlines and interleavings.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn vector_index_dimensions(&self) -> Option<usize> {
        self.state.read().await.vector_index
    }

    pub async fn has_fulltext_index(&self) -> bool {
        self.state.read().await.fulltext_index
    }

    pub async fn has_unique_constraint(&self) -> bool {
        self.state.read().await.unique_constraint
    }

    pub async fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.read().await.ledger.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemorySkillStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tokens of the fields the fulltext index covers.
fn document_terms(props: &SkillProperties) -> Vec<String> {
    let mut terms = tokenize(&props.title);
    terms.extend(tokenize(&props.problem));
    for keyword in &props.keywords {
        terms.extend(tokenize(keyword));
    }
    terms
}

fn rank_descending(results: &mut [ScoredProperties]) {
    results.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.properties.skill_id.cmp(&b.properties.skill_id))
    });
}

#[async_trait]
impl SkillStore for InMemorySkillStore {
    async fn insert(&self, skill: &Skill) -> Result<(), RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let id = skill.skill_id.as_str();
        if state.records.contains_key(id) {
            return Err(RepositoryError::Conflict(format!("skill {id} already exists")));
        }
        state.records.insert(id.to_string(), SkillProperties::from(skill));
        Ok(())
    }

    async fn fetch(&self, id: &SkillId) -> Result<Option<SkillProperties>, RepositoryError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state.records.get(id.as_str()).cloned())
    }

    async fn commit_if_version(
        &self,
        skill: &Skill,
        expected_version: u64,
    ) -> Result<CommitOutcome, RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let Some(stored) = state.records.get_mut(skill.skill_id.as_str()) else {
            return Ok(CommitOutcome::Missing);
        };

        let current_version = u64::try_from(stored.version).unwrap_or(0);
        if current_version != expected_version {
            return Ok(CommitOutcome::Stale { current_version });
        }
        *stored = SkillProperties::from(skill);
        Ok(CommitOutcome::Committed)
    }

    async fn remove(&self, id: &SkillId) -> Result<bool, RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        Ok(state.records.remove(id.as_str()).is_some())
    }

    async fn remove_by_title_prefix(&self, prefix: &str) -> Result<usize, RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|_, props| !props.title.starts_with(prefix));
        Ok(before - state.records.len())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        self.simulate_latency().await;
        Ok(self.state.read().await.records.len())
    }

    async fn vector_query(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        let dimensions = state.vector_index.ok_or_else(|| {
            RepositoryError::Database(
                "vector index does not exist; initialize the store first".to_string(),
            )
        })?;
        if embedding.len() != dimensions {
            return Err(RepositoryError::Database(format!(
                "query vector has {} dimensions, index expects {}",
                embedding.len(),
                dimensions
            )));
        }

        let mut results: Vec<ScoredProperties> = state
            .records
            .values()
            .map(|props| {
                let stored: Vec<f32> = props.embedding.iter().map(|&v| v as f32).collect();
                ScoredProperties::new(props.clone(), cosine_similarity(embedding, &stored))
            })
            .collect();

        rank_descending(&mut results);
        results.truncate(k);
        Ok(results)
    }

    /// BM25 relevance over title, problem and keywords. Records matching no
    /// query term are not returned.
    async fn keyword_query(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        if !state.fulltext_index {
            return Err(RepositoryError::Database(
                "fulltext index does not exist; initialize the store first".to_string(),
            ));
        }

        let query_terms: HashSet<String> = tokenize(text).into_iter().collect();
        if query_terms.is_empty() || state.records.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<(&SkillProperties, Vec<String>)> = state
            .records
            .values()
            .map(|props| (props, document_terms(props)))
            .collect();

        let total = documents.len() as f64;
        let average_length =
            documents.iter().map(|(_, terms)| terms.len()).sum::<usize>() as f64 / total;

        let document_frequency = |term: &str| {
            documents
                .iter()
                .filter(|(_, terms)| terms.iter().any(|t| t == term))
                .count() as f64
        };
        let idf: HashMap<&str, f64> = query_terms
            .iter()
            .map(|term| {
                let df = document_frequency(term.as_str());
                (term.as_str(), (1.0 + (total - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        let mut results: Vec<ScoredProperties> = documents
            .iter()
            .filter_map(|(props, terms)| {
                let length_norm = 1.0 - B + B * terms.len() as f64 / average_length.max(1.0);
                let score: f64 = query_terms
                    .iter()
                    .map(|term| {
                        let tf = terms.iter().filter(|t| *t == term).count() as f64;
                        idf[term.as_str()] * tf * (K1 + 1.0) / (tf + K1 * length_norm)
                    })
                    .sum();
                (score > 0.0).then(|| ScoredProperties::new((*props).clone(), score))
            })
            .collect();

        rank_descending(&mut results);
        results.truncate(k);
        Ok(results)
    }

    async fn ensure_constraints(&self) -> Result<(), RepositoryError> {
        self.simulate_latency().await;
        self.state.write().await.unique_constraint = true;
        Ok(())
    }

    async fn ensure_vector_index(&self, dimensions: usize) -> Result<(), RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        // An existing index is left as is, whatever its dimensions
        if state.vector_index.is_none() {
            state.vector_index = Some(dimensions);
        }
        Ok(())
    }

    async fn ensure_fulltext_index(&self) -> Result<(), RepositoryError> {
        self.simulate_latency().await;
        self.state.write().await.fulltext_index = true;
        Ok(())
    }

    async fn applied_migrations(&self) -> Result<Vec<String>, RepositoryError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state.ledger.iter().map(|entry| entry.id.clone()).collect())
    }

    async fn apply_migration(&self, migration: Migration) -> Result<(), RepositoryError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        // Records are held in typed form: keyword text is derived at query
        // time and usage defaults are filled on deserialization, so both
        // migrations only need recording.
        if !state.ledger.iter().any(|entry| entry.id == migration.id()) {
            state.ledger.push(LedgerEntry {
                id: migration.id().to_string(),
                applied_at: Utc::now(),
            });
        }
        Ok(())
    }
}
