// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Hybrid Score Merger
//!
//! Fuses the vector and keyword channels of a hybrid query into one ranked
//! list. Raw scores from the two channels live on different scales (cosine
//! similarity vs. an unbounded fulltext relevance), so fusion runs in two
//! tagged stages:
//!
//! 1. **Per-channel normalization** into [`ChannelScores`]: vector scores are
//!    clamped into `[0, 1]`; keyword scores are min-max scaled across the
//!    returned set (all-equal sets, including singletons, scale to `1.0`).
//! 2. **Weighted combination** by the [`FusionWeights`] policy
//!    (default `0.7 * vector + 0.3 * keyword`).
//!
//! The keyword channel counts as present only when the keyword query actually
//! returned records. When it returned nothing, candidates keep their full
//! clamped vector score rather than being capped at the vector weight.
//!
//! Ranking is by score descending with ties broken by `skill_id` ascending,
//! so equal scores always come back in the same order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::repository::{RepositoryError, ScoredProperties};
use crate::domain::skill::{validate_unit_interval, Skill, SkillProperties, ValidationError};

pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.7;
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.3;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// One ranked hybrid-search result. `score` is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub skill: Skill,
    pub score: f64,
}

/// Normalized per-channel scores for a single candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelScores {
    /// The keyword query returned no records at all.
    VectorOnly { vector: f64 },
    /// Both channels ran and the keyword channel produced records; a candidate
    /// missing from one channel carries `0.0` for it.
    Hybrid { vector: f64, keyword: f64 },
}

/// Linear blend policy applied after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f64,
    pub keyword: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: DEFAULT_VECTOR_WEIGHT,
            keyword: DEFAULT_KEYWORD_WEIGHT,
        }
    }
}

impl FusionWeights {
    pub fn new(vector: f64, keyword: f64) -> Result<Self, ValidationError> {
        let weights = Self { vector, keyword };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let finite = self.vector.is_finite() && self.keyword.is_finite();
        let non_negative = self.vector >= 0.0 && self.keyword >= 0.0;
        let sums_to_one = (self.vector + self.keyword - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;
        if finite && non_negative && sums_to_one {
            Ok(())
        } else {
            Err(ValidationError::InvalidWeights {
                vector: self.vector,
                keyword: self.keyword,
            })
        }
    }

    pub fn combine(&self, scores: ChannelScores) -> f64 {
        let combined = match scores {
            ChannelScores::VectorOnly { vector } => vector,
            ChannelScores::Hybrid { vector, keyword } => {
                self.vector * vector + self.keyword * keyword
            }
        };
        clamp_unit(combined)
    }
}

/// Clamp into `[0, 1]`; NaN maps to `0.0`.
pub fn clamp_unit(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Min-max scale `raw` into `[0, 1]`. A zero range maps every value to `1.0`.
pub fn min_max_normalize(raw: &[f64]) -> Vec<f64> {
    let finite = raw.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    raw.iter()
        .map(|&v| {
            if !range.is_finite() || range <= 0.0 {
                1.0
            } else if !v.is_finite() {
                0.0
            } else {
                (v - min) / range
            }
        })
        .collect()
}

/// Cosine similarity in `[-1, 1]`; zero vectors and length mismatches give `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

struct Candidate {
    properties: SkillProperties,
    vector: f64,
    keyword: f64,
}

/// Stateless fusion of vector and keyword result sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreMerger {
    weights: FusionWeights,
}

impl ScoreMerger {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Merge both channels, filter by `min_score`, rank, and materialize up to
    /// `top_k` survivors. Records that fail to materialize are skipped, so
    /// lower-ranked valid candidates fill their slots.
    pub fn merge(
        &self,
        vector_records: Vec<ScoredProperties>,
        keyword_records: Vec<ScoredProperties>,
        min_score: f64,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, RepositoryError> {
        validate_unit_interval("min_score", min_score)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let keyword_present = !keyword_records.is_empty();
        let raw_keyword: Vec<f64> = keyword_records.iter().map(|r| r.raw_score).collect();
        let normalized_keyword = min_max_normalize(&raw_keyword);

        let mut table: BTreeMap<String, Candidate> = BTreeMap::new();

        for record in vector_records {
            let score = clamp_unit(record.raw_score);
            let candidate = table
                .entry(record.properties.skill_id.clone())
                .or_insert_with(|| Candidate {
                    properties: record.properties,
                    vector: 0.0,
                    keyword: 0.0,
                });
            candidate.vector = candidate.vector.max(score);
        }

        for (record, normalized) in keyword_records.into_iter().zip(normalized_keyword) {
            let candidate = table
                .entry(record.properties.skill_id.clone())
                .or_insert_with(|| Candidate {
                    properties: record.properties,
                    vector: 0.0,
                    keyword: 0.0,
                });
            candidate.keyword = candidate.keyword.max(normalized);
        }

        let mut ranked: Vec<(f64, Candidate)> = table
            .into_values()
            .map(|candidate| {
                let channels = if keyword_present {
                    ChannelScores::Hybrid {
                        vector: candidate.vector,
                        keyword: candidate.keyword,
                    }
                } else {
                    ChannelScores::VectorOnly {
                        vector: candidate.vector,
                    }
                };
                (self.weights.combine(channels), candidate)
            })
            .filter(|(score, _)| *score >= min_score)
            .collect();

        ranked.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.properties.skill_id.cmp(&b.properties.skill_id))
        });

        let mut hits = Vec::with_capacity(top_k.min(ranked.len()));
        for (score, candidate) in ranked {
            if hits.len() == top_k {
                break;
            }
            let skill_id = candidate.properties.skill_id.clone();
            match candidate.properties.into_skill() {
                Ok(skill) => hits.push(SearchHit { skill, score }),
                Err(error) => {
                    tracing::warn!(%skill_id, %error, "Skipping malformed skill record");
                }
            }
        }
        Ok(hits)
    }
}
