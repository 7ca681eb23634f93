// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Skill Aggregate
//!
//! A skill is a structured problem/resolution entry paired with a semantic
//! embedding. It is the only persisted aggregate of the cortex.
//!
//! Skills are created once through [`Skill::create_new`], which assigns the
//! identifier, `version = 1` and both timestamps, and are mutated only through
//! [`Skill::apply`] (driven by the repository's versioned update path).
//!
//! [`SkillProperties`] is the flat record shape the stores hold and return from
//! queries; [`SkillProperties::into_skill`] materializes it back into the
//! aggregate.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::repository::RepositoryError;

/// Length every skill and query embedding must have.
pub const EMBEDDING_DIM: usize = 768;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkillId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SkillId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Boundary validation failures, raised before any store round-trip.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("embedding must have {expected} dimensions, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    #[error("embedding component {index} is not a finite number")]
    NonFiniteEmbedding { index: usize },

    #[error("confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("{field} must be within [0, 1], got {value}")]
    UnitIntervalOutOfRange { field: &'static str, value: f64 },

    #[error("required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("fusion weights must be non-negative and sum to 1 (vector={vector}, keyword={keyword})")]
    InvalidWeights { vector: f64, keyword: f64 },
}

/// Reject embeddings of the wrong length or with NaN/inf components.
pub fn validate_embedding(embedding: &[f32]) -> Result<(), ValidationError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(ValidationError::EmbeddingDimension {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    if let Some(index) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteEmbedding { index });
    }
    Ok(())
}

/// Reject values outside the closed unit interval (NaN included).
pub fn validate_unit_interval(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::UnitIntervalOutOfRange { field, value })
    }
}

fn validate_confidence(confidence: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(ValidationError::ConfidenceOutOfRange(confidence))
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Keywords are a set: trimmed, de-duplicated and kept in sorted order.
fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Authored content for a skill that does not exist yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSkill {
    pub title: String,
    pub problem: String,
    pub resolution: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub product_area: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: SkillId,
    pub title: String,
    pub problem: String,
    /// Markdown resolution steps.
    pub resolution: String,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
    pub product_area: String,
    pub issue_type: String,
    pub confidence: f64,
    pub times_used: u64,
    pub times_confirmed: u64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    /// Factory for brand-new skills: validates the draft, then assigns a fresh
    /// id, `version = 1` and identical creation/update timestamps.
    pub fn create_new(draft: NewSkill) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let skill = Self {
            skill_id: SkillId::generate(),
            title: draft.title,
            problem: draft.problem,
            resolution: draft.resolution,
            conditions: draft.conditions,
            keywords: normalize_keywords(draft.keywords),
            embedding: draft.embedding,
            product_area: draft.product_area,
            issue_type: draft.issue_type,
            confidence: draft.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            times_used: 0,
            times_confirmed: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        skill.validate()?;
        Ok(skill)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.skill_id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("skill_id"));
        }
        require_text("title", &self.title)?;
        require_text("problem", &self.problem)?;
        require_text("resolution", &self.resolution)?;
        validate_embedding(&self.embedding)?;
        validate_confidence(self.confidence)
    }

    /// Apply a partial update and advance the version by exactly one.
    ///
    /// `updated_at` never moves backwards even if the wall clock does.
    pub fn apply(&mut self, changes: SkillUpdate) {
        let SkillUpdate {
            title,
            problem,
            resolution,
            conditions,
            keywords,
            embedding,
            product_area,
            issue_type,
            confidence,
            times_used,
            times_confirmed,
            expected_version: _,
        } = changes;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(problem) = problem {
            self.problem = problem;
        }
        if let Some(resolution) = resolution {
            self.resolution = resolution;
        }
        if let Some(conditions) = conditions {
            self.conditions = conditions;
        }
        if let Some(keywords) = keywords {
            self.keywords = normalize_keywords(keywords);
        }
        if let Some(embedding) = embedding {
            self.embedding = embedding;
        }
        if let Some(product_area) = product_area {
            self.product_area = product_area;
        }
        if let Some(issue_type) = issue_type {
            self.issue_type = issue_type;
        }
        if let Some(confidence) = confidence {
            self.confidence = confidence;
        }
        if let Some(times_used) = times_used {
            self.times_used = times_used;
        }
        if let Some(times_confirmed) = times_confirmed {
            self.times_confirmed = times_confirmed;
        }
        self.touch();
    }

    /// Count one use of the skill, optionally as a confirmed resolution.
    pub fn record_usage(&mut self, confirmed: bool) {
        self.times_used = self.times_used.saturating_add(1);
        if confirmed {
            self.times_confirmed = self.times_confirmed.saturating_add(1);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now().max(self.updated_at);
    }

    /// Space-joined keywords, the form the fulltext index covers.
    pub fn keyword_text(&self) -> String {
        self.keywords.join(" ")
    }
}

/// Partial change request: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times_confirmed: Option<u64>,
    /// Reject the update with a conflict unless the stored version matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl SkillUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(problem) = &self.problem {
            require_text("problem", problem)?;
        }
        if let Some(resolution) = &self.resolution {
            require_text("resolution", resolution)?;
        }
        if let Some(embedding) = &self.embedding {
            validate_embedding(embedding)?;
        }
        if let Some(confidence) = self.confidence {
            validate_confidence(confidence)?;
        }
        Ok(())
    }
}

/// Flat store-level record: timestamps as RFC 3339 strings, embedding as `f64`.
///
/// Fields that older records may lack fall back to the same defaults the
/// `0002_usage_defaults` migration backfills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProperties {
    pub skill_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub product_area: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub times_used: i64,
    #[serde(default)]
    pub times_confirmed: i64,
    #[serde(default = "default_version")]
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_version() -> i64 {
    1
}

impl From<&Skill> for SkillProperties {
    fn from(skill: &Skill) -> Self {
        Self {
            skill_id: skill.skill_id.0.clone(),
            title: skill.title.clone(),
            problem: skill.problem.clone(),
            resolution: skill.resolution.clone(),
            conditions: skill.conditions.clone(),
            keywords: skill.keywords.clone(),
            embedding: skill.embedding.iter().map(|&v| f64::from(v)).collect(),
            product_area: skill.product_area.clone(),
            issue_type: skill.issue_type.clone(),
            confidence: skill.confidence,
            times_used: i64::try_from(skill.times_used).unwrap_or(i64::MAX),
            times_confirmed: i64::try_from(skill.times_confirmed).unwrap_or(i64::MAX),
            version: i64::try_from(skill.version).unwrap_or(i64::MAX),
            created_at: format_timestamp(&skill.created_at),
            updated_at: format_timestamp(&skill.updated_at),
        }
    }
}

impl SkillProperties {
    pub fn skill_id(&self) -> SkillId {
        SkillId(self.skill_id.clone())
    }

    /// Materialize the stored record into a full [`Skill`].
    pub fn into_skill(self) -> Result<Skill, RepositoryError> {
        let skill_id = self.skill_id;
        let malformed =
            |what: &str| RepositoryError::Serialization(format!("skill {skill_id}: {what}"));

        if skill_id.trim().is_empty() {
            return Err(RepositoryError::Serialization(
                "stored skill record has an empty skill_id".to_string(),
            ));
        }

        let embedding: Vec<f32> = self.embedding.iter().map(|&v| v as f32).collect();
        validate_embedding(&embedding).map_err(|e| malformed(&e.to_string()))?;
        validate_confidence(self.confidence).map_err(|e| malformed(&e.to_string()))?;

        let times_used =
            u64::try_from(self.times_used).map_err(|_| malformed("negative times_used"))?;
        let times_confirmed = u64::try_from(self.times_confirmed)
            .map_err(|_| malformed("negative times_confirmed"))?;
        let version = u64::try_from(self.version)
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| malformed("version must be >= 1"))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| malformed("unparseable created_at"))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .ok_or_else(|| malformed("unparseable updated_at"))?;

        Ok(Skill {
            skill_id: SkillId(skill_id),
            title: self.title,
            problem: self.problem,
            resolution: self.resolution,
            conditions: self.conditions,
            keywords: normalize_keywords(self.keywords),
            embedding,
            product_area: self.product_area,
            issue_type: self.issue_type,
            confidence: self.confidence,
            times_used,
            times_confirmed,
            version,
            created_at,
            updated_at,
        })
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
