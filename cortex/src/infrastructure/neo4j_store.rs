// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Neo4j skill store
//!
//! Skills are `(:Skill)` nodes keyed by a uniquely constrained `skill_id`.
//! Ranking queries go through Neo4j's native indexes:
//!
//! - vector: `db.index.vector.queryNodes`, cosine similarity reported as
//!   `(1 + cos) / 2`
//! - fulltext: `db.index.fulltext.queryNodes` over `title`, `problem` and the
//!   derived `keyword_text`, Lucene relevance (unbounded)
//!
//! Applied data migrations are recorded as `(:SchemaMigration {id})` nodes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use neo4rs::{query, ConfigBuilder, Graph, Query, Row};
use serde::de::DeserializeOwned;

use crate::domain::config::Neo4jSettings;
use crate::domain::migration::Migration;
use crate::domain::repository::{CommitOutcome, RepositoryError, ScoredProperties, SkillStore};
use crate::domain::skill::{format_timestamp, Skill, SkillId, SkillProperties};
use crate::infrastructure::connection::{ConnectionManager, Connector};

pub const VECTOR_INDEX: &str = "skill_embeddings";
pub const FULLTEXT_INDEX: &str = "skill_fulltext";

const INSERT_SKILL: &str = "
    OPTIONAL MATCH (existing:Skill {skill_id: $skill_id})
    WITH existing WHERE existing IS NULL
    CREATE (s:Skill {
        skill_id: $skill_id, title: $title, problem: $problem, resolution: $resolution,
        conditions: $conditions, keywords: $keywords, keyword_text: $keyword_text,
        embedding: $embedding, product_area: $product_area, issue_type: $issue_type,
        confidence: $confidence, times_used: $times_used, times_confirmed: $times_confirmed,
        version: $version, created_at: $created_at, updated_at: $updated_at
    })
    RETURN s.skill_id AS skill_id";

const FETCH_SKILL: &str = "
    MATCH (s:Skill {skill_id: $skill_id})
    RETURN s {.*} AS props";

// The _lock write takes the node's write lock before the version is read, so
// two writers holding the same expected version cannot both pass the check.
const COMMIT_IF_VERSION: &str = "
    MATCH (s:Skill {skill_id: $skill_id})
    SET s._lock = true
    WITH s, coalesce(s.version, 1) AS current_version
    FOREACH (_ IN CASE WHEN current_version = $expected_version THEN [1] ELSE [] END |
        SET s.title = $title, s.problem = $problem, s.resolution = $resolution,
            s.conditions = $conditions, s.keywords = $keywords, s.keyword_text = $keyword_text,
            s.embedding = $embedding, s.product_area = $product_area, s.issue_type = $issue_type,
            s.confidence = $confidence, s.times_used = $times_used,
            s.times_confirmed = $times_confirmed, s.version = $version,
            s.created_at = $created_at, s.updated_at = $updated_at
    )
    REMOVE s._lock
    RETURN current_version";

const REMOVE_SKILL: &str = "
    MATCH (s:Skill {skill_id: $skill_id})
    DETACH DELETE s
    RETURN count(s) AS removed";

const REMOVE_BY_TITLE_PREFIX: &str = "
    MATCH (s:Skill)
    WHERE s.title STARTS WITH $prefix
    DETACH DELETE s
    RETURN count(s) AS removed";

const COUNT_SKILLS: &str = "MATCH (s:Skill) RETURN count(s) AS total";

const VECTOR_QUERY: &str = "
    CALL db.index.vector.queryNodes($index, $k, $embedding)
    YIELD node, score
    RETURN node {.*} AS props, score";

const KEYWORD_QUERY: &str = "
    CALL db.index.fulltext.queryNodes($index, $text)
    YIELD node, score
    RETURN node {.*} AS props, score
    ORDER BY score DESC
    LIMIT $k";

const CREATE_CONSTRAINT: &str = "
    CREATE CONSTRAINT skill_id_unique IF NOT EXISTS
    FOR (s:Skill) REQUIRE s.skill_id IS UNIQUE";

const CREATE_FULLTEXT_INDEX: &str = "
    CREATE FULLTEXT INDEX skill_fulltext IF NOT EXISTS
    FOR (s:Skill) ON EACH [s.title, s.problem, s.keyword_text]";

const APPLIED_MIGRATIONS: &str = "
    MATCH (m:SchemaMigration)
    RETURN m.id AS id
    ORDER BY id";

const RECORD_MIGRATION: &str = "
    MERGE (m:SchemaMigration {id: $id})
    ON CREATE SET m.applied_at = $applied_at, m.description = $description";

const BACKFILL_KEYWORD_TEXT: &str = "
    MATCH (s:Skill)
    WHERE s.keyword_text IS NULL
    SET s.keyword_text = reduce(text = '', k IN coalesce(s.keywords, []) |
        CASE WHEN text = '' THEN k ELSE text + ' ' + k END)";

const BACKFILL_USAGE_DEFAULTS: &str = "
    MATCH (s:Skill)
    WHERE s.times_used IS NULL OR s.times_confirmed IS NULL
       OR s.confidence IS NULL OR s.version IS NULL
    SET s.times_used = coalesce(s.times_used, 0),
        s.times_confirmed = coalesce(s.times_confirmed, 0),
        s.confidence = coalesce(s.confidence, 0.5),
        s.version = coalesce(s.version, 1)";

fn create_vector_index(dimensions: usize) -> String {
    // Index options do not accept parameters
    format!(
        "CREATE VECTOR INDEX {VECTOR_INDEX} IF NOT EXISTS
         FOR (s:Skill) ON (s.embedding)
         OPTIONS {{indexConfig: {{
             `vector.dimensions`: {dimensions},
             `vector.similarity_function`: 'cosine'
         }}}}"
    )
}

fn migration_statement(migration: Migration) -> &'static str {
    match migration {
        Migration::KeywordText => BACKFILL_KEYWORD_TEXT,
        Migration::UsageDefaults => BACKFILL_USAGE_DEFAULTS,
    }
}

/// Escape Lucene query syntax so free text is matched term by term.
pub fn escape_lucene(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
        '\\', '/',
    ];
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn bind_skill(q: Query, skill: &Skill) -> Query {
    let keyword_text = skill.keyword_text();
    let props = SkillProperties::from(skill);
    q.param("skill_id", props.skill_id)
        .param("title", props.title)
        .param("problem", props.problem)
        .param("resolution", props.resolution)
        .param("conditions", props.conditions)
        .param("keywords", props.keywords)
        .param("keyword_text", keyword_text)
        .param("embedding", props.embedding)
        .param("product_area", props.product_area)
        .param("issue_type", props.issue_type)
        .param("confidence", props.confidence)
        .param("times_used", props.times_used)
        .param("times_confirmed", props.times_confirmed)
        .param("version", props.version)
        .param("created_at", props.created_at)
        .param("updated_at", props.updated_at)
}

/// Sort a driver failure into the repository error taxonomy.
pub(crate) fn map_neo4j_error(err: neo4rs::Error) -> RepositoryError {
    match err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
            RepositoryError::Transient(err.to_string())
        }
        other => classify_failure(other.to_string()),
    }
}

/// Server failures arrive as messages carrying the Neo4j status code.
fn classify_failure(message: String) -> RepositoryError {
    if message.contains("ConstraintValidationFailed") {
        RepositoryError::Conflict(message)
    } else if message.contains("TransientError")
        || message.contains("ServiceUnavailable")
        || message.contains("SessionExpired")
    {
        RepositoryError::Transient(message)
    } else {
        RepositoryError::Database(message)
    }
}

fn column<T: DeserializeOwned>(row: &Row, key: &str) -> Result<T, RepositoryError> {
    row.get::<T>(key)
        .map_err(|e| RepositoryError::Serialization(format!("column '{key}': {e}")))
}

fn scored_rows(rows: Vec<Row>) -> Result<Vec<ScoredProperties>, RepositoryError> {
    rows.iter()
        .map(|row| {
            Ok(ScoredProperties::new(
                column::<SkillProperties>(row, "props")?,
                column::<f64>(row, "score")?,
            ))
        })
        .collect()
}

pub struct Neo4jConnector {
    settings: Neo4jSettings,
    password: String,
}

impl Neo4jConnector {
    /// `password` is the resolved secret, not the `env:` reference.
    pub fn new(settings: Neo4jSettings, password: String) -> Self {
        Self { settings, password }
    }
}

#[async_trait]
impl Connector for Neo4jConnector {
    type Handle = Graph;

    async fn connect(&self) -> Result<Graph, RepositoryError> {
        tracing::info!("Connecting to Neo4j at {}", self.settings.uri);
        let mut builder = ConfigBuilder::default()
            .uri(self.settings.uri.as_str())
            .user(self.settings.username.as_str())
            .password(self.password.as_str())
            .max_connections(self.settings.max_connections);
        if let Some(database) = &self.settings.database {
            builder = builder.db(database.as_str());
        }
        let config = builder.build().map_err(map_neo4j_error)?;
        Graph::connect(config).await.map_err(map_neo4j_error)
    }
}

pub struct Neo4jSkillStore {
    connections: Arc<ConnectionManager<Neo4jConnector>>,
}

impl Neo4jSkillStore {
    pub fn new(connections: Arc<ConnectionManager<Neo4jConnector>>) -> Self {
        Self { connections }
    }

    /// Map a driver failure, dropping the cached connection if it looks broken.
    async fn fail(&self, err: neo4rs::Error) -> RepositoryError {
        let mapped = map_neo4j_error(err);
        if mapped.is_retryable() {
            self.connections.reset().await;
        }
        mapped
    }

    async fn run(&self, q: Query) -> Result<(), RepositoryError> {
        let graph = self.connections.handle().await?;
        match graph.run(q).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn rows(&self, q: Query) -> Result<Vec<Row>, RepositoryError> {
        let graph = self.connections.handle().await?;
        let mut stream = match graph.execute(q).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e).await),
        };

        let mut rows = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break,
                Err(e) => return Err(self.fail(e).await),
            }
        }
        Ok(rows)
    }

    async fn single_count(&self, q: Query, key: &str) -> Result<usize, RepositoryError> {
        let rows = self.rows(q).await?;
        let count = match rows.first() {
            Some(row) => column::<i64>(row, key)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl SkillStore for Neo4jSkillStore {
    async fn insert(&self, skill: &Skill) -> Result<(), RepositoryError> {
        let rows = self.rows(bind_skill(query(INSERT_SKILL), skill)).await?;
        if rows.is_empty() {
            return Err(RepositoryError::Conflict(format!(
                "skill {} already exists",
                skill.skill_id
            )));
        }
        Ok(())
    }

    async fn fetch(&self, id: &SkillId) -> Result<Option<SkillProperties>, RepositoryError> {
        let rows = self
            .rows(query(FETCH_SKILL).param("skill_id", id.as_str()))
            .await?;
        rows.first()
            .map(|row| column::<SkillProperties>(row, "props"))
            .transpose()
    }

    async fn commit_if_version(
        &self,
        skill: &Skill,
        expected_version: u64,
    ) -> Result<CommitOutcome, RepositoryError> {
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);
        let q = bind_skill(query(COMMIT_IF_VERSION), skill).param("expected_version", expected);
        let rows = self.rows(q).await?;

        let Some(row) = rows.first() else {
            return Ok(CommitOutcome::Missing);
        };
        let current = column::<i64>(row, "current_version")?;
        if current == expected {
            Ok(CommitOutcome::Committed)
        } else {
            Ok(CommitOutcome::Stale {
                current_version: u64::try_from(current).unwrap_or(0),
            })
        }
    }

    async fn remove(&self, id: &SkillId) -> Result<bool, RepositoryError> {
        let removed = self
            .single_count(query(REMOVE_SKILL).param("skill_id", id.as_str()), "removed")
            .await?;
        Ok(removed > 0)
    }

    async fn remove_by_title_prefix(&self, prefix: &str) -> Result<usize, RepositoryError> {
        self.single_count(query(REMOVE_BY_TITLE_PREFIX).param("prefix", prefix), "removed")
            .await
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        self.single_count(query(COUNT_SKILLS), "total").await
    }

    async fn vector_query(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError> {
        let embedding: Vec<f64> = embedding.iter().map(|&v| f64::from(v)).collect();
        let q = query(VECTOR_QUERY)
            .param("index", VECTOR_INDEX)
            .param("k", to_i64(k))
            .param("embedding", embedding);
        scored_rows(self.rows(q).await?)
    }

    async fn keyword_query(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredProperties>, RepositoryError> {
        let escaped = escape_lucene(text);
        if escaped.trim().is_empty() {
            return Ok(Vec::new());
        }
        let q = query(KEYWORD_QUERY)
            .param("index", FULLTEXT_INDEX)
            .param("text", escaped)
            .param("k", to_i64(k));
        scored_rows(self.rows(q).await?)
    }

    async fn ensure_constraints(&self) -> Result<(), RepositoryError> {
        self.run(query(CREATE_CONSTRAINT)).await
    }

    async fn ensure_vector_index(&self, dimensions: usize) -> Result<(), RepositoryError> {
        self.run(query(&create_vector_index(dimensions))).await
    }

    async fn ensure_fulltext_index(&self) -> Result<(), RepositoryError> {
        self.run(query(CREATE_FULLTEXT_INDEX)).await
    }

    async fn applied_migrations(&self) -> Result<Vec<String>, RepositoryError> {
        self.rows(query(APPLIED_MIGRATIONS))
            .await?
            .iter()
            .map(|row| column::<String>(row, "id"))
            .collect()
    }

    async fn apply_migration(&self, migration: Migration) -> Result<(), RepositoryError> {
        let graph = self.connections.handle().await?;
        let record = query(RECORD_MIGRATION)
            .param("id", migration.id())
            .param("applied_at", format_timestamp(&Utc::now()))
            .param("description", migration.description());

        // Backfill and ledger entry commit together
        let mut txn = match graph.start_txn().await {
            Ok(txn) => txn,
            Err(e) => return Err(self.fail(e).await),
        };
        if let Err(e) = txn.run(query(migration_statement(migration))).await {
            return Err(self.fail(e).await);
        }
        if let Err(e) = txn.run(record).await {
            return Err(self.fail(e).await);
        }
        if let Err(e) = txn.commit().await {
            return Err(self.fail(e).await);
        }
        Ok(())
    }
}
