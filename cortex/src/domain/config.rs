// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cortex Configuration
//
// YAML configuration for the skill cortex, covering:
// - Store backend selection (in-memory or Neo4j) and connection settings
// - Per-call store deadline
// - Hybrid search fusion weights and candidate pool sizing
// - Duplicate detection threshold
//
// Discovery precedence and environment overrides follow the same scheme as
// the rest of the platform's node configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::scoring::{FusionWeights, DEFAULT_KEYWORD_WEIGHT, DEFAULT_VECTOR_WEIGHT};
use crate::domain::skill::validate_unit_interval;

pub const CONFIG_PATH_ENV: &str = "SKILL_CORTEX_CONFIG_PATH";
pub const STORE_TIMEOUT_ENV: &str = "SKILL_CORTEX_STORE_TIMEOUT";
pub const NEO4J_URI_ENV: &str = "NEO4J_URI";
pub const NEO4J_USERNAME_ENV: &str = "NEO4J_USERNAME";
pub const NEO4J_PASSWORD_ENV: &str = "NEO4J_PASSWORD";

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.9;
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 2;

/// Top-level cortex configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub duplicate: DuplicateSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store, lost on exit
    #[default]
    InMemory,
    Neo4j,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default)]
    pub neo4j: Neo4jSettings,

    /// Deadline applied to every store round-trip (e.g. "10s", "500ms")
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            neo4j: Neo4jSettings::default(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,

    #[serde(default = "default_neo4j_username")]
    pub username: String,

    /// Password (supports "env:VAR_NAME" for environment variables)
    #[serde(default)]
    pub password: String,

    /// Target database; the server default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_neo4j_uri(),
            username: default_neo4j_username(),
            password: String::new(),
            database: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Neo4jSettings {
    /// Resolve the password, expanding the "env:VAR_NAME" form.
    pub fn resolve_password(&self) -> anyhow::Result<String> {
        match self.password.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(self.password.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Each channel fetches `top_k * candidate_multiplier` candidates
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }
}

impl SearchSettings {
    pub fn fusion_weights(&self) -> anyhow::Result<FusionWeights> {
        Ok(FusionWeights::new(self.vector_weight, self.keyword_weight)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSettings {
    #[serde(default = "default_duplicate_threshold")]
    pub threshold: f64,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_neo4j_username() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_vector_weight() -> f64 {
    DEFAULT_VECTOR_WEIGHT
}

fn default_keyword_weight() -> f64 {
    DEFAULT_KEYWORD_WEIGHT
}

fn default_candidate_multiplier() -> usize {
    DEFAULT_CANDIDATE_MULTIPLIER
}

fn default_duplicate_threshold() -> f64 {
    DEFAULT_DUPLICATE_THRESHOLD
}

impl CortexConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SKILL_CORTEX_CONFIG_PATH environment variable
    /// 2. ./cortex-config.yaml (working directory)
    /// 3. ~/.skill-cortex/config.yaml (user home)
    /// 4. /etc/skill-cortex/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./cortex-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".skill-cortex").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/skill-cortex/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(uri) = std::env::var(NEO4J_URI_ENV) {
            tracing::info!("Environment override: {}={}", NEO4J_URI_ENV, uri);
            self.store.neo4j.uri = uri;
            // Pointing at a server implies the graph backend
            self.store.backend = StoreBackend::Neo4j;
        }
        if let Ok(username) = std::env::var(NEO4J_USERNAME_ENV) {
            tracing::info!("Environment override: {}", NEO4J_USERNAME_ENV);
            self.store.neo4j.username = username;
        }
        if let Ok(password) = std::env::var(NEO4J_PASSWORD_ENV) {
            tracing::info!("Environment override: {}", NEO4J_PASSWORD_ENV);
            self.store.neo4j.password = password;
        }
        if let Ok(val) = std::env::var(STORE_TIMEOUT_ENV) {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: {}={}", STORE_TIMEOUT_ENV, val);
                    self.store.timeout = timeout;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for {}: '{}' ({}). Ignoring.",
                        STORE_TIMEOUT_ENV,
                        val,
                        e
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.search.fusion_weights()?;

        if self.search.candidate_multiplier == 0 {
            anyhow::bail!("search.candidate_multiplier must be at least 1");
        }

        validate_unit_interval("duplicate.threshold", self.duplicate.threshold)?;

        if self.store.timeout.is_zero() {
            anyhow::bail!("store.timeout must be greater than zero");
        }

        if self.store.backend == StoreBackend::Neo4j {
            if self.store.neo4j.uri.trim().is_empty() {
                anyhow::bail!("store.neo4j.uri cannot be empty");
            }
            if self.store.neo4j.max_connections == 0 {
                anyhow::bail!("store.neo4j.max_connections must be at least 1");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CortexConfig::default();
        assert_eq!(config.store.backend, StoreBackend::InMemory);
        assert_eq!(config.store.timeout, Duration::from_secs(10));
        assert_eq!(config.search.vector_weight, 0.7);
        assert_eq!(config.search.keyword_weight, 0.3);
        assert_eq!(config.search.candidate_multiplier, 2);
        assert_eq!(config.duplicate.threshold, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
store:
  backend: neo4j
  timeout: 2500ms
  neo4j:
    uri: bolt://graph.internal:7687
    password: env:CORTEX_TEST_UNUSED
search:
  candidate_multiplier: 4
"#;
        let config = CortexConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Neo4j);
        assert_eq!(config.store.timeout, Duration::from_millis(2500));
        assert_eq!(config.store.neo4j.uri, "bolt://graph.internal:7687");
        assert_eq!(config.store.neo4j.username, "neo4j");
        assert_eq!(config.store.neo4j.max_connections, 16);
        assert_eq!(config.search.candidate_multiplier, 4);
        assert_eq!(config.search.vector_weight, 0.7);
        assert_eq!(config.duplicate.threshold, 0.9);
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex-config.yaml");

        let mut config = CortexConfig::default();
        config.store.backend = StoreBackend::Neo4j;
        config.store.neo4j.database = Some("skills".to_string());
        config.duplicate.threshold = 0.85;
        config.to_yaml_file(&path).unwrap();

        let loaded = CortexConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_explicit_path_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(CortexConfig::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = CortexConfig::default();

        config.search.vector_weight = 0.9;
        assert!(config.validate().is_err());
        config.search.vector_weight = 0.7;

        config.duplicate.threshold = 1.5;
        assert!(config.validate().is_err());
        config.duplicate.threshold = 0.9;

        config.search.candidate_multiplier = 0;
        assert!(config.validate().is_err());
        config.search.candidate_multiplier = 2;

        config.store.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.store.timeout = DEFAULT_STORE_TIMEOUT;

        config.store.backend = StoreBackend::Neo4j;
        config.store.neo4j.uri = "  ".to_string();
        assert!(config.validate().is_err());
        config.store.neo4j.uri = "bolt://localhost:7687".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_password() {
        let mut settings = Neo4jSettings {
            password: "plain-secret".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.resolve_password().unwrap(), "plain-secret");

        std::env::set_var("SKILL_CORTEX_TEST_NEO4J_SECRET", "from-env");
        settings.password = "env:SKILL_CORTEX_TEST_NEO4J_SECRET".to_string();
        assert_eq!(settings.resolve_password().unwrap(), "from-env");

        settings.password = "env:SKILL_CORTEX_TEST_DEFINITELY_UNSET".to_string();
        assert!(settings.resolve_password().is_err());
    }
}
