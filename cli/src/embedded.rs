// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded cortex: loads configuration and builds the library services
//! in-process for a single command.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use skill_cortex::application::SkillCortex;
use skill_cortex::domain::config::{CortexConfig, StoreBackend};

pub fn load_config(config_path: Option<PathBuf>) -> Result<CortexConfig> {
    let config =
        CortexConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub fn open_cortex(config_path: Option<PathBuf>) -> Result<SkillCortex> {
    let config = load_config(config_path)?;
    tracing::debug!("Opening skill cortex with {:?} store", config.store.backend);

    if config.store.backend == StoreBackend::InMemory {
        eprintln!(
            "{}",
            "⚠ Using the in-memory store: data is discarded when the command exits.".yellow()
        );
    }

    SkillCortex::from_config(&config).context("Failed to initialize skill cortex")
}

/// Writes against the in-memory store vanish when the process exits, so
/// mutating commands refuse to run on it.
pub fn ensure_persistent(config: &CortexConfig, command: &str) -> Result<()> {
    if config.store.backend == StoreBackend::InMemory {
        anyhow::bail!(
            "`skillctl {}` needs a persistent store; set store.backend to neo4j \
             (or export NEO4J_URI)",
            command
        );
    }
    Ok(())
}

/// Like [`open_initialized`], but fails on the in-memory backend.
pub async fn open_persistent(config_path: Option<PathBuf>, command: &str) -> Result<SkillCortex> {
    ensure_persistent(&load_config(config_path.clone())?, command)?;
    open_initialized(config_path).await
}

/// Open the cortex and make sure indexes and migrations are in place.
pub async fn open_initialized(config_path: Option<PathBuf>) -> Result<SkillCortex> {
    let cortex = open_cortex(config_path)?;
    cortex
        .initialize()
        .await
        .context("Failed to initialize store indexes")?;
    Ok(cortex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_backend_is_not_persistent() {
        let err = ensure_persistent(&CortexConfig::default(), "add").unwrap_err();
        assert!(err.to_string().contains("skillctl add"));
    }

    #[test]
    fn test_neo4j_backend_is_persistent() {
        let mut config = CortexConfig::default();
        config.store.backend = StoreBackend::Neo4j;
        assert!(ensure_persistent(&config, "delete").is_ok());
    }

    #[tokio::test]
    async fn test_open_persistent_rejects_in_memory_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex-config.yaml");
        std::fs::write(&path, "store:\n  backend: in_memory\n").unwrap();

        let result = open_persistent(Some(path), "purge").await;
        assert!(result.is_err());
    }
}
