// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use skill_cortex::domain::config::{CortexConfig, StoreBackend, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default configuration as YAML
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./cortex-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CortexConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./cortex-config.yaml");
        println!("  4. ~/.skill-cortex/config.yaml");
        println!("  5. /etc/skill-cortex/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Store:".bold());
    println!("  Backend: {:?}", config.store.backend);
    println!("  Timeout: {:?}", config.store.timeout);
    if config.store.backend == StoreBackend::Neo4j {
        println!("  URI: {}", config.store.neo4j.uri);
        println!("  Username: {}", config.store.neo4j.username);
        println!(
            "  Database: {}",
            config.store.neo4j.database.as_deref().unwrap_or("(server default)")
        );
        println!("  Max connections: {}", config.store.neo4j.max_connections);
    }
    println!();

    println!("{}", "Search:".bold());
    println!(
        "  Weights: vector {} / keyword {}",
        config.search.vector_weight, config.search.keyword_weight
    );
    println!("  Candidate multiplier: {}", config.search.candidate_multiplier);
    println!();

    println!("{}", "Duplicate detection:".bold());
    println!("  Threshold: {}", config.duplicate.threshold);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CortexConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    CortexConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
