// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # skillctl
//!
//! Operator CLI for the skill cortex. Every command builds the library
//! services in-process from the discovered configuration, runs once and exits.
//!
//! ## Commands
//!
//! - `skillctl init` - Provision constraints, indexes and migrations
//! - `skillctl add|get|delete|usage|purge|count` - Skill records
//! - `skillctl search|dup` - Hybrid retrieval and duplicate lookup
//! - `skillctl config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use skill_cortex_cli::commands::{self, ConfigCommand};

/// Skill cortex - hybrid retrieval over troubleshooting skills
#[derive(Parser)]
#[command(name = "skillctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SKILL_CORTEX_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SKILL_CORTEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create constraints and indexes, then apply pending migrations
    #[command(name = "init")]
    Init,

    /// Store a new skill from a JSON or YAML file
    #[command(name = "add")]
    Add {
        /// Skill draft (title, problem, resolution, embedding, ...)
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Store the skill even when a near-duplicate exists
        #[arg(long)]
        allow_duplicate: bool,
    },

    /// Print a skill as JSON
    #[command(name = "get")]
    Get {
        /// Skill ID
        id: String,
    },

    /// Delete a skill
    #[command(name = "delete")]
    Delete {
        /// Skill ID
        id: String,
    },

    /// Record that a skill was used
    #[command(name = "usage")]
    Usage {
        /// Skill ID
        id: String,

        /// The skill resolved the issue
        #[arg(long)]
        confirmed: bool,
    },

    /// Hybrid vector and keyword search
    #[command(name = "search")]
    Search {
        /// JSON file holding the query embedding
        #[arg(short, long, value_name = "FILE")]
        embedding: PathBuf,

        /// Free-text query for the keyword channel
        #[arg(short, long)]
        text: Option<String>,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Minimum combined score
        #[arg(long, default_value = "0.0")]
        min_score: f64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find an existing skill similar to an embedding
    #[command(name = "dup")]
    Dup {
        /// JSON file holding the embedding
        #[arg(short, long, value_name = "FILE")]
        embedding: PathBuf,

        /// Similarity threshold (default: from configuration)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Delete every skill whose title starts with a prefix
    #[command(name = "purge")]
    Purge {
        /// Title prefix
        #[arg(long)]
        prefix: String,
    },

    /// Print the number of stored skills
    #[command(name = "count")]
    Count,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Init) => commands::index::init(cli.config).await,
        Some(Commands::Add {
            file,
            allow_duplicate,
        }) => commands::skill::add(cli.config, &file, allow_duplicate).await,
        Some(Commands::Get { id }) => commands::skill::get(cli.config, &id).await,
        Some(Commands::Delete { id }) => commands::skill::delete(cli.config, &id).await,
        Some(Commands::Usage { id, confirmed }) => {
            commands::skill::usage(cli.config, &id, confirmed).await
        }
        Some(Commands::Search {
            embedding,
            text,
            top_k,
            min_score,
            json,
        }) => {
            commands::search::search(
                cli.config,
                &embedding,
                text.as_deref(),
                top_k,
                min_score,
                json,
            )
            .await
        }
        Some(Commands::Dup {
            embedding,
            threshold,
        }) => commands::search::duplicate(cli.config, &embedding, threshold).await,
        Some(Commands::Purge { prefix }) => commands::skill::purge(cli.config, &prefix).await,
        Some(Commands::Count) => commands::skill::count(cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
