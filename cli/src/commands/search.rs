// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Retrieval commands: hybrid search and duplicate lookup.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::embedded::open_initialized;
use crate::input::read_embedding;

pub async fn search(
    config_path: Option<PathBuf>,
    embedding_file: &Path,
    text: Option<&str>,
    top_k: usize,
    min_score: f64,
    json: bool,
) -> Result<()> {
    let embedding = read_embedding(embedding_file)?;
    let cortex = open_initialized(config_path).await?;

    let hits = cortex
        .search
        .hybrid_search(&embedding, text.unwrap_or_default(), top_k, min_score)
        .await
        .context("Hybrid search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{}", "No matching skills".dimmed());
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {:.4}  {}  {}",
            rank + 1,
            hit.score,
            hit.skill.skill_id.to_string().dimmed(),
            hit.skill.title.bold()
        );
    }
    Ok(())
}

pub async fn duplicate(
    config_path: Option<PathBuf>,
    embedding_file: &Path,
    threshold: Option<f64>,
) -> Result<()> {
    let embedding = read_embedding(embedding_file)?;
    let cortex = open_initialized(config_path).await?;

    let threshold = threshold.unwrap_or_else(|| cortex.duplicates.default_threshold());
    let found = cortex
        .duplicates
        .find_duplicate(&embedding, threshold)
        .await
        .context("Duplicate lookup failed")?;

    match found {
        Some(skill) => println!(
            "{}",
            format!("Duplicate of {} ({})", skill.skill_id, skill.title).yellow()
        ),
        None => println!(
            "{}",
            format!("✓ No existing skill at similarity >= {}", threshold).green()
        ),
    }
    Ok(())
}
