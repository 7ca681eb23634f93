// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Skill record commands
//!
//! Commands: add, get, delete, usage, purge, count

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use skill_cortex::domain::skill::{Skill, SkillId};

use crate::embedded::{open_initialized, open_persistent};
use crate::input::read_new_skill;

pub async fn add(config_path: Option<PathBuf>, file: &Path, allow_duplicate: bool) -> Result<()> {
    let draft = read_new_skill(file)?;
    let skill = Skill::create_new(draft).context("Invalid skill")?;
    let cortex = open_persistent(config_path, "add").await?;

    if let Some(existing) = cortex
        .duplicates
        .find_duplicate_default(&skill.embedding)
        .await
        .context("Duplicate check failed")?
    {
        println!(
            "{}",
            format!("⚠ Near-duplicate of {} ({})", existing.skill_id, existing.title).yellow()
        );
        if !allow_duplicate {
            println!("Re-run with --allow-duplicate to store it anyway.");
            return Ok(());
        }
    }

    let created = cortex
        .repository
        .create(skill)
        .await
        .context("Failed to create skill")?;
    println!("{}", format!("✓ Created skill {}", created.skill_id).green());
    Ok(())
}

pub async fn get(config_path: Option<PathBuf>, id: &str) -> Result<()> {
    let cortex = open_initialized(config_path).await?;
    match cortex
        .repository
        .get(&SkillId::from(id))
        .await
        .context("Failed to fetch skill")?
    {
        Some(skill) => println!("{}", serde_json::to_string_pretty(&skill)?),
        None => anyhow::bail!("Skill not found: {}", id),
    }
    Ok(())
}

pub async fn delete(config_path: Option<PathBuf>, id: &str) -> Result<()> {
    let cortex = open_persistent(config_path, "delete").await?;
    cortex
        .repository
        .delete(&SkillId::from(id))
        .await
        .with_context(|| format!("Failed to delete skill {}", id))?;
    println!("{}", format!("✓ Deleted skill {}", id).green());
    Ok(())
}

pub async fn usage(config_path: Option<PathBuf>, id: &str, confirmed: bool) -> Result<()> {
    let cortex = open_persistent(config_path, "usage").await?;
    let skill = cortex
        .repository
        .record_usage(&SkillId::from(id), confirmed)
        .await
        .with_context(|| format!("Failed to record usage of skill {}", id))?;
    println!(
        "{}",
        format!(
            "✓ Skill {} used {} times ({} confirmed), now at version {}",
            skill.skill_id, skill.times_used, skill.times_confirmed, skill.version
        )
        .green()
    );
    Ok(())
}

pub async fn purge(config_path: Option<PathBuf>, prefix: &str) -> Result<()> {
    let cortex = open_persistent(config_path, "purge").await?;
    let removed = cortex
        .repository
        .purge_by_title_prefix(prefix)
        .await
        .context("Purge failed")?;
    println!(
        "{}",
        format!("✓ Removed {} skills with title prefix {:?}", removed, prefix).green()
    );
    Ok(())
}

pub async fn count(config_path: Option<PathBuf>) -> Result<()> {
    let cortex = open_initialized(config_path).await?;
    let total = cortex.repository.count().await.context("Count failed")?;
    println!("{}", total);
    Ok(())
}
