// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `skillctl init`: provision indexes and apply pending migrations.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::embedded::open_cortex;

pub async fn init(config_path: Option<PathBuf>) -> Result<()> {
    let cortex = open_cortex(config_path)?;
    let report = cortex
        .initialize()
        .await
        .context("Store initialization failed")?;

    println!("{}", "✓ Store initialized".green());
    for id in &report.applied {
        println!("  applied  {}", id);
    }
    for id in &report.skipped {
        println!("  {}  {}", "skipped".dimmed(), id);
    }

    cortex.shutdown().await;
    Ok(())
}
