// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill Cortex
//!
//! Hybrid retrieval and versioned storage for skill knowledge bases: skills
//! pair a problem/resolution entry with a semantic embedding and are found
//! again through fused vector and fulltext search.
//!
//! # Architecture
//!
//! - **Layer:** Knowledge Layer
//! - **Purpose:** Skill persistence, duplicate detection and hybrid search

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
