// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer for the skill cortex
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Skill aggregate, store contract, score fusion and configuration

pub mod config;
pub mod migration;
pub mod repository;
pub mod scoring;
pub mod skill;

pub use config::*;
pub use migration::*;
pub use repository::*;
pub use scoring::*;
pub use skill::*;
