// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for skillctl

pub mod config;
pub mod index;
pub mod search;
pub mod skill;

pub use self::config::ConfigCommand;
