// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the skill cortex: store adapters and the
//! connection lifecycle they share.

pub mod connection;
pub mod in_memory_store;
pub mod neo4j_store;

pub use connection::{ConnectionManager, Connector};
pub use in_memory_store::{InMemorySkillStore, LedgerEntry};
pub use neo4j_store::{Neo4jConnector, Neo4jSkillStore};
