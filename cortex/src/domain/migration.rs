// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Data migrations applied by the index manager at bootstrap.
//!
//! Migrations only backfill derived or defaulted properties; none of them
//! rewrites or removes authored skill content. Each id is recorded in the
//! store's ledger once applied and is never run again.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Migration {
    /// Derive the space-joined `keyword_text` property the fulltext index covers.
    KeywordText,
    /// Backfill usage counters, confidence and version on records that predate them.
    UsageDefaults,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[Migration::KeywordText, Migration::UsageDefaults];

impl Migration {
    pub fn id(&self) -> &'static str {
        match self {
            Migration::KeywordText => "0001_keyword_text",
            Migration::UsageDefaults => "0002_usage_defaults",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Migration::KeywordText => "backfill keyword_text for fulltext indexing",
            Migration::UsageDefaults => "backfill times_used, times_confirmed, confidence and version",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_migration_ids_are_unique_and_ordered() {
        let ids: Vec<&str> = MIGRATIONS.iter().map(Migration::id).collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }
}
