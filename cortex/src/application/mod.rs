// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer for the skill cortex
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Use-case services driving a [`SkillStore`](crate::domain::SkillStore)

use std::future::Future;
use std::time::Duration;

use crate::domain::repository::RepositoryError;

pub mod bootstrap;
pub mod duplicate_detector;
pub mod hybrid_search;
pub mod index_manager;
pub mod skill_repository;
pub mod store_factory;

pub use bootstrap::SkillCortex;
pub use duplicate_detector::DuplicateDetector;
pub use hybrid_search::HybridSearchEngine;
pub use index_manager::{IndexManager, InitializationReport};
pub use skill_repository::SkillRepository;
pub use store_factory::{create_skill_store, StoreHandle};

pub use crate::domain::config::DEFAULT_STORE_TIMEOUT;

/// Run a store call under a deadline. An elapsed deadline is reported as a
/// transient failure; the call itself may or may not have taken effect.
pub async fn within<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    let started = std::time::Instant::now();
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => {
            tracing::debug!(
                "Store call '{}' finished in {:?} (ok: {})",
                operation,
                started.elapsed(),
                result.is_ok()
            );
            result
        }
        Err(_) => {
            tracing::warn!("Store call '{}' exceeded deadline of {:?}", operation, timeout);
            Err(RepositoryError::Transient(format!(
                "{operation} timed out after {timeout:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_passes_through_results() {
        let ok = within(Duration::from_secs(1), "noop", async {
            Ok::<_, RepositoryError>(7)
        })
        .await;
        assert_eq!(ok.unwrap(), 7);

        let err = within(Duration::from_secs(1), "noop", async {
            Err::<(), _>(RepositoryError::Database("boom".into()))
        })
        .await;
        assert!(matches!(err, Err(RepositoryError::Database(_))));
    }

    #[tokio::test]
    async fn test_within_elapsed_deadline_is_transient() {
        let result = within(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("slow"));
    }
}
