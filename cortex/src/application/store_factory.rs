// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Store Factory - Application Layer
//!
//! Creates the concrete [`SkillStore`] for the configured backend. The domain
//! layer only defines the trait; the factory is the one place that knows
//! which adapters exist.

use std::sync::Arc;

use crate::domain::config::{StoreBackend, StoreSettings};
use crate::domain::repository::SkillStore;
use crate::infrastructure::connection::ConnectionManager;
use crate::infrastructure::neo4j_store::{Neo4jConnector, Neo4jSkillStore};
use crate::infrastructure::InMemorySkillStore;

/// A store plus, for networked backends, the connection it runs on.
pub struct StoreHandle {
    pub store: Arc<dyn SkillStore>,
    pub connections: Option<Arc<ConnectionManager<Neo4jConnector>>>,
}

impl StoreHandle {
    /// Drop any cached connection; later store calls fail.
    pub async fn shutdown(&self) {
        if let Some(connections) = &self.connections {
            connections.shutdown().await;
        }
    }
}

/// Creates a SkillStore implementation based on the configured backend.
///
/// No connection is opened here; the Neo4j connection is established lazily
/// on the first store call.
pub fn create_skill_store(settings: &StoreSettings) -> anyhow::Result<StoreHandle> {
    match settings.backend {
        StoreBackend::InMemory => {
            tracing::info!("Using in-memory skill store");
            Ok(StoreHandle {
                store: Arc::new(InMemorySkillStore::new()),
                connections: None,
            })
        }
        StoreBackend::Neo4j => {
            tracing::info!("Using Neo4j skill store at {}", settings.neo4j.uri);
            let password = settings.neo4j.resolve_password()?;
            let connector = Neo4jConnector::new(settings.neo4j.clone(), password);
            let connections = Arc::new(ConnectionManager::new(connector));
            Ok(StoreHandle {
                store: Arc::new(Neo4jSkillStore::new(connections.clone())),
                connections: Some(connections),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_backend() {
        let handle = create_skill_store(&StoreSettings::default()).unwrap();
        assert!(handle.connections.is_none());
        assert_eq!(handle.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_neo4j_backend_connects_lazily() {
        let mut settings = StoreSettings::default();
        settings.backend = StoreBackend::Neo4j;
        settings.neo4j.password = "secret".to_string();

        let handle = create_skill_store(&settings).unwrap();
        let connections = handle.connections.as_ref().unwrap();
        assert_eq!(connections.connect_count(), 0);
        assert!(!connections.is_connected().await);
    }

    #[test]
    fn test_neo4j_backend_with_unset_password_env_fails() {
        let mut settings = StoreSettings::default();
        settings.backend = StoreBackend::Neo4j;
        settings.neo4j.password = "env:SKILL_CORTEX_TEST_FACTORY_UNSET".to_string();

        assert!(create_skill_store(&settings).is_err());
    }
}
