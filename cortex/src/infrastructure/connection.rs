// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Manager
//!
//! Owns the single client handle a networked store runs on. The handle is
//! created lazily on first use and then shared by every caller through an
//! `Arc`; the manager itself is constructed at bootstrap and injected, never
//! reached through a global.
//!
//! Creation is single-flight: the state lock is held across the connect, so
//! concurrent first callers wait for one connection attempt instead of each
//! opening their own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::repository::RepositoryError;

/// Opens a new client handle.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Send + Sync + 'static;

    async fn connect(&self) -> Result<Self::Handle, RepositoryError>;
}

enum ConnectionState<H> {
    Idle,
    Ready(Arc<H>),
    Closed,
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    state: Mutex<ConnectionState<C::Handle>>,
    connects: AtomicUsize,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: Mutex::new(ConnectionState::Idle),
            connects: AtomicUsize::new(0),
        }
    }

    /// The cached handle, connecting first if there is none.
    pub async fn handle(&self) -> Result<Arc<C::Handle>, RepositoryError> {
        let mut state = self.state.lock().await;
        match &*state {
            ConnectionState::Ready(handle) => return Ok(handle.clone()),
            ConnectionState::Closed => {
                return Err(RepositoryError::Database(
                    "connection manager has been shut down".to_string(),
                ))
            }
            ConnectionState::Idle => {}
        }

        let handle = Arc::new(self.connector.connect().await?);
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Store connection established (connect #{})", attempt);
        *state = ConnectionState::Ready(handle.clone());
        Ok(handle)
    }

    /// Drop the cached handle so the next call reconnects.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, ConnectionState::Ready(_)) {
            tracing::warn!("Resetting store connection");
            *state = ConnectionState::Idle;
        }
    }

    /// Drop the cached handle for good; later calls fail.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        *state = ConnectionState::Closed;
        tracing::info!("Store connection manager shut down");
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Ready(_))
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct CountingConnector {
        attempts: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingConnector {
        fn new() -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        type Handle = usize;

        async fn connect(&self) -> Result<usize, RepositoryError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepositoryError::Transient("connection refused".to_string()));
            }
            Ok(attempt)
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let manager = Arc::new(ConnectionManager::new(CountingConnector::new()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { *manager.handle().await.unwrap() }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), 1);
        }
        assert_eq!(manager.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_reconnect() {
        let manager = ConnectionManager::new(CountingConnector::new());

        assert_eq!(*manager.handle().await.unwrap(), 1);
        assert_eq!(*manager.handle().await.unwrap(), 1);

        manager.reset().await;
        assert!(!manager.is_connected().await);
        assert_eq!(*manager.handle().await.unwrap(), 2);
        assert_eq!(manager.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_is_permanent() {
        let manager = ConnectionManager::new(CountingConnector::new());
        manager.handle().await.unwrap();

        manager.shutdown().await;
        let err = manager.handle().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));
        assert!(!err.is_retryable());

        manager.reset().await;
        assert!(manager.handle().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let connector = CountingConnector::new();
        connector.fail.store(true, Ordering::SeqCst);
        let manager = ConnectionManager::new(connector);

        let err = manager.handle().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(manager.connect_count(), 0);

        manager.connector.fail.store(false, Ordering::SeqCst);
        assert_eq!(*manager.handle().await.unwrap(), 2);
    }
}
