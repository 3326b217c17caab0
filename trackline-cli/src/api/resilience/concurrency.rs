//! Concurrency limiter implementation
//!
//! Semaphore-based limiter that caps in-flight carrier lookups across all
//! records of a cycle.

use super::config::ConcurrencyConfig;
use crate::sync::error::LookupError;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Permits handed out when limiting is disabled
const UNLIMITED_PERMITS: usize = 1_000_000;

/// Semaphore-based concurrency limiter for carrier lookups
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    config: ConcurrencyConfig,
    lookups_acquired: Arc<AtomicU64>,
    lookups_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let permits = if config.enabled {
            config.max_concurrent_lookups.max(1)
        } else {
            UNLIMITED_PERMITS
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            lookups_acquired: Arc::new(AtomicU64::new(0)),
            lookups_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit for one lookup, waiting while at capacity
    ///
    /// The permit is released when dropped. Fails only after [`close`](Self::close).
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, LookupError> {
        if self.config.enabled && self.semaphore.available_permits() == 0 {
            self.lookups_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.config.max_concurrent_lookups
            );
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LookupError::PoolClosed)?;
        self.lookups_acquired.fetch_add(1, Ordering::Relaxed);

        if self.config.enabled {
            debug!(
                "Concurrency limiter: acquired permit ({}/{} in use)",
                self.config.max_concurrent_lookups
                    .saturating_sub(self.semaphore.available_permits()),
                self.config.max_concurrent_lookups
            );
        }

        Ok(permit)
    }

    /// Refuse all further permits; pending and later acquires fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn available_permits(&self) -> usize {
        if !self.config.enabled {
            return usize::MAX;
        }
        self.semaphore.available_permits()
    }

    pub fn max_concurrent_lookups(&self) -> usize {
        self.config.max_concurrent_lookups
    }

    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_concurrent_lookups: self.config.max_concurrent_lookups,
            lookups_acquired: self.lookups_acquired.load(Ordering::Relaxed),
            lookups_waited: self.lookups_waited.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }
}

/// Statistics for the concurrency limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    pub available_permits: usize,
    pub max_concurrent_lookups: usize,
    /// Total permits acquired since creation
    pub lookups_acquired: u64,
    /// Number of times a lookup had to wait for a permit
    pub lookups_waited: u64,
    pub enabled: bool,
}

impl ConcurrencyStats {
    /// Fraction of lookups that had to wait
    pub fn wait_rate(&self) -> f64 {
        if self.lookups_acquired == 0 {
            0.0
        } else {
            self.lookups_waited as f64 / self.lookups_acquired as f64
        }
    }

    pub fn in_use(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.max_concurrent_lookups
            .saturating_sub(self.available_permits)
    }
}
