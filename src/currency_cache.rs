//! Time-bounded cache of the currencies the payment provider accepts.
//!
//! Reads prefer stale data over failure: when a refresh fails the last good
//! list is served, and an empty list when nothing was ever fetched.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::payments::PaymentGateway;

/// Source of monotonic time, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    currencies: Vec<String>,
    fetched_at: Instant,
}

pub struct CurrencyCache {
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl CurrencyCache {
    pub fn new(gateway: Arc<dyn PaymentGateway>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            gateway,
            clock,
            ttl,
            entry: Mutex::new(None),
        }
    }

    fn entry(&self) -> MutexGuard<'_, Option<Entry>> {
        self.entry.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Currencies accepted by the provider. Never fails.
    pub async fn currencies(&self) -> Vec<String> {
        let now = self.clock.now();
        let cached = self.entry().clone();

        if let Some(entry) = &cached {
            if now.saturating_duration_since(entry.fetched_at) < self.ttl {
                return entry.currencies.clone();
            }
        }

        // lock released before the provider call
        match self.gateway.available_currencies().await {
            Ok(currencies) => {
                info!(count = currencies.len(), "Refreshed provider currency list");
                *self.entry() = Some(Entry {
                    currencies: currencies.clone(),
                    fetched_at: self.clock.now(),
                });
                currencies
            }
            Err(e) => {
                warn!(error = %e, stale = cached.is_some(), "Currency refresh failed");
                cached.map(|entry| entry.currencies).unwrap_or_default()
            }
        }
    }
}
