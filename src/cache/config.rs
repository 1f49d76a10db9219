//! Cache configuration.
//!
//! Freshness windows for the stale-while-revalidate store and the cadence of
//! its maintenance tasks, resolved from the `[cache]` section of
//! `startupcoders.toml`.

use std::time::Duration;

use thiserror::Error;

use super::keys::Namespace;

// Default values for cache configuration
const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_TOTAL_WINDOW: Duration = Duration::from_secs(10 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Rejected window pair: the stale window would end before the fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("total window {total:?} must not be shorter than fresh window {fresh:?}")]
pub struct InvalidWindows {
    pub fresh: Duration,
    pub total: Duration,
}

/// Where an entry sits on its freshness timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served as-is, no fetch.
    Fresh,
    /// Served as-is while a background refresh runs.
    Stale,
    /// Must be fetched again before it can be served.
    Expired,
}

/// Freshness windows applied to a cache entry.
///
/// An entry is fresh while `age < fresh_window`, stale while
/// `fresh_window <= age < total_window`, and expired afterwards. The pair can
/// only be built through [`CacheConfig::new`], so `total_window >= fresh_window`
/// always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    fresh_window: Duration,
    total_window: Duration,
}

impl CacheConfig {
    pub fn new(fresh_window: Duration, total_window: Duration) -> Result<Self, InvalidWindows> {
        if total_window < fresh_window {
            return Err(InvalidWindows {
                fresh: fresh_window,
                total: total_window,
            });
        }
        Ok(Self {
            fresh_window,
            total_window,
        })
    }

    /// Millisecond convenience constructor matching the settings file units.
    pub fn from_millis(fresh_ms: u64, total_ms: u64) -> Result<Self, InvalidWindows> {
        Self::new(
            Duration::from_millis(fresh_ms),
            Duration::from_millis(total_ms),
        )
    }

    pub fn fresh_window(&self) -> Duration {
        self.fresh_window
    }

    pub fn total_window(&self) -> Duration {
        self.total_window
    }

    /// Classify an entry of the given age.
    pub fn classify(&self, age: Duration) -> Freshness {
        if age < self.fresh_window {
            Freshness::Fresh
        } else if age < self.total_window {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_window: DEFAULT_FRESH_WINDOW,
            total_window: DEFAULT_TOTAL_WINDOW,
        }
    }
}

/// A namespace that is force-invalidated on a fixed cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationSchedule {
    pub namespace: Namespace,
    pub every: Duration,
}

/// Store-wide cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Windows used when a call does not supply its own.
    pub defaults: CacheConfig,
    /// Period of the expired-entry sweep.
    pub sweep_interval: Duration,
    /// Forced revalidation cadences.
    pub revalidate: Vec<RevalidationSchedule>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            defaults: CacheConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            revalidate: Vec::new(),
        }
    }
}

impl From<&crate::config::CacheSection> for CacheSettings {
    fn from(section: &crate::config::CacheSection) -> Self {
        let revalidate = section
            .list_revalidate
            .map(|every| RevalidationSchedule {
                namespace: Namespace::Startups,
                every,
            })
            .into_iter()
            .collect();

        Self {
            defaults: section.windows,
            sweep_interval: section.sweep_interval,
            revalidate,
        }
    }
}
