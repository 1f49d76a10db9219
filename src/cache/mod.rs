//! StartupCoders cache system
//!
//! An in-process stale-while-revalidate cache for expensive reads:
//!
//! - **Fresh** entries are served as-is.
//! - **Stale** entries are served immediately while a single background
//!   refresh replaces them.
//! - **Expired** entries are refetched before returning.
//!
//! Write paths keep it coherent through [`Invalidator`], and
//! [`Maintenance`] sweeps expired entries on a timer.
//!
//! ## Configuration
//!
//! Windows and timers come from the `[cache]` section:
//!
//! ```toml
//! [cache]
//! fresh_window_ms = 300000
//! total_window_ms = 600000
//! sweep_interval_secs = 600
//! # list_revalidate_secs = 60
//! ```

mod config;
mod events;
mod invalidate;
mod keys;
mod lock;
mod maintenance;
mod planner;
mod store;

pub use config::{CacheConfig, CacheSettings, Freshness, InvalidWindows, RevalidationSchedule};
pub use events::Mutation;
pub use invalidate::Invalidator;
pub use keys::{Namespace, access_key, list_key, profile_key, startup_key, tags_key};
pub use maintenance::Maintenance;
pub use planner::{Invalidation, InvalidationPlan};
pub use store::{Cache, CacheError, CacheStats};
