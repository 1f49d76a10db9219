//! Periodic cache maintenance.
//!
//! Owns the background timers: the expired-entry sweep and any forced
//! revalidation cadences. Nothing starts at construction; callers decide when
//! via [`Maintenance::start`] and [`Maintenance::stop`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::config::{CacheSettings, RevalidationSchedule};
use super::store::Cache;

/// Shortest timer period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct Maintenance {
    cache: Cache,
    sweep_interval: Duration,
    schedules: Vec<RevalidationSchedule>,
    handles: Vec<JoinHandle<()>>,
}

impl Maintenance {
    /// A zero `sweep_interval` is raised to the shortest supported period.
    pub fn new(cache: Cache, sweep_interval: Duration) -> Self {
        Self {
            cache,
            sweep_interval: clamp_period("sweep", sweep_interval),
            schedules: Vec::new(),
            handles: Vec::new(),
        }
    }

    pub fn from_settings(cache: Cache, settings: &CacheSettings) -> Self {
        settings.revalidate.iter().fold(
            Self::new(cache, settings.sweep_interval),
            |maintenance, schedule| maintenance.with_revalidation(*schedule),
        )
    }

    /// Force a namespace to be refetched on a fixed cadence.
    pub fn with_revalidation(mut self, schedule: RevalidationSchedule) -> Self {
        self.schedules.push(RevalidationSchedule {
            every: clamp_period(schedule.namespace.as_str(), schedule.every),
            ..schedule
        });
        self
    }

    /// True while every spawned timer is still alive.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && self.handles.iter().all(|handle| !handle.is_finished())
    }

    /// Spawn the timers on the current tokio runtime. Calling it while
    /// already running does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }

        let cache = self.cache.clone();
        let period = self.sweep_interval;
        self.handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                let removed = cache.cleanup();
                debug!(removed, "Cache sweep finished");
            }
        }));

        for schedule in &self.schedules {
            let cache = self.cache.clone();
            let RevalidationSchedule { namespace, every } = *schedule;
            self.handles.push(tokio::spawn(async move {
                let mut ticker = interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let removed = cache.delete_prefix(&namespace.prefix());
                    debug!(%namespace, removed, "Forced revalidation");
                }
            }));
        }

        info!(
            sweep_interval = ?self.sweep_interval,
            revalidation_schedules = self.schedules.len(),
            "Cache maintenance started"
        );
    }

    /// Abort the timers. Safe to call when not running.
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Cache maintenance stopped");
    }
}

fn clamp_period(timer: &str, period: Duration) -> Duration {
    if period >= MIN_PERIOD {
        return period;
    }
    warn!(timer, ?period, minimum = ?MIN_PERIOD, "Timer period too short; raised to minimum");
    MIN_PERIOD
}

impl Drop for Maintenance {
    fn drop(&mut self) {
        self.stop();
    }
}
