//! Runtime bootstrap: settings, telemetry and the shared cache.

use std::path::Path;

use tracing::info;

use crate::cache::{Cache, CacheSettings, Invalidator, Maintenance};
use crate::config::{self, Settings};

use super::error::InfraError;
use super::telemetry;

/// The cache and its background maintenance, built from settings.
pub struct CacheRuntime {
    cache: Cache,
    maintenance: Maintenance,
}

impl CacheRuntime {
    pub fn new(settings: &CacheSettings) -> Self {
        let cache = Cache::new(settings.defaults);
        let maintenance = Maintenance::from_settings(cache.clone(), settings);
        Self { cache, maintenance }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn invalidator(&self) -> Invalidator {
        Invalidator::new(self.cache.clone())
    }

    /// Start the sweep and revalidation timers. Requires a tokio runtime.
    pub fn start(&mut self) {
        self.maintenance.start();
    }

    pub fn is_running(&self) -> bool {
        self.maintenance.is_running()
    }

    /// Stop the timers and drop every entry.
    pub fn shutdown(&mut self) {
        self.maintenance.stop();
        self.cache.clear();
        info!("Cache runtime shut down");
    }
}

/// Load settings, install telemetry, and start the cache runtime.
pub fn bootstrap(explicit_file: Option<&Path>) -> Result<(Settings, CacheRuntime), InfraError> {
    let settings = config::load(explicit_file)?;
    telemetry::init(&settings.logging)?;

    let mut runtime = CacheRuntime::new(&CacheSettings::from(&settings.cache));
    runtime.start();

    info!(
        fresh_window = ?settings.cache.windows.fresh_window(),
        total_window = ?settings.cache.windows.total_window(),
        "Cache runtime ready"
    );
    Ok((settings, runtime))
}
