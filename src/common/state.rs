use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::registry::SensorRegistry;
use crate::source::ReadingSource;
use crate::store::{AlarmPolicy, DashboardStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SensorRegistry>,
    pub source: Arc<ReadingSource>,
    pub store: Arc<DashboardStore>,
}

impl AppState {
    /// Wire up registry, reading source, and store from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a configured sensors file cannot be loaded.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let registry = Arc::new(SensorRegistry::from_config(&config)?);
        let source = Arc::new(ReadingSource::from_config(&config));
        let store = Arc::new(DashboardStore::new(
            Arc::clone(&source),
            AlarmPolicy::from_config(&config),
        ));

        Ok(Self {
            config: Arc::new(config),
            registry,
            source,
            store,
        })
    }
}
