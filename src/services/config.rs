use std::sync::Arc;

use log::info;

use crate::channel::ReplaySubject;
use crate::config::ViewerConfig;

/// Single source of truth for the active configuration.
#[derive(Default)]
pub struct ConfigService {
    config: ReplaySubject<Arc<ViewerConfig>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current configuration and republishes it.
    pub fn load_config(&self, config: ViewerConfig) -> Arc<ViewerConfig> {
        let config = Arc::new(config);
        info!(
            "loading configuration: {} objects, {} features",
            config.objects.len(),
            config.features.len()
        );
        self.config.publish(Arc::clone(&config));
        config
    }

    /// Replays the latest configuration to new subscribers.
    pub fn get_config(&self) -> ReplaySubject<Arc<ViewerConfig>> {
        self.config.clone()
    }

    pub fn current(&self) -> Option<Arc<ViewerConfig>> {
        self.config.latest()
    }
}
