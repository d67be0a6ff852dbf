use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::channel::{ReplaySubject, Subscription};
use crate::config::ViewerConfig;
use crate::features::registry::FeatureRegistry;
use crate::features::{Feature, FeatureId};
use crate::services::config::ConfigService;

/// A feature whose resolution or `init` failed for the current
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFailure {
    pub id: FeatureId,
    pub message: String,
}

/// Keeps the set of active features in line with the configuration.
///
/// Every new configuration starts from a clean slate: all active features
/// are disabled and dropped before any feature of the new configuration is
/// initialized.
pub struct FeatureService {
    registry: Arc<FeatureRegistry>,
    active: Mutex<IndexMap<FeatureId, Arc<dyn Feature>>>,
    active_ids: ReplaySubject<Vec<FeatureId>>,
    failures: ReplaySubject<Vec<FeatureFailure>>,
    subscription: Mutex<Option<Subscription>>,
}

impl FeatureService {
    pub fn new(config: &ConfigService, registry: Arc<FeatureRegistry>) -> Arc<Self> {
        let service = Arc::new(Self {
            registry,
            active: Mutex::new(IndexMap::new()),
            active_ids: ReplaySubject::with_value(Vec::new()),
            failures: ReplaySubject::with_value(Vec::new()),
            subscription: Mutex::new(None),
        });
        let weak: Weak<Self> = Arc::downgrade(&service);
        let subscription = config.get_config().subscribe(move |config| {
            if let Some(service) = weak.upgrade() {
                service.apply_config(config);
            }
        });
        *service.subscription.lock() = Some(subscription);
        service
    }

    /// Ids of the features initialized for the current configuration.
    pub fn active(&self) -> ReplaySubject<Vec<FeatureId>> {
        self.active_ids.clone()
    }

    /// Features that failed for the current configuration.
    pub fn failures(&self) -> ReplaySubject<Vec<FeatureFailure>> {
        self.failures.clone()
    }

    pub fn active_feature(&self, id: &FeatureId) -> Option<Arc<dyn Feature>> {
        self.active.lock().get(id).cloned()
    }

    pub fn apply_config(&self, config: &ViewerConfig) {
        self.disable_all();

        let mut started = IndexMap::new();
        let mut failures = Vec::new();
        for (id, feature_config) in config.enabled_features() {
            let result = self.registry.get_feature_instance(id).and_then(|feature| {
                feature.init(feature_config)?;
                Ok(feature)
            });
            match result {
                Ok(feature) => {
                    debug!("feature {id} initialized");
                    started.insert(id.clone(), feature);
                }
                Err(err) => {
                    warn!("feature {id} failed to initialize: {err}");
                    failures.push(FeatureFailure {
                        id: id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let ids: Vec<_> = started.keys().cloned().collect();
        info!("{} features active", ids.len());
        *self.active.lock() = started;
        self.active_ids.publish(ids);
        self.failures.publish(failures);
    }

    /// Disables and drops every active feature.
    pub fn disable_all(&self) {
        let previous = std::mem::take(&mut *self.active.lock());
        if previous.is_empty() {
            return;
        }
        for (id, feature) in previous {
            debug!("disabling feature {id}");
            feature.set_enabled(false);
        }
        self.active_ids.publish(Vec::new());
    }

    /// Forwards to the active feature. Returns `false` when the feature is
    /// not active.
    pub fn set_feature_enabled(&self, id: &FeatureId, enabled: bool) -> bool {
        let Some(feature) = self.active_feature(id) else {
            debug!("feature {id} is not active; ignoring set_enabled({enabled})");
            return false;
        };
        debug!("feature {id} set_enabled({enabled})");
        feature.set_enabled(enabled);
        true
    }
}
