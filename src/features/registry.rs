use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::channel::ReplaySubject;
use crate::context::ServiceContext;
use crate::error::FeatureError;
use crate::features::{Feature, FeatureId};

/// Builds a feature from the viewer's services.
pub type FeatureConstructor =
    Arc<dyn Fn(&ServiceContext) -> Result<Arc<dyn Feature>, FeatureError> + Send + Sync>;

/// Maps feature ids to constructors and caches one instance per id.
///
/// Instances are built through the attached [`ServiceContext`]; the
/// launcher attaches it right after the services are wired.
#[derive(Default)]
pub struct FeatureRegistry {
    constructors: RwLock<IndexMap<FeatureId, FeatureConstructor>>,
    instances: Mutex<HashMap<FeatureId, Arc<dyn Feature>>>,
    context: RwLock<Option<Weak<ServiceContext>>>,
    registered: ReplaySubject<Vec<FeatureId>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, context: Weak<ServiceContext>) {
        *self.context.write() = Some(context);
    }

    pub fn register_feature<F>(&self, id: FeatureId, constructor: F) -> Result<(), FeatureError>
    where
        F: Fn(&ServiceContext) -> Result<Arc<dyn Feature>, FeatureError> + Send + Sync + 'static,
    {
        let ids = {
            let mut constructors = self.constructors.write();
            if constructors.contains_key(&id) {
                return Err(FeatureError::FeatureAlreadyRegistered(id));
            }
            debug!("registered feature {id}");
            constructors.insert(id, Arc::new(constructor));
            constructors.keys().cloned().collect()
        };
        self.registered.publish(ids);
        Ok(())
    }

    pub fn is_registered(&self, id: &FeatureId) -> bool {
        self.constructors.read().contains_key(id)
    }

    /// Registered ids, in registration order.
    pub fn features(&self) -> ReplaySubject<Vec<FeatureId>> {
        self.registered.clone()
    }

    /// Resolves the singleton instance for `id`, building it on first use.
    pub fn get_feature_instance(&self, id: &FeatureId) -> Result<Arc<dyn Feature>, FeatureError> {
        if let Some(instance) = self.instances.lock().get(id) {
            return Ok(Arc::clone(instance));
        }
        let constructor = self
            .constructors
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FeatureError::FeatureNotRegistered(id.clone()))?;
        let context = self
            .context
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(FeatureError::MissingComponentRegistry)?;

        let instance = constructor(&context)?;
        Ok(Arc::clone(
            self.instances
                .lock()
                .entry(id.clone())
                .or_insert(instance),
        ))
    }

    /// Resolves an instance and downcasts it to its concrete type.
    pub fn get_feature<T>(&self, id: &FeatureId) -> Result<Arc<T>, FeatureError>
    where
        T: Feature + 'static,
    {
        self.get_feature_instance(id)?
            .as_any()
            .downcast::<T>()
            .map_err(|_| FeatureError::FeatureNotRegistered(id.clone()))
    }
}
