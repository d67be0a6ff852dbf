use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::debug;
use parking_lot::Mutex;

use crate::channel::{ReplaySubject, Subscription};
use crate::engine::material::{MaterialHandle, MaterialPatch};
use crate::scene::{NodeKind, SceneNode};
use crate::services::scene_graph::SceneGraphService;

/// Harvests the materials of every loaded mesh and shares them by name.
///
/// The first material seen with a given name becomes the shared instance;
/// later slots using the same name are pointed at it, so one patch reaches
/// every mesh that uses the name.
pub struct MaterialService {
    scene_graph: Arc<SceneGraphService>,
    materials: ReplaySubject<IndexMap<String, MaterialHandle>>,
    subscription: Mutex<Option<Subscription>>,
}

impl MaterialService {
    pub fn new(scene_graph: Arc<SceneGraphService>) -> Arc<Self> {
        let service = Arc::new(Self {
            scene_graph: Arc::clone(&scene_graph),
            materials: ReplaySubject::new(),
            subscription: Mutex::new(None),
        });
        let weak: Weak<Self> = Arc::downgrade(&service);
        let subscription = scene_graph.objects().subscribe(move |_: &Vec<SceneNode>| {
            if let Some(service) = weak.upgrade() {
                service.harvest();
            }
        });
        *service.subscription.lock() = Some(subscription);
        service
    }

    /// Current material set, keyed by name in discovery order.
    pub fn materials(&self) -> ReplaySubject<IndexMap<String, MaterialHandle>> {
        self.materials.clone()
    }

    pub fn material(&self, name: &str) -> Option<MaterialHandle> {
        self.materials.latest()?.get(name).cloned()
    }

    /// Applies each patch to the material of the same name and marks it for
    /// re-upload. Returns how many materials changed.
    pub fn set_material_properties(&self, patches: &IndexMap<String, MaterialPatch>) -> usize {
        let Some(materials) = self.materials.latest() else {
            return 0;
        };
        patches
            .iter()
            .filter_map(|(name, patch)| {
                let handle = materials.get(name)?;
                handle.write().apply(patch).then_some(())
            })
            .count()
    }

    /// Applies one patch to every known material.
    pub fn patch_all(&self, patch: &MaterialPatch) -> usize {
        let Some(materials) = self.materials.latest() else {
            return 0;
        };
        materials
            .values()
            .filter(|handle| handle.write().apply(patch))
            .count()
    }

    fn harvest(&self) {
        let (registry, shared) = self.scene_graph.update_objects(|objects| {
            let mut registry: IndexMap<String, MaterialHandle> = IndexMap::new();
            let mut shared = 0;
            for object in objects.iter_mut() {
                object.traverse_mut(&mut |node| {
                    let NodeKind::Mesh { materials } = &mut node.kind else {
                        return;
                    };
                    for slot in materials.iter_mut() {
                        let name = slot.read().name.clone();
                        match registry.get(&name) {
                            Some(first) if !Arc::ptr_eq(first, slot) => {
                                *slot = Arc::clone(first);
                                shared += 1;
                            }
                            Some(_) => {}
                            None => {
                                registry.insert(name, Arc::clone(slot));
                            }
                        }
                    }
                });
            }
            (registry, shared)
        });
        debug!(
            "harvested {} materials ({shared} slots now shared)",
            registry.len()
        );
        self.materials.publish(registry);
    }
}
