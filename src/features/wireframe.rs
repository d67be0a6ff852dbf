use std::any::Any;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::channel::{ReplaySubject, Subscription};
use crate::config::{Color, FeatureConfig};
use crate::context::ServiceContext;
use crate::engine::material::{MaterialHandle, MaterialPatch};
use crate::error::FeatureError;
use crate::features::{parse_settings, Feature, FeatureId};
use crate::services::material::MaterialService;
use crate::services::render::RenderService;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireframeSettings {
    #[serde(default)]
    color: Option<Color>,
}

struct Tracked {
    handle: MaterialHandle,
    original_color: Color,
}

#[derive(Default)]
struct WireframeState {
    color: Option<Color>,
    tracked: IndexMap<String, Tracked>,
    subscription: Option<Subscription>,
}

/// Renders every harvested material as wireframe while enabled.
pub struct WireframeFeature {
    me: Weak<Self>,
    materials: Arc<MaterialService>,
    render: Arc<RenderService>,
    enabled: ReplaySubject<bool>,
    state: Mutex<WireframeState>,
}

impl WireframeFeature {
    pub fn new(context: &ServiceContext) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            materials: Arc::clone(&context.materials),
            render: Arc::clone(&context.render),
            enabled: ReplaySubject::with_value(false),
            state: Mutex::new(WireframeState::default()),
        })
    }

    /// Names of the materials currently switched to wireframe.
    pub fn tracked(&self) -> Vec<String> {
        self.state.lock().tracked.keys().cloned().collect()
    }

    fn apply(&self, materials: &IndexMap<String, MaterialHandle>) {
        let mut state = self.state.lock();
        let color = state.color;
        for (name, handle) in materials {
            if state.tracked.contains_key(name) {
                continue;
            }
            let mut material = handle.write();
            let original_color = material.color;
            material.apply(&MaterialPatch {
                wireframe: Some(true),
                color,
                ..MaterialPatch::default()
            });
            state.tracked.insert(
                name.clone(),
                Tracked {
                    handle: Arc::clone(handle),
                    original_color,
                },
            );
        }
    }

    fn restore(&self) {
        let tracked = std::mem::take(&mut self.state.lock().tracked);
        let recolored = self.state.lock().color.is_some();
        for tracked in tracked.into_values() {
            tracked.handle.write().apply(&MaterialPatch {
                wireframe: Some(false),
                color: recolored.then_some(tracked.original_color),
                ..MaterialPatch::default()
            });
        }
    }

    fn refresh(&self) {
        if !self.render.is_continuous() {
            self.render.render_single_frame();
        }
    }
}

impl Feature for WireframeFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Wireframe
    }

    fn enabled(&self) -> ReplaySubject<bool> {
        self.enabled.clone()
    }

    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError> {
        let settings: WireframeSettings = parse_settings(self.id(), config)?;
        self.state.lock().color = settings.color;
        self.set_enabled(true);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        if self.enabled.latest() == Some(enabled) {
            return;
        }
        if enabled {
            let weak = self.me.clone();
            let subscription = self.materials.materials().subscribe(move |materials| {
                if let Some(feature) = weak.upgrade() {
                    feature.apply(materials);
                }
            });
            self.state.lock().subscription = Some(subscription);
        } else {
            let subscription = self.state.lock().subscription.take();
            drop(subscription);
            self.restore();
        }
        self.enabled.publish(enabled);
        self.refresh();
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::material::Material;
    use crate::scene::SceneNode;
    use serde_json::json;

    fn truck() -> SceneNode {
        SceneNode::group("Truck")
            .with_child(SceneNode::mesh("Body", vec![Material::new("Paint")]))
            .with_child(SceneNode::mesh("Cabin", vec![Material::new("Glass")]))
    }

    fn wireframes(context: &ServiceContext) -> Vec<bool> {
        context
            .materials
            .materials()
            .latest()
            .unwrap()
            .values()
            .map(|m| m.read().wireframe)
            .collect()
    }

    #[test]
    fn follows_materials_loaded_after_enabling() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = WireframeFeature::new(&context);
        feature.init(&FeatureConfig::enabled()).unwrap();

        let graph = &context.scene_graph;
        graph.add_object(graph.generation(), truck());
        assert_eq!(wireframes(&context), vec![true, true]);
        assert_eq!(feature.tracked(), vec!["Paint", "Glass"]);

        feature.set_enabled(false);
        assert_eq!(wireframes(&context), vec![false, false]);
        assert!(feature.tracked().is_empty());
    }

    #[test]
    fn optional_color_is_restored_on_disable() {
        let context = ServiceContext::offscreen_for_tests();
        let graph = &context.scene_graph;
        graph.add_object(graph.generation(), truck());

        let feature = WireframeFeature::new(&context);
        feature
            .init(&FeatureConfig::enabled().with_setting("color", json!("#00ff00")))
            .unwrap();
        let paint = context.materials.material("Paint").unwrap();
        assert_eq!(paint.read().color.to_hex(), "#00ff00");
        feature.set_enabled(false);
        assert_eq!(paint.read().color, Color::WHITE);
    }
}
