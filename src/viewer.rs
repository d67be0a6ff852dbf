//! Public entry points: the launcher that builds viewers and the viewer
//! handle embedders drive.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::config::ViewerConfig;
use crate::context::ServiceContext;
use crate::engine::headless::HeadlessRenderer;
use crate::engine::loader::AssetLoader;
use crate::engine::RenderBackend;
use crate::error::{FeatureError, ViewerResult};
use crate::features::{self, Feature, FeatureConstructor, FeatureId};
use crate::input::PointerEvent;
use crate::viewport::RenderTarget;

/// Produces viewers that share an asset loader, a clock and the set of
/// registered features.
pub struct ViewerLauncher {
    loader: Arc<dyn AssetLoader>,
    clock: Arc<dyn Clock>,
    custom: RwLock<IndexMap<FeatureId, FeatureConstructor>>,
}

impl ViewerLauncher {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self::with_clock(loader, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(loader: Arc<dyn AssetLoader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            loader,
            clock,
            custom: RwLock::new(IndexMap::new()),
        }
    }

    /// Adds a feature beyond the built-in set. Viewers created afterwards
    /// can enable it by id.
    pub fn register_feature<F>(&self, id: impl Into<FeatureId>, constructor: F) -> Result<(), FeatureError>
    where
        F: Fn(&ServiceContext) -> Result<Arc<dyn Feature>, FeatureError> + Send + Sync + 'static,
    {
        let id = id.into();
        let mut custom = self.custom.write();
        if id.is_built_in() || custom.contains_key(&id) {
            return Err(FeatureError::FeatureAlreadyRegistered(id));
        }
        custom.insert(id, Arc::new(constructor));
        Ok(())
    }

    /// Wires a fresh set of services around `backend` and binds it to
    /// `target`.
    pub fn create_viewer(
        &self,
        backend: Box<dyn RenderBackend>,
        target: RenderTarget,
    ) -> ViewerResult<Viewer> {
        let context = ServiceContext::new(backend, Arc::clone(&self.loader), Arc::clone(&self.clock));
        features::register_built_in(&context.registry)?;
        for (id, constructor) in self.custom.read().iter() {
            let constructor = Arc::clone(constructor);
            context
                .registry
                .register_feature(id.clone(), move |services| constructor(services))?;
        }
        let size = context.render.attach_target(target)?;
        debug!("viewer bound to a {}x{} target", size.width, size.height);
        Ok(Viewer { context })
    }

    /// Viewer drawing into a size-only buffer, for headless image
    /// generation.
    pub fn create_offscreen_viewer(&self, width: u32, height: u32) -> ViewerResult<Viewer> {
        self.create_viewer(
            Box::new(HeadlessRenderer::offscreen()),
            RenderTarget::offscreen(width, height),
        )
    }
}

/// One embedded viewer. All state is observed through the channels of the
/// services returned by [`Viewer::services`].
pub struct Viewer {
    context: Arc<ServiceContext>,
}

impl Viewer {
    pub fn services(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    /// Replaces the current configuration. Objects of the previous
    /// configuration are removed right away; loads still in flight for them
    /// are dropped when they arrive.
    pub fn init(&self, config: ViewerConfig) {
        let generation = self.context.scene_graph.clear_objects();
        let config = self.context.config.load_config(config);
        info!(
            "loading {} object(s) for generation {generation}",
            config.objects.len()
        );

        for setup in &config.objects {
            let load = self.context.assets.load_object(&setup.path);
            let name = setup.name.clone();
            let context = Arc::downgrade(&self.context);
            self.context.tasks.spawn(async move {
                let result = load.await;
                let Some(context) = context.upgrade() else {
                    return;
                };
                match result {
                    Ok(mut node) => {
                        node.name = name.clone();
                        if !context.scene_graph.add_object(generation, node) {
                            return;
                        }
                        if let Some(node) = context.scene_graph.object(&name) {
                            context.assets.announce_object(node);
                        }
                        if !context.render.is_continuous() {
                            context.render.render_single_frame();
                        }
                    }
                    Err(err) => warn!("object {name} failed to load: {err}"),
                }
            });
        }
        self.context.render.render_single_frame();
    }

    /// One display refresh: resolves finished loads, applies a due resize
    /// and renders when the continuous loop is installed.
    pub fn tick(&self) -> bool {
        self.context.tasks.run_until_stalled();
        self.context.render.animation_frame()
    }

    pub fn on_window_resize(&self) {
        self.context.render.schedule_resize();
    }

    pub fn handle_pointer(&self, event: PointerEvent) {
        self.context.controls.dispatch_pointer(event);
    }

    pub fn set_feature_enabled(&self, id: impl Into<FeatureId>, enabled: bool) -> bool {
        self.context.features.set_feature_enabled(&id.into(), enabled)
    }

    /// Disables every active feature and empties the scene.
    pub fn dispose(&self) {
        self.context.features.disable_all();
        self.context.scene_graph.clear_objects();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ReplaySubject;
    use crate::config::FeatureConfig;
    use crate::engine::loader::{MemoryAssetLoader, NodeManifest};
    use crate::error::ViewerError;

    struct Marker {
        enabled: ReplaySubject<bool>,
    }

    impl Feature for Marker {
        fn id(&self) -> FeatureId {
            FeatureId::from("Marker")
        }

        fn enabled(&self) -> ReplaySubject<bool> {
            self.enabled.clone()
        }

        fn init(&self, _config: &FeatureConfig) -> Result<(), FeatureError> {
            self.enabled.publish(true);
            Ok(())
        }

        fn set_enabled(&self, enabled: bool) {
            self.enabled.publish(enabled);
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
            self
        }
    }

    fn launcher() -> ViewerLauncher {
        let loader = MemoryAssetLoader::new();
        loader.insert_object(
            "truck.json",
            NodeManifest {
                name: "root".into(),
                materials: vec!["Paint".into()],
                position: Default::default(),
                children: Vec::new(),
                animations: Vec::new(),
            },
        );
        ViewerLauncher::with_clock(Arc::new(loader), Arc::new(crate::clock::ManualClock::new()))
    }

    #[test]
    fn built_in_ids_cannot_be_registered_again() {
        let launcher = launcher();
        let result = launcher.register_feature("Wireframe", |_| unreachable!());
        assert_eq!(
            result,
            Err(FeatureError::FeatureAlreadyRegistered(FeatureId::Wireframe))
        );
    }

    #[test]
    fn custom_features_reach_every_viewer() {
        let launcher = launcher();
        launcher
            .register_feature("Marker", |_| {
                Ok(Arc::new(Marker {
                    enabled: ReplaySubject::with_value(false),
                }) as Arc<dyn Feature>)
            })
            .unwrap();
        let viewer = launcher.create_offscreen_viewer(64, 64).unwrap();
        let mut config = ViewerConfig::default();
        config
            .features
            .insert(FeatureId::from("Marker"), FeatureConfig::enabled());
        viewer.init(config);
        assert_eq!(
            viewer.services().features.active().latest(),
            Some(vec![FeatureId::from("Marker")])
        );
    }

    #[test]
    fn surface_backend_rejects_offscreen_target() {
        let launcher = launcher();
        let result = launcher.create_viewer(
            Box::new(HeadlessRenderer::surface()),
            RenderTarget::offscreen(10, 10),
        );
        assert!(matches!(result, Err(ViewerError::UnsupportedTarget { .. })));
    }

    #[test]
    fn objects_take_their_configured_name() {
        let viewer = launcher().create_offscreen_viewer(64, 64).unwrap();
        viewer.init(
            serde_json::from_str::<ViewerConfig>(
                r#"{"objects":[{"name":"Truck","path":"truck.json"}]}"#,
            )
            .unwrap(),
        );
        assert!(viewer.services().scene_graph.object("Truck").is_none());
        viewer.tick();
        assert!(viewer.services().scene_graph.object("Truck").is_some());

        viewer.dispose();
        assert!(viewer.services().scene_graph.all_objects().is_empty());
    }
}
