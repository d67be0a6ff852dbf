//! Composition root wiring the viewer's services together.

use std::sync::Arc;

use crate::clock::Clock;
use crate::engine::loader::AssetLoader;
use crate::engine::RenderBackend;
use crate::features::{FeatureRegistry, FeatureService};
use crate::services::{
    AnimationService, AssetService, ConfigService, ControlService, LightService,
    MaterialService, RenderService, SceneGraphService, TaskQueue,
};

/// Every service a viewer instance owns. Features receive a reference to
/// this when they are constructed and keep the handles they need.
pub struct ServiceContext {
    pub clock: Arc<dyn Clock>,
    pub tasks: Arc<TaskQueue>,
    pub scene_graph: Arc<SceneGraphService>,
    pub render: Arc<RenderService>,
    pub controls: Arc<ControlService>,
    pub assets: Arc<AssetService>,
    pub lights: Arc<LightService>,
    pub materials: Arc<MaterialService>,
    pub animations: Arc<AnimationService>,
    pub config: Arc<ConfigService>,
    pub registry: Arc<FeatureRegistry>,
    pub features: Arc<FeatureService>,
}

impl ServiceContext {
    /// Builds the services in dependency order. The render service listens
    /// to configuration changes before the feature service does, so camera
    /// and render sections are in place when features initialise.
    pub fn new(
        backend: Box<dyn RenderBackend>,
        loader: Arc<dyn AssetLoader>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let tasks = Arc::new(TaskQueue::new());
        let scene_graph = Arc::new(SceneGraphService::new());
        let render = Arc::new(RenderService::new(
            Arc::clone(&scene_graph),
            backend,
            Arc::clone(&clock),
        ));
        let controls = ControlService::new(Arc::clone(&render));
        let assets = Arc::new(AssetService::new(loader, Arc::clone(&render)));
        let lights = Arc::new(LightService::new(Arc::clone(&scene_graph)));
        let materials = MaterialService::new(Arc::clone(&scene_graph));
        let animations = AnimationService::new(&scene_graph, &render);

        let config = Arc::new(ConfigService::new());
        render.connect(&config.get_config());

        let registry = Arc::new(FeatureRegistry::new());
        let features = FeatureService::new(&config, Arc::clone(&registry));

        let context = Arc::new(Self {
            clock,
            tasks,
            scene_graph,
            render,
            controls,
            assets,
            lights,
            materials,
            animations,
            config,
            registry,
            features,
        });
        context.registry.attach(Arc::downgrade(&context));
        context
    }
}

#[cfg(test)]
impl ServiceContext {
    /// Offscreen context with the built-in features registered and a
    /// 100x100 target attached.
    pub(crate) fn for_tests() -> (
        Arc<Self>,
        Arc<crate::engine::loader::MemoryAssetLoader>,
        Arc<crate::clock::ManualClock>,
    ) {
        use crate::config::ViewerConfig;
        use crate::engine::headless::HeadlessRenderer;
        use crate::engine::loader::MemoryAssetLoader;
        use crate::viewport::RenderTarget;

        let loader = Arc::new(MemoryAssetLoader::new());
        let clock = Arc::new(crate::clock::ManualClock::new());
        let context = Self::new(
            Box::new(HeadlessRenderer::offscreen()),
            loader.clone(),
            clock.clone(),
        );
        crate::features::register_built_in(&context.registry)
            .expect("fresh registry accepts the built-ins");
        context
            .render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(100, 100))
            .expect("headless renderer draws offscreen");
        (context, loader, clock)
    }

    pub(crate) fn offscreen_for_tests() -> Arc<Self> {
        Self::for_tests().0
    }
}
