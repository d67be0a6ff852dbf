use std::any::Any;
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::channel::{ReplaySubject, Subscription};
use crate::config::FeatureConfig;
use crate::context::ServiceContext;
use crate::engine::material::MaterialPatch;
use crate::engine::texture::{CubeTexture, EnvironmentMap};
use crate::error::{FeatureError, LoadError};
use crate::features::{parse_settings, Feature, FeatureId};
use crate::scene::Background;
use crate::services::asset::AssetService;
use crate::services::material::MaterialService;
use crate::services::render::RenderService;
use crate::services::scene_graph::SceneGraphService;
use crate::services::tasks::TaskQueue;

fn default_resolution() -> u32 {
    256
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkyboxSettings {
    #[serde(default)]
    cube_texture: Option<String>,
    #[serde(default)]
    environment_map: Option<String>,
    #[serde(default = "default_resolution")]
    resolution: u32,
    #[serde(default = "default_true")]
    use_as_environment: bool,
}

#[derive(Default)]
struct SkyboxState {
    settings: Option<SkyboxSettings>,
    /// Bumped on every enable and disable; loads from older epochs are
    /// dropped on arrival.
    epoch: u64,
    environment: Option<EnvironmentMap>,
    subscription: Option<Subscription>,
}

/// Cube-texture or environment-map background, optionally used as the
/// scene's lighting environment.
pub struct SkyboxFeature {
    me: Weak<Self>,
    assets: Arc<AssetService>,
    tasks: Arc<TaskQueue>,
    scene_graph: Arc<SceneGraphService>,
    materials: Arc<MaterialService>,
    render: Arc<RenderService>,
    enabled: ReplaySubject<bool>,
    state: Mutex<SkyboxState>,
}

impl SkyboxFeature {
    pub fn new(context: &ServiceContext) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            assets: Arc::clone(&context.assets),
            tasks: Arc::clone(&context.tasks),
            scene_graph: Arc::clone(&context.scene_graph),
            materials: Arc::clone(&context.materials),
            render: Arc::clone(&context.render),
            enabled: ReplaySubject::with_value(false),
            state: Mutex::new(SkyboxState::default()),
        })
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().epoch == epoch
    }

    fn start_loads(&self, settings: &SkyboxSettings, epoch: u64) {
        if let Some(name) = &settings.cube_texture {
            let load = self.assets.load_cube_texture(name);
            let weak = self.me.clone();
            self.tasks.spawn(async move {
                let result = load.await;
                if let Some(feature) = weak.upgrade() {
                    feature.on_cube_texture(epoch, result);
                }
            });
        }
        if let Some(path) = &settings.environment_map {
            let load = self.assets.load_environment_map(path, settings.resolution);
            let weak = self.me.clone();
            let use_as_environment = settings.use_as_environment;
            let as_background = settings.cube_texture.is_none();
            self.tasks.spawn(async move {
                let result = load.await;
                if let Some(feature) = weak.upgrade() {
                    feature.on_environment_map(epoch, result, use_as_environment, as_background);
                }
            });
        }
    }

    fn on_cube_texture(&self, epoch: u64, result: Result<CubeTexture, LoadError>) {
        match result {
            Ok(cube) if self.is_current(epoch) => {
                self.scene_graph.set_background(Some(Background::Cube(cube)));
                self.refresh();
            }
            Ok(cube) => debug!("ignoring late skybox {}", cube.name),
            Err(err) => warn!("skybox cube texture failed: {err}"),
        }
    }

    fn on_environment_map(
        &self,
        epoch: u64,
        result: Result<EnvironmentMap, LoadError>,
        use_as_environment: bool,
        as_background: bool,
    ) {
        let map = match result {
            Ok(map) if self.is_current(epoch) => map,
            Ok(map) => {
                debug!("ignoring late environment map {}", map.source);
                return;
            }
            Err(err) => {
                warn!("skybox environment map failed: {err}");
                return;
            }
        };
        if as_background {
            self.scene_graph
                .set_background(Some(Background::Environment(map.clone())));
        }
        if use_as_environment {
            self.scene_graph.set_environment(Some(map.clone()));
            self.state.lock().environment = Some(map);
            let weak = self.me.clone();
            let subscription = self.materials.materials().subscribe(move |_| {
                if let Some(feature) = weak.upgrade() {
                    feature.apply_environment();
                }
            });
            self.state.lock().subscription = Some(subscription);
        }
        self.refresh();
    }

    fn apply_environment(&self) {
        let environment = self.state.lock().environment.clone();
        if let Some(map) = environment {
            self.materials.patch_all(&MaterialPatch::env_map(Some(map)));
        }
    }

    fn refresh(&self) {
        if !self.render.is_continuous() {
            self.render.render_single_frame();
        }
    }
}

impl Feature for SkyboxFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Skybox
    }

    fn enabled(&self) -> ReplaySubject<bool> {
        self.enabled.clone()
    }

    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError> {
        let settings: SkyboxSettings = parse_settings(self.id(), config)?;
        if settings.cube_texture.is_none() && settings.environment_map.is_none() {
            return Err(FeatureError::InvalidConfig {
                id: self.id(),
                message: "either cubeTexture or environmentMap is required".into(),
            });
        }
        self.state.lock().settings = Some(settings);
        self.set_enabled(true);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        if self.enabled.latest() == Some(enabled) {
            return;
        }
        let (settings, epoch, subscription, had_environment) = {
            let mut state = self.state.lock();
            state.epoch += 1;
            (
                state.settings.clone(),
                state.epoch,
                state.subscription.take(),
                state.environment.take().is_some(),
            )
        };
        drop(subscription);

        if enabled {
            if let Some(settings) = settings {
                self.start_loads(&settings, epoch);
            }
        } else {
            self.scene_graph.set_background(None);
            self.scene_graph.set_environment(None);
            if had_environment {
                self.materials.patch_all(&MaterialPatch::env_map(None));
            }
            self.refresh();
        }
        self.enabled.publish(enabled);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
