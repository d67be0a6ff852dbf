use std::path::Path;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use log::warn;

use crate::channel::Subject;
use crate::engine::loader::{AssetLoader, LoadFuture};
use crate::engine::texture::{CubeTexture, EnvironmentMap, Texture};
use crate::error::LoadError;
use crate::scene::SceneNode;
use crate::services::loading::LoadingManager;
use crate::services::render::RenderService;

/// Lower-case extension of the last path segment, ignoring any query.
fn extension_of(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn check_extension(path: &str, accepted: &[&'static str]) -> Result<(), LoadError> {
    let extension = extension_of(path).unwrap_or_default();
    if accepted.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(LoadError::UnsupportedExtension {
            path: path.to_string(),
            extension,
        })
    }
}

/// Asynchronous loading of objects, textures, cube textures and
/// environment maps through the engine's loaders.
pub struct AssetService {
    loader: Arc<dyn AssetLoader>,
    render: Arc<RenderService>,
    loading: Arc<LoadingManager>,
    object_loaded: Subject<SceneNode>,
}

impl AssetService {
    pub fn new(loader: Arc<dyn AssetLoader>, render: Arc<RenderService>) -> Self {
        Self {
            loader,
            render,
            loading: Arc::new(LoadingManager::new()),
            object_loaded: Subject::new(),
        }
    }

    pub fn loading(&self) -> Arc<LoadingManager> {
        Arc::clone(&self.loading)
    }

    /// Fires once per loaded object after it joined the scene, with its
    /// materials already harvested.
    pub fn object_loaded(&self) -> Subject<SceneNode> {
        self.object_loaded.clone()
    }

    pub(crate) fn announce_object(&self, node: SceneNode) {
        self.object_loaded.publish(node);
    }

    pub fn load_object(&self, path: &str) -> LoadFuture<SceneNode> {
        if let Err(err) = check_extension(path, self.loader.object_extensions()) {
            return self.reject(path, err);
        }
        self.track(path, self.loader.load_object(path))
    }

    pub fn load_texture(&self, path: &str) -> LoadFuture<Texture> {
        if let Err(err) = check_extension(path, self.loader.texture_extensions()) {
            return self.reject(path, err);
        }
        self.track(path, self.loader.load_texture(path))
    }

    /// Loads the six faces `{name}/px.png` .. `{name}/nz.png`.
    pub fn load_cube_texture(&self, name: &str) -> LoadFuture<CubeTexture> {
        let faces: Vec<_> = CubeTexture::FACES
            .iter()
            .map(|face| self.load_texture(&format!("{name}/{face}.png")))
            .collect();
        let name = name.to_string();
        async move {
            let faces = future::try_join_all(faces).await?;
            Ok(CubeTexture { name, faces })
        }
        .boxed()
    }

    /// Loads a texture and pre-filters it into an environment map of the
    /// given resolution with the active renderer.
    pub fn load_environment_map(&self, path: &str, resolution: u32) -> LoadFuture<EnvironmentMap> {
        let texture = self.load_texture(path);
        let render = Arc::clone(&self.render);
        async move {
            let texture = texture.await?;
            render.prepare_environment(&texture, resolution).map_err(|err| {
                warn!("{err}");
                err
            })
        }
        .boxed()
    }

    fn track<T: Send + 'static>(&self, path: &str, request: LoadFuture<T>) -> LoadFuture<T> {
        self.loading.item_start(path);
        let loading = Arc::clone(&self.loading);
        let path = path.to_string();
        async move {
            let result = request.await;
            match &result {
                Ok(_) => loading.item_end(&path),
                Err(err) => loading.item_error(&path, &err.to_string()),
            }
            result
        }
        .boxed()
    }

    fn reject<T: Send + 'static>(&self, path: &str, err: LoadError) -> LoadFuture<T> {
        self.loading.item_start(path);
        self.loading.item_error(path, &err.to_string());
        future::ready(Err(err)).boxed()
    }
}
