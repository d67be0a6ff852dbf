use std::collections::HashMap;
use std::path::PathBuf;

use futures::future::{self, BoxFuture, FutureExt};
use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::engine::animation::AnimationClip;
use crate::engine::material::Material;
use crate::engine::texture::Texture;
use crate::error::LoadError;
use crate::scene::SceneNode;

pub type LoadFuture<T> = BoxFuture<'static, Result<T, LoadError>>;

/// File-format loaders of the rendering engine.
pub trait AssetLoader: Send + Sync {
    /// Lower-case extensions accepted by [`AssetLoader::load_object`].
    fn object_extensions(&self) -> &[&'static str];

    /// Lower-case extensions accepted by [`AssetLoader::load_texture`].
    fn texture_extensions(&self) -> &[&'static str];

    fn load_object(&self, path: &str) -> LoadFuture<SceneNode>;

    fn load_texture(&self, path: &str) -> LoadFuture<Texture>;
}

/// Serializable description of an object hierarchy. A node with material
/// names is a mesh; every instantiation gets fresh material instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeManifest {
    pub name: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub children: Vec<NodeManifest>,
    #[serde(default)]
    pub animations: Vec<AnimationClip>,
}

impl NodeManifest {
    pub fn instantiate(&self) -> SceneNode {
        let mut node = if self.materials.is_empty() {
            SceneNode::group(&self.name)
        } else {
            SceneNode::mesh(
                &self.name,
                self.materials.iter().map(Material::new).collect(),
            )
        };
        node.position = self.position;
        node.animations = self.animations.clone();
        node.children = self.children.iter().map(NodeManifest::instantiate).collect();
        node
    }
}

/// Loader serving objects and textures registered up front.
#[derive(Debug, Default)]
pub struct MemoryAssetLoader {
    objects: RwLock<HashMap<String, NodeManifest>>,
    textures: RwLock<HashMap<String, Texture>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&self, path: impl Into<String>, manifest: NodeManifest) {
        self.objects.write().insert(path.into(), manifest);
    }

    pub fn insert_texture(&self, path: impl Into<String>, byte_len: usize) {
        let path = path.into();
        self.textures
            .write()
            .insert(path.clone(), Texture::new(path, byte_len));
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn object_extensions(&self) -> &[&'static str] {
        &["json", "gltf", "glb", "obj", "fbx"]
    }

    fn texture_extensions(&self) -> &[&'static str] {
        &["png", "jpg", "jpeg", "webp", "hdr"]
    }

    fn load_object(&self, path: &str) -> LoadFuture<SceneNode> {
        let result = self
            .objects
            .read()
            .get(path)
            .map(NodeManifest::instantiate)
            .ok_or_else(|| LoadError::NotFound(path.to_string()));
        future::ready(result).boxed()
    }

    fn load_texture(&self, path: &str) -> LoadFuture<Texture> {
        let result = self
            .textures
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()));
        future::ready(result).boxed()
    }
}

/// Loader reading JSON node manifests and raw image files from disk.
#[derive(Debug, Clone)]
pub struct JsonAssetLoader {
    root: PathBuf,
}

impl JsonAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(full.display().to_string()),
            _ => LoadError::Io {
                path: full.display().to_string(),
                message: err.to_string(),
            },
        })
    }
}

impl AssetLoader for JsonAssetLoader {
    fn object_extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn texture_extensions(&self) -> &[&'static str] {
        &["png", "jpg", "jpeg", "webp", "hdr"]
    }

    fn load_object(&self, path: &str) -> LoadFuture<SceneNode> {
        let loader = self.clone();
        let path = path.to_string();
        async move {
            let bytes = loader.read(&path)?;
            let manifest: NodeManifest =
                serde_json::from_slice(&bytes).map_err(|err| LoadError::Parse {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
            Ok(manifest.instantiate())
        }
        .boxed()
    }

    fn load_texture(&self, path: &str) -> LoadFuture<Texture> {
        let loader = self.clone();
        let path = path.to_string();
        async move {
            let bytes = loader.read(&path)?;
            Ok(Texture::new(path, bytes.len()))
        }
        .boxed()
    }
}
