//! Seam to the 3D rendering engine.
//!
//! The runtime orchestrates rendering but never draws, decodes files or does
//! GPU work itself. Those capabilities sit behind [`RenderBackend`] and
//! [`AssetLoader`]; the types in this module are the plain data the runtime
//! passes across that seam.

pub mod animation;
pub mod camera;
pub mod headless;
pub mod light;
pub mod loader;
pub mod material;
pub mod texture;

use crate::config::{Color, RenderSize, ShadowMapType};
use crate::scene::Scene;
use crate::viewport::RenderTarget;

pub use animation::{AnimationAction, AnimationClip, AnimationMixer};
pub use camera::{PerspectiveCamera, Ray};
pub use headless::{HeadlessRenderer, RenderStats};
pub use light::{Light, LightKind, ShadowSettings};
pub use loader::{AssetLoader, JsonAssetLoader, LoadFuture, MemoryAssetLoader, NodeManifest};
pub use material::{Material, MaterialHandle, MaterialPatch};
pub use texture::{CubeTexture, EnvironmentMap, Texture};

/// Renderer of the underlying engine.
pub trait RenderBackend: Send {
    fn name(&self) -> &'static str;

    /// Whether this backend can draw into the given kind of target.
    fn supports_target(&self, target: &RenderTarget) -> bool;

    fn set_size(&mut self, size: RenderSize);

    fn size(&self) -> RenderSize;

    fn set_pixel_ratio(&mut self, ratio: f32);

    fn set_clear_color(&mut self, color: Color, alpha: f32);

    fn set_shadow_map(&mut self, enabled: bool, kind: ShadowMapType);

    fn set_auto_clear(&mut self, auto_clear: bool);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);

    /// Pre-filters a texture into an environment map.
    fn prepare_environment(&mut self, source: &Texture, resolution: u32) -> EnvironmentMap;
}

/// Post-processing pipeline. Its size must always match the renderer's.
#[derive(Debug, Clone, PartialEq)]
pub struct Composer {
    size: RenderSize,
    passes: Vec<String>,
}

impl Composer {
    pub fn new(size: RenderSize) -> Self {
        Self {
            size,
            passes: vec!["render".to_string()],
        }
    }

    pub fn set_size(&mut self, size: RenderSize) {
        self.size = size;
    }

    pub fn size(&self) -> RenderSize {
        self.size
    }

    pub fn add_pass(&mut self, name: impl Into<String>) {
        self.passes.push(name.into());
    }

    pub fn passes(&self) -> &[String] {
        &self.passes
    }
}
