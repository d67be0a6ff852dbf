use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Color;
use crate::engine::texture::EnvironmentMap;

/// Surface description attached to a mesh. Materials are shared by name,
/// so every mesh holding the same handle sees the same edits.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub metalness: f32,
    pub roughness: f32,
    pub env_map: Option<EnvironmentMap>,
    pub env_map_intensity: f32,
    version: u64,
}

pub type MaterialHandle = Arc<RwLock<Material>>;

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::WHITE,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            metalness: 0.0,
            roughness: 1.0,
            env_map: None,
            env_map_intensity: 1.0,
            version: 0,
        }
    }

    pub fn into_handle(self) -> MaterialHandle {
        Arc::new(RwLock::new(self))
    }

    /// Upload counter; bumped whenever the material must be re-sent to the
    /// GPU.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn mark_needs_update(&mut self) {
        self.version += 1;
    }

    /// Applies every field present in `patch`. Returns whether anything
    /// was written.
    pub fn apply(&mut self, patch: &MaterialPatch) -> bool {
        let mut touched = false;
        if let Some(color) = patch.color {
            self.color = color;
            touched = true;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
            touched = true;
        }
        if let Some(transparent) = patch.transparent {
            self.transparent = transparent;
            touched = true;
        }
        if let Some(wireframe) = patch.wireframe {
            self.wireframe = wireframe;
            touched = true;
        }
        if let Some(metalness) = patch.metalness {
            self.metalness = metalness;
            touched = true;
        }
        if let Some(roughness) = patch.roughness {
            self.roughness = roughness;
            touched = true;
        }
        if let Some(env_map) = &patch.env_map {
            self.env_map = env_map.clone();
            touched = true;
        }
        if let Some(intensity) = patch.env_map_intensity {
            self.env_map_intensity = intensity;
            touched = true;
        }
        if touched {
            self.mark_needs_update();
        }
        touched
    }
}

/// Partial material update. `env_map: Some(None)` clears the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPatch {
    pub color: Option<Color>,
    pub opacity: Option<f32>,
    pub transparent: Option<bool>,
    pub wireframe: Option<bool>,
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
    pub env_map: Option<Option<EnvironmentMap>>,
    pub env_map_intensity: Option<f32>,
}

impl MaterialPatch {
    pub fn wireframe(enabled: bool) -> Self {
        Self {
            wireframe: Some(enabled),
            ..Self::default()
        }
    }

    pub fn env_map(map: Option<EnvironmentMap>) -> Self {
        Self {
            env_map: Some(map),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_marks_material_dirty() {
        let mut material = Material::new("Paint");
        assert!(material.apply(&MaterialPatch::wireframe(true)));
        assert!(material.wireframe);
        assert_eq!(material.version(), 1);
        assert!(!material.apply(&MaterialPatch::default()));
        assert_eq!(material.version(), 1);
    }
}
