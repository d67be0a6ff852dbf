//! Declarative viewer configuration.
//!
//! A [`ViewerConfig`] is an immutable snapshot; loading a new one replaces
//! the previous one entirely. Camera and render sections are partial: only
//! the fields that are present override the defaults when applied.

use std::fmt;
use std::path::Path;

use glam::Vec3;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ViewerError, ViewerResult};
use crate::features::FeatureId;

/// Complete description of what a viewer should show.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub objects: Vec<ObjectSetup>,
    #[serde(default)]
    pub features: IndexMap<FeatureId, FeatureConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> ViewerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> ViewerResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ViewerError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Features that are present and switched on, in declaration order.
    pub fn enabled_features(&self) -> impl Iterator<Item = (&FeatureId, &FeatureConfig)> {
        self.features.iter().filter(|(_, config)| config.enabled)
    }
}

/// Object to load into the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSetup {
    pub name: String,
    pub path: String,
}

/// Free-form project metadata carried along with a configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-feature configuration slice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl FeatureConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            settings: Map::new(),
        }
    }

    pub fn with_setting(mut self, key: &str, value: Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }

    /// Deserializes the feature specific fields into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.settings.clone()))
    }
}

/// Partial camera configuration. Missing fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub near: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub far: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
}

impl CameraConfig {
    pub const DEFAULT_FOV: f32 = 45.0;
    pub const DEFAULT_NEAR: f32 = 0.1;
    pub const DEFAULT_FAR: f32 = 1000.0;
    pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, 5.0);

    /// Fully populated defaults for a viewport with the given aspect ratio.
    pub fn defaults(aspect: f32) -> Self {
        Self {
            aspect: Some(aspect),
            near: Some(Self::DEFAULT_NEAR),
            far: Some(Self::DEFAULT_FAR),
            fov: Some(Self::DEFAULT_FOV),
            position: Some(Self::DEFAULT_POSITION),
            target: Some(Vec3::ZERO),
        }
    }

    /// Returns `self` with every field present in `patch` replaced.
    pub fn overlay(&self, patch: &CameraConfig) -> Self {
        Self {
            aspect: patch.aspect.or(self.aspect),
            near: patch.near.or(self.near),
            far: patch.far.or(self.far),
            fov: patch.fov.or(self.fov),
            position: patch.position.or(self.position),
            target: patch.target.or(self.target),
        }
    }
}

/// Size of the drawing surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShadowMapType {
    Basic,
    Pcf,
    #[default]
    PcfSoft,
    Vsm,
}

/// Partial render configuration. Missing fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_rendering: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_ratio: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_size: Option<RenderSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_map_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_map_type: Option<ShadowMapType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_clear: Option<bool>,
}

impl RenderConfig {
    pub fn defaults(size: RenderSize) -> Self {
        Self {
            clear_color: Some(Color::WHITE),
            clear_alpha: Some(0.0),
            continuous_rendering: Some(false),
            pixel_ratio: Some(1.0),
            render_size: Some(size),
            shadow_map_enabled: Some(true),
            shadow_map_type: Some(ShadowMapType::PcfSoft),
            auto_clear: Some(true),
        }
    }

    pub fn overlay(&self, patch: &RenderConfig) -> Self {
        Self {
            clear_color: patch.clear_color.or(self.clear_color),
            clear_alpha: patch.clear_alpha.or(self.clear_alpha),
            continuous_rendering: patch.continuous_rendering.or(self.continuous_rendering),
            pixel_ratio: patch.pixel_ratio.or(self.pixel_ratio),
            render_size: patch.render_size.or(self.render_size),
            shadow_map_enabled: patch.shadow_map_enabled.or(self.shadow_map_enabled),
            shadow_map_type: patch.shadow_map_type.or(self.shadow_map_type),
            auto_clear: patch.auto_clear.or(self.auto_clear),
        }
    }
}

/// Linear RGB color written as `#rrggbb` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub Vec3);

impl Color {
    pub const WHITE: Self = Self(Vec3::ONE);
    pub const BLACK: Self = Self(Vec3::ZERO);

    pub fn from_hex(value: &str) -> Result<Self, String> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(format!("expected #rrggbb, got `{value}`"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|byte| byte as f32 / 255.0)
                .map_err(|err| format!("invalid color `{value}`: {err}"))
        };
        Ok(Self(Vec3::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)))
    }

    pub fn to_hex(self) -> String {
        let byte = |channel: f32| (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.0.x), byte(self.0.y), byte(self.0.z))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
