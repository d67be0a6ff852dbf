use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::Color;

/// Type specific light parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LightKind {
    Ambient,
    Directional,
    Point { distance: f32, decay: f32 },
    Spot {
        distance: f32,
        decay: f32,
        angle: f32,
        penumbra: f32,
    },
}

impl LightKind {
    pub fn name(&self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Directional => "directional",
            LightKind::Point { .. } => "point",
            LightKind::Spot { .. } => "spot",
        }
    }

    pub fn can_cast_shadow(&self) -> bool {
        !matches!(self, LightKind::Ambient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShadowSettings {
    pub map_size: u32,
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
    pub camera_near: f32,
    pub camera_far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 1024,
            bias: -0.0005,
            normal_bias: 0.0,
            radius: 1.0,
            camera_near: 0.5,
            camera_far: 500.0,
        }
    }
}

/// Concrete light instance placed in the scene's lights group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
    pub shadow: ShadowSettings,
}

impl Light {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            intensity: 1.0,
            position: Vec3::ZERO,
            cast_shadow: false,
            shadow: ShadowSettings::default(),
        }
    }

    pub fn ambient(intensity: f32) -> Self {
        Self {
            intensity,
            ..Self::new(LightKind::Ambient)
        }
    }

    pub fn directional(position: Vec3, intensity: f32) -> Self {
        Self {
            intensity,
            position,
            ..Self::new(LightKind::Directional)
        }
    }

    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = self.kind.can_cast_shadow();
        self
    }
}
