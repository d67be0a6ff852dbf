use std::f32::consts::PI;
use std::sync::Arc;

use glam::Vec3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::ReplaySubject;
use crate::config::Color;
use crate::engine::light::{Light, LightKind, ShadowSettings};
use crate::error::LightError;
use crate::services::scene_graph::SceneGraphService;

pub const DEFAULT_AMBIENT: &str = "ambient";
pub const DEFAULT_DIRECTIONAL: &str = "directional";

/// Declarative description of a light, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSetup {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub cast_shadow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penumbra: Option<f32>,
}

impl LightSetup {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }
}

/// Named lights of the scene. Two defaults are present from construction.
pub struct LightService {
    scene_graph: Arc<SceneGraphService>,
}

impl LightService {
    pub fn new(scene_graph: Arc<SceneGraphService>) -> Self {
        let service = Self { scene_graph };
        service.add_lights(Self::default_lights());
        service
    }

    /// Soft ambient fill plus a shadow casting key light.
    pub fn default_lights() -> IndexMap<String, Light> {
        IndexMap::from([
            (DEFAULT_AMBIENT.to_string(), Light::ambient(0.4)),
            (
                DEFAULT_DIRECTIONAL.to_string(),
                Light::directional(Vec3::new(5.0, 10.0, 7.5), 0.8).with_shadow(),
            ),
        ])
    }

    pub fn lights(&self) -> ReplaySubject<IndexMap<String, Light>> {
        self.scene_graph.lights()
    }

    /// Adds lights, replacing any existing light with the same name.
    pub fn add_lights(&self, lights: IndexMap<String, Light>) {
        self.scene_graph.update_lights(|group| group.extend(lights));
    }

    /// Removes the named lights, or every light when `names` is `None`.
    pub fn remove_lights(&self, names: Option<&[String]>) {
        self.scene_graph.update_lights(|group| match names {
            Some(names) => group.retain(|name, _| !names.contains(name)),
            None => group.clear(),
        });
    }

    pub fn restore_defaults(&self) {
        self.remove_lights(None);
        self.add_lights(Self::default_lights());
    }

    /// Turns a light setup into a concrete light.
    pub fn create_light(setup: &LightSetup) -> Result<Light, LightError> {
        let kind = match setup.kind.to_ascii_lowercase().trim_end_matches("light") {
            "ambient" => LightKind::Ambient,
            "directional" => LightKind::Directional,
            "point" => LightKind::Point {
                distance: setup.distance.unwrap_or(0.0),
                decay: setup.decay.unwrap_or(2.0),
            },
            "spot" => LightKind::Spot {
                distance: setup.distance.unwrap_or(0.0),
                decay: setup.decay.unwrap_or(2.0),
                angle: setup.angle.unwrap_or(PI / 3.0),
                penumbra: setup.penumbra.unwrap_or(0.0),
            },
            _ => return Err(LightError::UnknownLightType(setup.kind.clone())),
        };

        let mut light = Light::new(kind);
        if let Some(color) = setup.color {
            light.color = color;
        }
        if let Some(intensity) = setup.intensity {
            light.intensity = intensity;
        }
        if let Some(position) = setup.position {
            light.position = position;
        }
        if setup.cast_shadow {
            light = light.with_shadow();
        }
        if let Some(shadow) = setup.shadow {
            light.shadow = shadow;
        }
        Ok(light)
    }

    pub fn create_lights(
        setups: &IndexMap<String, LightSetup>,
    ) -> Result<IndexMap<String, Light>, LightError> {
        setups
            .iter()
            .map(|(name, setup)| Ok((name.clone(), Self::create_light(setup)?)))
            .collect()
    }
}
