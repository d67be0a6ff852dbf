//! Optional capabilities that attach to a running viewer.
//!
//! Built-in features are named by [`FeatureId`] variants; anything else a
//! host registers goes through [`FeatureId::Custom`].

pub mod camera_rotation;
pub mod highlight;
pub mod light_scenario;
pub mod registry;
pub mod service;
pub mod skybox;
pub mod wireframe;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::channel::ReplaySubject;
use crate::config::FeatureConfig;
use crate::error::FeatureError;

pub use camera_rotation::CameraRotationFeature;
pub use highlight::HighlightFeature;
pub use light_scenario::LightScenarioFeature;
pub use registry::{FeatureConstructor, FeatureRegistry};
pub use service::FeatureService;
pub use skybox::SkyboxFeature;
pub use wireframe::WireframeFeature;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeatureId {
    CameraRotation,
    LightScenario,
    Wireframe,
    Skybox,
    Highlight,
    Custom(String),
}

impl FeatureId {
    pub const BUILT_IN: [FeatureId; 5] = [
        FeatureId::CameraRotation,
        FeatureId::LightScenario,
        FeatureId::Wireframe,
        FeatureId::Skybox,
        FeatureId::Highlight,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FeatureId::CameraRotation => "CameraRotation",
            FeatureId::LightScenario => "LightScenario",
            FeatureId::Wireframe => "Wireframe",
            FeatureId::Skybox => "Skybox",
            FeatureId::Highlight => "Highlight",
            FeatureId::Custom(name) => name,
        }
    }

    pub fn is_built_in(&self) -> bool {
        !matches!(self, FeatureId::Custom(_))
    }
}

impl From<&str> for FeatureId {
    fn from(name: &str) -> Self {
        match name {
            "CameraRotation" => FeatureId::CameraRotation,
            "LightScenario" => FeatureId::LightScenario,
            "Wireframe" => FeatureId::Wireframe,
            "Skybox" => FeatureId::Skybox,
            "Highlight" => FeatureId::Highlight,
            other => FeatureId::Custom(other.to_string()),
        }
    }
}

impl From<String> for FeatureId {
    fn from(name: String) -> Self {
        FeatureId::from(name.as_str())
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pluggable capability with its own configuration slice and an
/// enable/disable lifecycle.
pub trait Feature: Send + Sync {
    fn id(&self) -> FeatureId;

    /// Current enabled state; replays to new subscribers.
    fn enabled(&self) -> ReplaySubject<bool>;

    /// Applies the feature's configuration and switches it on.
    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError>;

    fn set_enabled(&self, enabled: bool);

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Registers the five built-in features.
pub fn register_built_in(registry: &FeatureRegistry) -> Result<(), FeatureError> {
    registry.register_feature(FeatureId::CameraRotation, |context| {
        Ok(CameraRotationFeature::new(context) as Arc<dyn Feature>)
    })?;
    registry.register_feature(FeatureId::LightScenario, |context| {
        Ok(LightScenarioFeature::new(context) as Arc<dyn Feature>)
    })?;
    registry.register_feature(FeatureId::Wireframe, |context| {
        Ok(WireframeFeature::new(context) as Arc<dyn Feature>)
    })?;
    registry.register_feature(FeatureId::Skybox, |context| {
        Ok(SkyboxFeature::new(context) as Arc<dyn Feature>)
    })?;
    registry.register_feature(FeatureId::Highlight, |context| {
        Ok(HighlightFeature::new(context) as Arc<dyn Feature>)
    })?;
    Ok(())
}

/// Reads a feature's own settings out of its configuration slice.
pub(crate) fn parse_settings<T: DeserializeOwned>(
    id: FeatureId,
    config: &FeatureConfig,
) -> Result<T, FeatureError> {
    config.parse().map_err(|err| FeatureError::InvalidConfig {
        id,
        message: err.to_string(),
    })
}
