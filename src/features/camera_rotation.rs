use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::channel::ReplaySubject;
use crate::config::FeatureConfig;
use crate::context::ServiceContext;
use crate::error::FeatureError;
use crate::features::{parse_settings, Feature, FeatureId};
use crate::services::control::ControlService;
use crate::services::render::RenderService;

fn default_speed() -> f32 {
    30.0
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CameraRotationSettings {
    /// Degrees per second.
    #[serde(default = "default_speed")]
    speed: f32,
}

#[derive(Debug, Default)]
struct RotationState {
    speed: f32,
    /// Whether this feature holds the render loop.
    holding: bool,
}

/// Spins the camera around the orbit target.
pub struct CameraRotationFeature {
    controls: Arc<ControlService>,
    render: Arc<RenderService>,
    enabled: ReplaySubject<bool>,
    state: Mutex<RotationState>,
}

impl CameraRotationFeature {
    pub fn new(context: &ServiceContext) -> Arc<Self> {
        Arc::new(Self {
            controls: Arc::clone(&context.controls),
            render: Arc::clone(&context.render),
            enabled: ReplaySubject::with_value(false),
            state: Mutex::new(RotationState {
                speed: default_speed(),
                holding: false,
            }),
        })
    }

    pub fn speed(&self) -> f32 {
        self.state.lock().speed
    }
}

impl Feature for CameraRotationFeature {
    fn id(&self) -> FeatureId {
        FeatureId::CameraRotation
    }

    fn enabled(&self) -> ReplaySubject<bool> {
        self.enabled.clone()
    }

    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError> {
        let settings: CameraRotationSettings = parse_settings(self.id(), config)?;
        self.state.lock().speed = settings.speed;
        self.set_enabled(true);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        if self.enabled.latest() == Some(enabled) {
            return;
        }
        let speed = self.speed();
        self.controls.set_auto_rotate(enabled, speed);

        // Rotation needs a frame every refresh.
        let holding = std::mem::replace(&mut self.state.lock().holding, enabled);
        match (holding, enabled) {
            (false, true) => self.render.hold_continuous(),
            (true, false) => self.render.release_continuous(),
            _ => {}
        }
        self.enabled.publish(enabled);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rotation_drives_auto_rotate_and_the_render_loop() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = CameraRotationFeature::new(&context);
        feature
            .init(&FeatureConfig::enabled().with_setting("speed", json!(45.0)))
            .unwrap();

        let controls = context.controls.controls();
        assert!(controls.auto_rotate);
        assert_eq!(controls.auto_rotate_speed, 45.0);
        assert!(context.render.is_continuous());

        feature.set_enabled(false);
        assert!(!context.controls.controls().auto_rotate);
        assert!(!context.render.is_continuous());
        assert_eq!(feature.enabled().latest(), Some(false));
    }

    #[test]
    fn bad_speed_is_an_invalid_config() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = CameraRotationFeature::new(&context);
        let err = feature
            .init(&FeatureConfig::enabled().with_setting("speed", json!("fast")))
            .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidConfig { .. }));
        assert_eq!(feature.enabled().latest(), Some(false));
    }
}
