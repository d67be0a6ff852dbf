use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::channel::ReplaySubject;
use crate::config::FeatureConfig;
use crate::context::ServiceContext;
use crate::engine::light::Light;
use crate::error::FeatureError;
use crate::features::{parse_settings, Feature, FeatureId};
use crate::services::light::{LightService, LightSetup};

/// Scenario as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightScenarioSetup {
    pub id: String,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(default)]
    pub light_setups: IndexMap<String, LightSetup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LightScenarioSettings {
    #[serde(default)]
    scenarios: Vec<LightScenarioSetup>,
    #[serde(default)]
    default_scenario: Option<String>,
}

/// Named, swappable set of lights with its translated labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LightScenario {
    pub id: String,
    pub labels: IndexMap<String, String>,
    pub lights: IndexMap<String, Light>,
}

impl LightScenario {
    pub fn from_setup(setup: &LightScenarioSetup) -> Result<Self, FeatureError> {
        Ok(Self {
            id: setup.id.clone(),
            labels: setup.labels.clone(),
            lights: LightService::create_lights(&setup.light_setups)?,
        })
    }
}

#[derive(Debug, Default)]
struct ScenarioState {
    scenarios: Vec<LightScenario>,
    default_scenario: Option<String>,
}

/// Swaps the scene's lights between configured scenarios. While enabled,
/// exactly one scenario is active.
pub struct LightScenarioFeature {
    lights: Arc<LightService>,
    enabled: ReplaySubject<bool>,
    state: Mutex<ScenarioState>,
    scenarios: ReplaySubject<Vec<LightScenario>>,
    active: ReplaySubject<Option<String>>,
}

impl LightScenarioFeature {
    pub fn new(context: &ServiceContext) -> Arc<Self> {
        Arc::new(Self {
            lights: Arc::clone(&context.lights),
            enabled: ReplaySubject::with_value(false),
            state: Mutex::new(ScenarioState::default()),
            scenarios: ReplaySubject::with_value(Vec::new()),
            active: ReplaySubject::with_value(None),
        })
    }

    pub fn scenarios(&self) -> ReplaySubject<Vec<LightScenario>> {
        self.scenarios.clone()
    }

    pub fn active_scenario(&self) -> ReplaySubject<Option<String>> {
        self.active.clone()
    }

    /// Replaces every current light with the scenario's lights. Only
    /// allowed while the feature is enabled.
    pub fn set_active_scenario(&self, id: &str) -> Result<(), FeatureError> {
        if self.enabled.latest() != Some(true) {
            debug!("ignoring light scenario {id} while scenarios are disabled");
            return Err(FeatureError::Disabled(self.id()));
        }
        self.activate(id)
    }

    fn activate(&self, id: &str) -> Result<(), FeatureError> {
        let lights = self
            .state
            .lock()
            .scenarios
            .iter()
            .find(|scenario| scenario.id == id)
            .map(|scenario| scenario.lights.clone())
            .ok_or_else(|| FeatureError::UnknownScenario(id.to_string()))?;
        debug!("activating light scenario {id}");
        self.lights.remove_lights(None);
        self.lights.add_lights(lights);
        self.active.publish(Some(id.to_string()));
        Ok(())
    }

    fn initial_scenario(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .default_scenario
            .clone()
            .or_else(|| state.scenarios.first().map(|scenario| scenario.id.clone()))
    }
}

impl Feature for LightScenarioFeature {
    fn id(&self) -> FeatureId {
        FeatureId::LightScenario
    }

    fn enabled(&self) -> ReplaySubject<bool> {
        self.enabled.clone()
    }

    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError> {
        let settings: LightScenarioSettings = parse_settings(self.id(), config)?;
        let scenarios = settings
            .scenarios
            .iter()
            .map(LightScenario::from_setup)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(default) = &settings.default_scenario {
            if !scenarios.iter().any(|scenario| &scenario.id == default) {
                return Err(FeatureError::UnknownScenario(default.clone()));
            }
        }
        *self.state.lock() = ScenarioState {
            scenarios: scenarios.clone(),
            default_scenario: settings.default_scenario,
        };
        self.scenarios.publish(scenarios);
        self.set_enabled(true);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        if enabled {
            if let Some(id) = self.initial_scenario() {
                if let Err(err) = self.activate(&id) {
                    debug!("{err}");
                }
            }
        } else if self.enabled.latest() == Some(true) {
            self.lights.restore_defaults();
            self.active.publish(None);
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

    fn config() -> FeatureConfig {
        FeatureConfig::enabled()
            .with_setting(
                "scenarios",
                json!([
                    {
                        "id": "day",
                        "labels": {"en": "Day"},
                        "lightSetups": {
                            "sun": {"type": "directional", "position": [1, 5, 2], "castShadow": true},
                            "sky": {"type": "ambient", "intensity": 0.6}
                        }
                    },
                    {
                        "id": "night",
                        "lightSetups": {
                            "lamp": {"type": "point", "position": [0, 2, 0], "distance": 10}
                        }
                    }
                ]),
            )
            .with_setting("defaultScenario", json!("night"))
    }

    fn light_names(context: &ServiceContext) -> Vec<String> {
        context
            .lights
            .lights()
            .latest()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn switching_scenarios_leaves_no_leftovers() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = LightScenarioFeature::new(&context);
        feature.init(&config()).unwrap();
        assert_eq!(light_names(&context), vec!["lamp"]);
        assert_eq!(feature.active_scenario().latest(), Some(Some("night".into())));

        feature.set_active_scenario("day").unwrap();
        assert_eq!(light_names(&context), vec!["sun", "sky"]);
        assert_eq!(feature.scenarios().latest().unwrap()[0].labels["en"], "Day");
    }

    #[test]
    fn unknown_scenario_propagates_and_keeps_lights() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = LightScenarioFeature::new(&context);
        feature.init(&config()).unwrap();
        assert_eq!(
            feature.set_active_scenario("dusk"),
            Err(FeatureError::UnknownScenario("dusk".into()))
        );
        assert_eq!(light_names(&context), vec!["lamp"]);
    }

    #[test]
    fn disabling_restores_the_default_lights() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = LightScenarioFeature::new(&context);
        feature.init(&config()).unwrap();
        feature.set_enabled(false);
        assert_eq!(light_names(&context), vec!["ambient", "directional"]);
        assert_eq!(feature.active_scenario().latest(), Some(None));
    }

    #[test]
    fn disabled_scenarios_leave_lights_alone() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = LightScenarioFeature::new(&context);
        feature.init(&config()).unwrap();
        feature.set_enabled(false);

        assert_eq!(
            feature.set_active_scenario("day"),
            Err(FeatureError::Disabled(FeatureId::LightScenario))
        );
        assert_eq!(light_names(&context), vec!["ambient", "directional"]);
        assert_eq!(feature.active_scenario().latest(), Some(None));
    }

    #[test]
    fn malformed_light_type_fails_init() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = LightScenarioFeature::new(&context);
        let config = FeatureConfig::enabled().with_setting(
            "scenarios",
            json!([{ "id": "bad", "lightSetups": { "x": { "type": "laser" } } }]),
        );
        assert!(matches!(
            feature.init(&config),
            Err(FeatureError::Light(_))
        ));
        assert_eq!(light_names(&context), vec!["ambient", "directional"]);
    }
}
