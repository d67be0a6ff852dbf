//! Guided navigation between predefined points of interest.

pub mod marker;
pub mod navigation;

use std::any::Any;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::channel::{ReplaySubject, Subject, Subscription};
use crate::config::FeatureConfig;
use crate::context::ServiceContext;
use crate::error::FeatureError;
use crate::features::{parse_settings, Feature, FeatureId};
use crate::input::PointerEvent;
use crate::services::control::{ControlService, PointerInput};
use crate::services::render::{FrameTick, RenderService};
use crate::services::scene_graph::SceneGraphService;

pub use marker::{Highlight, HighlightSetup};
pub use navigation::{HighlightMode, HighlightNavigator, HighlightSpeed};

use navigation::{DEFAULT_ORBIT_DISTANCE, DRAG_THRESHOLD};

fn default_orbit_distance() -> f32 {
    DEFAULT_ORBIT_DISTANCE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightSettings {
    #[serde(default)]
    highlights: Vec<HighlightSetup>,
    #[serde(default = "default_orbit_distance")]
    orbit_distance: f32,
}

struct HighlightState {
    highlights: IndexMap<String, Highlight>,
    navigator: HighlightNavigator,
    orbit_distance: f32,
    /// Whether this feature holds the render loop while the camera moves.
    holding: bool,
    subscriptions: Vec<Subscription>,
}

/// Markers for configured highlights; clicking one flies the camera to it.
pub struct HighlightFeature {
    me: Weak<Self>,
    render: Arc<RenderService>,
    controls: Arc<ControlService>,
    scene_graph: Arc<SceneGraphService>,
    enabled: ReplaySubject<bool>,
    mode: ReplaySubject<HighlightMode>,
    focused: Subject<Option<String>>,
    state: Mutex<HighlightState>,
}

impl HighlightFeature {
    pub fn new(context: &ServiceContext) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            render: Arc::clone(&context.render),
            controls: Arc::clone(&context.controls),
            scene_graph: Arc::clone(&context.scene_graph),
            enabled: ReplaySubject::with_value(false),
            mode: ReplaySubject::with_value(HighlightMode::Orbit),
            focused: Subject::new(),
            state: Mutex::new(HighlightState {
                highlights: IndexMap::new(),
                navigator: HighlightNavigator::new(
                    context.render.camera_snapshot().fov,
                    DEFAULT_ORBIT_DISTANCE,
                ),
                orbit_distance: DEFAULT_ORBIT_DISTANCE,
                holding: false,
                subscriptions: Vec::new(),
            }),
        })
    }

    pub fn mode(&self) -> ReplaySubject<HighlightMode> {
        self.mode.clone()
    }

    /// Fires with the highlight id when a focus starts and with `None` when
    /// it is dropped.
    pub fn focused(&self) -> Subject<Option<String>> {
        self.focused.clone()
    }

    pub fn highlights(&self) -> Vec<Highlight> {
        self.state.lock().highlights.values().cloned().collect()
    }

    pub fn current_mode(&self) -> HighlightMode {
        self.state.lock().navigator.mode()
    }

    /// Starts flying to the highlight. Returns `Ok(false)` when a flight
    /// toward a highlight is already under way.
    pub fn focus_highlight(&self, id: &str) -> Result<bool, FeatureError> {
        if self.enabled.latest() != Some(true) {
            warn!("cannot focus highlight {id} while highlights are disabled");
            return Err(FeatureError::Disabled(self.id()));
        }
        let orbit_view = self.controls.controls().target;
        let selected = {
            let mut state = self.state.lock();
            let Some(highlight) = state.highlights.get(id) else {
                warn!("unknown highlight: {id}");
                return Err(FeatureError::UnknownHighlight(id.to_string()));
            };
            let target = highlight.target(state.navigator.base_fov());
            state.navigator.select(target, orbit_view)
        };
        if !selected {
            debug!("ignoring focus on {id} while approaching another highlight");
            return Ok(false);
        }
        self.controls.set_enabled(false);
        self.start_animation();
        self.mode.publish(HighlightMode::ToHighlight);
        self.focused.publish(Some(id.to_string()));
        Ok(true)
    }

    /// Leaves the current highlight and eases back to orbiting.
    pub fn release_focus(&self) -> bool {
        let released = self.state.lock().navigator.release();
        if released {
            self.on_released();
        }
        released
    }

    fn on_released(&self) {
        self.start_animation();
        self.mode.publish(HighlightMode::ToOrbit);
        self.focused.publish(None);
    }

    /// Makes sure frames keep coming while the camera is moving.
    fn start_animation(&self) {
        if !std::mem::replace(&mut self.state.lock().holding, true) {
            self.render.hold_continuous();
        }
    }

    fn stop_animation(&self) {
        if std::mem::take(&mut self.state.lock().holding) {
            self.render.release_continuous();
        }
    }

    fn on_tick(&self, tick: &FrameTick) {
        let mut camera = self.render.camera_snapshot();
        let transition = {
            let mut state = self.state.lock();
            if state.navigator.mode() == HighlightMode::Orbit {
                return;
            }
            state.navigator.step(&mut camera, tick.delta_millis())
        };
        self.render.update_camera(|current| *current = camera);
        match transition {
            Some(HighlightMode::Highlight) => {
                self.stop_animation();
                self.mode.publish(HighlightMode::Highlight);
            }
            Some(HighlightMode::Orbit) => {
                self.controls.update_controls(|controls| {
                    controls.target = glam::Vec3::ZERO;
                    controls.enabled = true;
                });
                self.stop_animation();
                self.mode.publish(HighlightMode::Orbit);
            }
            _ => {}
        }
    }

    fn on_pointer(&self, input: &PointerInput) {
        match input.event {
            PointerEvent::Move { .. } if input.pressed => {
                let released = self.state.lock().navigator.note_drag(input.drag_distance);
                if released {
                    self.on_released();
                }
            }
            PointerEvent::Move { position } => self.hover(position),
            PointerEvent::Up { position, .. } if input.drag_distance <= DRAG_THRESHOLD => {
                if let Some(id) = self.pick(position) {
                    if let Err(err) = self.focus_highlight(&id) {
                        debug!("{err}");
                    }
                }
            }
            PointerEvent::Wheel { .. } => self.state.lock().navigator.note_wheel(),
            _ => {}
        }
    }

    fn pick(&self, position: glam::Vec2) -> Option<String> {
        let camera = self.render.camera_snapshot();
        let ndc = marker::to_ndc(position, self.render.renderer_size());
        let state = self.state.lock();
        marker::pick(state.highlights.values(), &camera, ndc).map(|h| h.id().to_string())
    }

    /// Toggles the hovered look of markers under the pointer.
    fn hover(&self, position: glam::Vec2) {
        let hovered = self.pick(position);
        let changed: Vec<Highlight> = {
            let mut state = self.state.lock();
            state
                .highlights
                .values_mut()
                .filter_map(|highlight| {
                    let now = hovered.as_deref() == Some(highlight.id());
                    (highlight.hovered != now).then(|| {
                        highlight.hovered = now;
                        highlight.clone()
                    })
                })
                .collect()
        };
        if changed.is_empty() {
            return;
        }
        for highlight in &changed {
            let scale = highlight.marker_scale();
            self.scene_graph
                .update_helper(&highlight.marker_name(), |node| node.scale = scale);
        }
        if !self.render.is_continuous() {
            self.render.render_single_frame();
        }
    }

    fn attach(&self) {
        let base_fov = self.render.camera_snapshot().fov;
        let markers: Vec<_> = {
            let mut state = self.state.lock();
            state.navigator = HighlightNavigator::new(base_fov, state.orbit_distance);
            state.highlights.values().map(Highlight::marker_node).collect()
        };
        for marker in markers {
            self.scene_graph.add_helper(marker);
        }

        let weak = self.me.clone();
        let frames = self.render.before_render().subscribe(move |tick: &FrameTick| {
            if let Some(feature) = weak.upgrade() {
                feature.on_tick(tick);
            }
        });
        let weak = self.me.clone();
        let pointer = self.controls.pointer().subscribe(move |input: &PointerInput| {
            if let Some(feature) = weak.upgrade() {
                feature.on_pointer(input);
            }
        });
        self.state.lock().subscriptions.extend([frames, pointer]);
        self.mode.publish(HighlightMode::Orbit);
    }

    fn detach(&self) {
        let (subscriptions, names, was_navigating) = {
            let mut state = self.state.lock();
            let was_navigating = state.navigator.mode() != HighlightMode::Orbit;
            for highlight in state.highlights.values_mut() {
                highlight.hovered = false;
            }
            let names: Vec<_> = state.highlights.values().map(Highlight::marker_name).collect();
            (std::mem::take(&mut state.subscriptions), names, was_navigating)
        };
        drop(subscriptions);
        for name in names {
            self.scene_graph.remove_helper(&name);
        }
        if was_navigating {
            self.controls.set_enabled(true);
            self.stop_animation();
            self.focused.publish(None);
        }
        {
            let mut state = self.state.lock();
            let base_fov = state.navigator.base_fov();
            state.navigator = HighlightNavigator::new(base_fov, state.orbit_distance);
        }
        self.mode.publish(HighlightMode::Orbit);
    }
}

impl Feature for HighlightFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Highlight
    }

    fn enabled(&self) -> ReplaySubject<bool> {
        self.enabled.clone()
    }

    fn init(&self, config: &FeatureConfig) -> Result<(), FeatureError> {
        let settings: HighlightSettings = parse_settings(self.id(), config)?;
        let mut highlights = IndexMap::new();
        for setup in settings.highlights {
            if highlights.contains_key(&setup.id) {
                return Err(FeatureError::InvalidConfig {
                    id: self.id(),
                    message: format!("duplicate highlight id {}", setup.id),
                });
            }
            highlights.insert(setup.id.clone(), Highlight::new(setup));
        }
        {
            let mut state = self.state.lock();
            state.highlights = highlights;
            state.orbit_distance = settings.orbit_distance;
        }
        self.set_enabled(true);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        if self.enabled.latest() == Some(enabled) {
            return;
        }
        if enabled {
            self.attach();
        } else {
            self.detach();
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
    use crate::clock::ManualClock;
    use crate::input::PointerButton;
    use glam::{Vec2, Vec3};
    use serde_json::json;

    fn config() -> FeatureConfig {
        FeatureConfig::enabled().with_setting(
            "highlights",
            json!([
                {
                    "id": "door",
                    "position": [0, 0, 0],
                    "cameraTarget": [1, 1, 3],
                    "viewTarget": [0, 0, 0],
                    "fieldOfView": 30,
                    "speed": {"in": 0.01, "out": 0.01, "fov": 0.01},
                    "scale": 4
                },
                {
                    "id": "wheel",
                    "position": [3, 0, 0],
                    "cameraTarget": [4, 0, 2],
                    "viewTarget": [3, 0, 0]
                }
            ]),
        )
    }

    fn run_until(
        context: &ServiceContext,
        clock: &ManualClock,
        feature: &HighlightFeature,
        mode: HighlightMode,
    ) -> usize {
        let mut frames = 0;
        while feature.current_mode() != mode {
            clock.advance_millis(16);
            context.render.animation_frame();
            frames += 1;
            assert!(frames < 2000, "never reached {mode:?}");
        }
        frames
    }

    #[test]
    fn unknown_highlight_keeps_orbiting() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = HighlightFeature::new(&context);
        feature.init(&config()).unwrap();
        assert_eq!(
            feature.focus_highlight("missing-id"),
            Err(FeatureError::UnknownHighlight("missing-id".into()))
        );
        assert_eq!(feature.mode().latest(), Some(HighlightMode::Orbit));
        assert!(context.controls.controls().enabled);
    }

    #[test]
    fn focus_flies_in_and_drag_flies_back() {
        let (context, _, clock) = ServiceContext::for_tests();
        let feature = HighlightFeature::new(&context);
        feature.init(&config()).unwrap();
        assert!(context.scene_graph.helper("highlight:door").is_some());

        assert_eq!(feature.focus_highlight("door"), Ok(true));
        assert!(!context.controls.controls().enabled);
        assert!(context.render.is_continuous());
        assert_eq!(feature.focus_highlight("wheel"), Ok(false));

        run_until(&context, &clock, &feature, HighlightMode::Highlight);
        let camera = context.render.camera_snapshot();
        assert_eq!(camera.position, Vec3::new(1.0, 1.0, 3.0));
        assert_eq!(camera.fov, 30.0);
        assert!(!context.render.is_continuous());

        context.controls.dispatch_pointer(PointerEvent::Down {
            position: Vec2::new(10.0, 10.0),
            button: PointerButton::PRIMARY,
        });
        context.controls.dispatch_pointer(PointerEvent::Move {
            position: Vec2::new(40.0, 10.0),
        });
        assert_eq!(feature.current_mode(), HighlightMode::ToOrbit);

        run_until(&context, &clock, &feature, HighlightMode::Orbit);
        let camera = context.render.camera_snapshot();
        assert!((camera.position.length() - DEFAULT_ORBIT_DISTANCE).abs() < 1e-2);
        assert!((camera.fov - 45.0).abs() < 1e-2);
        assert!(context.controls.controls().enabled);
    }

    #[test]
    fn clicking_a_marker_focuses_it() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = HighlightFeature::new(&context);
        feature.init(&config()).unwrap();

        let focused = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&focused);
        let _sub = feature
            .focused()
            .subscribe(move |id: &Option<String>| sink.lock().push(id.clone()));

        let size = context.render.renderer_size();
        let center = Vec2::new(size.width as f32 / 2.0, size.height as f32 / 2.0);
        context.controls.dispatch_pointer(PointerEvent::Move { position: center });
        assert!(feature.highlights()[0].hovered);
        assert_eq!(
            context.scene_graph.helper("highlight:door").unwrap().scale,
            Vec3::splat(marker::HOVER_SCALE)
        );

        context.controls.dispatch_pointer(PointerEvent::Down {
            position: center,
            button: PointerButton::PRIMARY,
        });
        context.controls.dispatch_pointer(PointerEvent::Up {
            position: center,
            button: PointerButton::PRIMARY,
        });
        assert_eq!(*focused.lock(), vec![Some("door".to_string())]);
        assert_eq!(feature.current_mode(), HighlightMode::ToHighlight);
    }

    #[test]
    fn disabling_mid_flight_hands_control_back() {
        let context = ServiceContext::offscreen_for_tests();
        let feature = HighlightFeature::new(&context);
        feature.init(&config()).unwrap();
        feature.focus_highlight("door").unwrap();
        feature.set_enabled(false);

        assert_eq!(feature.mode().latest(), Some(HighlightMode::Orbit));
        assert!(context.controls.controls().enabled);
        assert!(!context.render.is_continuous());
        assert!(context.scene_graph.helper("highlight:door").is_none());
    }

    #[test]
    fn disabled_highlights_cannot_be_focused() {
        let (context, _, clock) = ServiceContext::for_tests();
        let feature = HighlightFeature::new(&context);
        feature.init(&config()).unwrap();
        feature.set_enabled(false);

        assert_eq!(
            feature.focus_highlight("door"),
            Err(FeatureError::Disabled(FeatureId::Highlight))
        );
        clock.advance_millis(16);
        context.render.animation_frame();
        assert_eq!(feature.current_mode(), HighlightMode::Orbit);
        assert!(context.controls.controls().enabled);
        assert!(!context.render.is_continuous());

        feature.set_enabled(true);
        assert_eq!(feature.focus_highlight("door"), Ok(true));
    }
}
