use std::f32::consts::PI;
use std::sync::{Arc, Weak};

use glam::{Vec2, Vec3};
use parking_lot::Mutex;

use crate::channel::{Subject, Subscription};
use crate::engine::camera::PerspectiveCamera;
use crate::input::{PointerButton, PointerEvent, PointerState};
use crate::services::render::{FrameTick, RenderService};

const POLAR_EPSILON: f32 = 1e-4;
const RADIANS_PER_PIXEL: f32 = PI / 360.0;
const ZOOM_STEP: f32 = 0.95;

/// Orbit-style camera controls bound to the render service's camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enabled: bool,
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub auto_rotate: bool,
    /// Degrees per second.
    pub auto_rotate_speed: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enabled: true,
            enable_rotate: true,
            enable_zoom: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            auto_rotate: false,
            auto_rotate_speed: 30.0,
        }
    }
}

impl OrbitControls {
    /// Rotates the camera around the target by the given azimuth and polar
    /// angles and scales its distance, keeping it looking at the target.
    pub fn orbit(&self, camera: &mut PerspectiveCamera, azimuth: f32, polar: f32, scale: f32) {
        let offset = camera.position - self.target;
        let radius = offset.length().max(f32::EPSILON);
        let theta = offset.x.atan2(offset.z) + azimuth;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + polar)
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        let radius = (radius * scale).clamp(self.min_distance, self.max_distance);
        camera.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
        camera.look_at(self.target);
    }
}

/// Pointer event plus the state it left behind, as seen by every listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub event: PointerEvent,
    pub delta: Vec2,
    pub drag_distance: f32,
    pub pressed: bool,
}

/// Owns the orbit controls and routes pointer input to them and to
/// features.
pub struct ControlService {
    render: Arc<RenderService>,
    controls: Mutex<OrbitControls>,
    pointer_state: PointerState,
    pointer: Subject<PointerInput>,
    changed: Subject<OrbitControls>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ControlService {
    pub fn new(render: Arc<RenderService>) -> Arc<Self> {
        let service = Arc::new(Self {
            render: Arc::clone(&render),
            controls: Mutex::new(OrbitControls::default()),
            pointer_state: PointerState::new(),
            pointer: Subject::new(),
            changed: Subject::new(),
            subscriptions: Mutex::new(Vec::new()),
        });

        // Controls see pointer input before any feature does.
        let weak: Weak<Self> = Arc::downgrade(&service);
        let input = service.pointer.subscribe(move |input: &PointerInput| {
            if let Some(service) = weak.upgrade() {
                service.handle_input(input);
            }
        });
        let weak: Weak<Self> = Arc::downgrade(&service);
        let changed = service.changed.subscribe(move |_: &OrbitControls| {
            if let Some(service) = weak.upgrade() {
                if !service.render.is_continuous() {
                    service.render.render_single_frame();
                }
            }
        });
        let weak: Weak<Self> = Arc::downgrade(&service);
        let frames = render.before_render().subscribe(move |tick: &FrameTick| {
            if let Some(service) = weak.upgrade() {
                service.auto_rotate(tick);
            }
        });
        service.subscriptions.lock().extend([input, changed, frames]);
        service
    }

    pub fn pointer(&self) -> Subject<PointerInput> {
        self.pointer.clone()
    }

    /// Fires whenever user input moved the camera.
    pub fn changed(&self) -> Subject<OrbitControls> {
        self.changed.clone()
    }

    pub fn controls(&self) -> OrbitControls {
        *self.controls.lock()
    }

    pub fn update_controls<F>(&self, update: F)
    where
        F: FnOnce(&mut OrbitControls),
    {
        update(&mut self.controls.lock());
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.controls.lock().enabled = enabled;
    }

    pub fn set_auto_rotate(&self, enabled: bool, degrees_per_second: f32) {
        let mut controls = self.controls.lock();
        controls.auto_rotate = enabled;
        controls.auto_rotate_speed = degrees_per_second;
    }

    pub fn set_target(&self, target: Vec3) {
        self.controls.lock().target = target;
        self.render.update_camera(|camera| camera.look_at(target));
    }

    /// Folds the event into the pointer state and publishes it.
    pub fn dispatch_pointer(&self, event: PointerEvent) {
        let delta = self.pointer_state.record(&event);
        self.pointer.publish(PointerInput {
            event,
            delta,
            drag_distance: self.pointer_state.drag_distance(),
            pressed: self.pointer_state.any_pressed(),
        });
    }

    fn handle_input(&self, input: &PointerInput) {
        let controls = self.controls();
        if !controls.enabled {
            return;
        }
        let (azimuth, polar, scale) = match input.event {
            PointerEvent::Move { .. }
                if controls.enable_rotate
                    && self.pointer_state.is_pressed(PointerButton::PRIMARY) =>
            {
                let angle = input.delta * RADIANS_PER_PIXEL * controls.rotate_speed;
                (-angle.x, -angle.y, 1.0)
            }
            PointerEvent::Wheel { delta, .. } if controls.enable_zoom && delta != 0.0 => {
                let step = ZOOM_STEP.powf(controls.zoom_speed);
                (0.0, 0.0, if delta > 0.0 { 1.0 / step } else { step })
            }
            _ => return,
        };
        self.render
            .update_camera(|camera| controls.orbit(camera, azimuth, polar, scale));
        self.changed.publish(controls);
    }

    fn auto_rotate(&self, tick: &FrameTick) {
        let controls = self.controls();
        if !controls.enabled || !controls.auto_rotate {
            return;
        }
        let angle = controls.auto_rotate_speed.to_radians() * tick.delta_seconds();
        if angle != 0.0 {
            self.render
                .update_camera(|camera| controls.orbit(camera, -angle, 0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{RenderConfig, ViewerConfig};
    use crate::engine::HeadlessRenderer;
    use crate::services::scene_graph::SceneGraphService;
    use crate::viewport::RenderTarget;

    fn fixture() -> (Arc<RenderService>, Arc<ManualClock>, Arc<ControlService>) {
        let clock = Arc::new(ManualClock::new());
        let render = Arc::new(RenderService::new(
            Arc::new(SceneGraphService::new()),
            Box::new(HeadlessRenderer::offscreen()),
            clock.clone(),
        ));
        render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(100, 100))
            .unwrap();
        let controls = ControlService::new(Arc::clone(&render));
        (render, clock, controls)
    }

    fn drag(controls: &ControlService, dx: f32) {
        controls.dispatch_pointer(PointerEvent::Down {
            position: Vec2::ZERO,
            button: PointerButton::PRIMARY,
        });
        controls.dispatch_pointer(PointerEvent::Move {
            position: Vec2::new(dx, 0.0),
        });
        controls.dispatch_pointer(PointerEvent::Up {
            position: Vec2::new(dx, 0.0),
            button: PointerButton::PRIMARY,
        });
    }

    #[test]
    fn drag_orbits_and_renders_on_demand() {
        let (render, _, controls) = fixture();
        let before = render.camera_snapshot().position;
        drag(&controls, 90.0);
        let after = render.camera_snapshot().position;
        assert!((before.length() - after.length()).abs() < 1e-4);
        assert!(before.distance(after) > 0.1);
        assert_eq!(render.frames_rendered(), 1);
    }

    #[test]
    fn continuous_mode_skips_the_extra_frame() {
        let (render, _, controls) = fixture();
        render.set_render_config(&RenderConfig {
            continuous_rendering: Some(true),
            ..RenderConfig::default()
        });
        drag(&controls, 30.0);
        assert_eq!(render.frames_rendered(), 0);
    }

    #[test]
    fn wheel_dollies_within_limits() {
        let (render, _, controls) = fixture();
        controls.update_controls(|c| c.max_distance = 5.2);
        controls.dispatch_pointer(PointerEvent::Wheel {
            position: Vec2::ZERO,
            delta: 1.0,
        });
        assert!((render.camera_snapshot().position.length() - 5.2).abs() < 1e-4);
        controls.dispatch_pointer(PointerEvent::Wheel {
            position: Vec2::ZERO,
            delta: -1.0,
        });
        assert!((render.camera_snapshot().position.length() - 5.2 * 0.95).abs() < 1e-4);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let (render, _, controls) = fixture();
        controls.set_enabled(false);
        let before = render.camera_snapshot();
        drag(&controls, 90.0);
        assert_eq!(render.camera_snapshot(), before);
    }

    #[test]
    fn auto_rotation_follows_frame_delta() {
        let (render, clock, controls) = fixture();
        controls.set_auto_rotate(true, 90.0);
        render.render_single_frame();
        clock.advance_millis(1000);
        render.render_single_frame();
        let position = render.camera_snapshot().position;
        assert!(position.z.abs() < 1e-3);
        assert!((position.x.abs() - 5.0).abs() < 1e-3);
    }
}
