//! Camera navigation between free orbiting and highlight close-ups.
//!
//! [`HighlightNavigator`] is a plain state machine over a camera value. It
//! never touches services; the highlight feature feeds it frame deltas and
//! pointer gestures and writes the stepped camera back.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::engine::camera::PerspectiveCamera;

/// Remaining distance under which an eased quantity snaps to its target.
pub const EPSILON: f32 = 1e-3;
/// Pointer travel, in pixels, that counts as a drag away from a highlight.
pub const DRAG_THRESHOLD: f32 = 5.0;
pub const DEFAULT_ORBIT_DISTANCE: f32 = 5.0;
/// Easing speed per millisecond.
pub const DEFAULT_SPEED: f32 = 0.004;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HighlightMode {
    #[default]
    Orbit,
    ToHighlight,
    Highlight,
    ToOrbit,
}

/// Easing speeds of one highlight. Zero snaps immediately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSpeed {
    /// Position and view easing while approaching the highlight.
    #[serde(rename = "in")]
    pub ease_in: f32,
    /// View and distance easing while returning to orbit.
    #[serde(rename = "out")]
    pub ease_out: f32,
    pub fov: f32,
}

impl Default for HighlightSpeed {
    fn default() -> Self {
        Self {
            ease_in: DEFAULT_SPEED,
            ease_out: DEFAULT_SPEED,
            fov: DEFAULT_SPEED,
        }
    }
}

/// Where the camera sits, what it looks at and how wide it sees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub view: Vec3,
    pub fov: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTarget {
    pub id: String,
    pub pose: CameraPose,
    pub speed: HighlightSpeed,
}

fn factor(speed: f32, dt_ms: f32) -> f32 {
    if speed <= 0.0 {
        1.0
    } else {
        (speed * dt_ms).clamp(0.0, 1.0)
    }
}

fn ease_scalar(value: f32, target: f32, speed: f32, dt_ms: f32) -> (f32, bool) {
    let next = value + (target - value) * factor(speed, dt_ms);
    if (target - next).abs() < EPSILON {
        (target, true)
    } else {
        (next, false)
    }
}

fn ease_vec(value: Vec3, target: Vec3, speed: f32, dt_ms: f32) -> (Vec3, bool) {
    let next = value.lerp(target, factor(speed, dt_ms));
    if next.distance(target) < EPSILON {
        (target, true)
    } else {
        (next, false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightNavigator {
    mode: HighlightMode,
    base_fov: f32,
    orbit_distance: f32,
    focus: Option<NavigationTarget>,
    speed: HighlightSpeed,
    view: Vec3,
    wheel_seen: bool,
}

impl HighlightNavigator {
    pub fn new(base_fov: f32, orbit_distance: f32) -> Self {
        Self {
            mode: HighlightMode::Orbit,
            base_fov,
            orbit_distance,
            focus: None,
            speed: HighlightSpeed::default(),
            view: Vec3::ZERO,
            wheel_seen: false,
        }
    }

    pub fn mode(&self) -> HighlightMode {
        self.mode
    }

    pub fn base_fov(&self) -> f32 {
        self.base_fov
    }

    pub fn focused(&self) -> Option<&str> {
        self.focus.as_ref().map(|target| target.id.as_str())
    }

    /// Point the camera is currently steered to look at.
    pub fn view(&self) -> Vec3 {
        self.view
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.mode, HighlightMode::ToHighlight | HighlightMode::ToOrbit)
    }

    pub fn can_select(&self) -> bool {
        self.mode != HighlightMode::ToHighlight
    }

    /// Starts moving toward `target`. `orbit_view` is the orbit target the
    /// camera looks at when the move starts from free orbiting.
    pub fn select(&mut self, target: NavigationTarget, orbit_view: Vec3) -> bool {
        if !self.can_select() {
            return false;
        }
        if self.mode == HighlightMode::Orbit {
            self.view = orbit_view;
        }
        self.speed = target.speed;
        self.focus = Some(target);
        self.wheel_seen = false;
        self.mode = HighlightMode::ToHighlight;
        true
    }

    /// Drops the focus and eases back to orbiting.
    pub fn release(&mut self) -> bool {
        match self.mode {
            HighlightMode::Highlight | HighlightMode::ToHighlight => {
                self.focus = None;
                self.wheel_seen = false;
                self.mode = HighlightMode::ToOrbit;
                true
            }
            HighlightMode::Orbit | HighlightMode::ToOrbit => false,
        }
    }

    /// A drag while pinned to a highlight hands control back to the user.
    pub fn note_drag(&mut self, distance: f32) -> bool {
        self.mode == HighlightMode::Highlight && distance > DRAG_THRESHOLD && self.release()
    }

    /// Once the user scrolls, the return trip stops pulling the distance.
    pub fn note_wheel(&mut self) {
        if self.mode == HighlightMode::ToOrbit {
            self.wheel_seen = true;
        }
    }

    /// Advances the camera by `dt_ms` milliseconds. Returns the new mode
    /// when a transition happened.
    pub fn step(&mut self, camera: &mut PerspectiveCamera, dt_ms: f32) -> Option<HighlightMode> {
        let next = match self.mode {
            HighlightMode::Orbit => return None,
            HighlightMode::ToHighlight => self.step_to_highlight(camera, dt_ms),
            HighlightMode::Highlight => {
                if let Some(target) = &self.focus {
                    camera.position = target.pose.position;
                    camera.fov = target.pose.fov;
                    self.view = target.pose.view;
                }
                None
            }
            HighlightMode::ToOrbit => self.step_to_orbit(camera, dt_ms),
        };
        camera.look_at(self.view);
        camera.update_projection_matrix();
        if let Some(mode) = next {
            self.mode = mode;
        }
        next
    }

    fn step_to_highlight(
        &mut self,
        camera: &mut PerspectiveCamera,
        dt_ms: f32,
    ) -> Option<HighlightMode> {
        let target = self.focus.as_ref()?;
        let (position, position_done) = ease_vec(
            camera.position,
            target.pose.position,
            target.speed.ease_in,
            dt_ms,
        );
        let (view, view_done) =
            ease_vec(self.view, target.pose.view, target.speed.ease_in, dt_ms);
        let (fov, fov_done) = ease_scalar(camera.fov, target.pose.fov, target.speed.fov, dt_ms);

        camera.position = position;
        camera.fov = fov;
        self.view = view;
        (position_done && view_done && fov_done).then_some(HighlightMode::Highlight)
    }

    fn step_to_orbit(&mut self, camera: &mut PerspectiveCamera, dt_ms: f32) -> Option<HighlightMode> {
        let (fov, fov_done) = ease_scalar(camera.fov, self.base_fov, self.speed.fov, dt_ms);
        let (view, view_done) = ease_vec(self.view, Vec3::ZERO, self.speed.ease_out, dt_ms);

        let offset = camera.position - view;
        let direction = offset.try_normalize().unwrap_or(Vec3::Z);
        let radius = offset.length();
        let (radius, radius_done) = if self.wheel_seen {
            (radius, true)
        } else {
            ease_scalar(radius, self.orbit_distance, self.speed.ease_out, dt_ms)
        };

        camera.fov = fov;
        camera.position = view + direction * radius;
        self.view = view;
        (fov_done && view_done && radius_done).then(|| {
            self.wheel_seen = false;
            HighlightMode::Orbit
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::default();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.fov = 45.0;
        camera.look_at(Vec3::ZERO);
        camera
    }

    fn target(speed: HighlightSpeed) -> NavigationTarget {
        NavigationTarget {
            id: "door".into(),
            pose: CameraPose {
                position: Vec3::new(2.0, 1.0, 2.0),
                view: Vec3::new(1.0, 0.5, 0.0),
                fov: 30.0,
            },
            speed,
        }
    }

    #[test]
    fn eases_into_highlight_in_finite_ticks() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        let mut camera = camera();
        assert!(navigator.select(target(HighlightSpeed::default()), Vec3::ZERO));
        assert_eq!(navigator.mode(), HighlightMode::ToHighlight);

        let mut ticks = 0;
        while navigator.mode() == HighlightMode::ToHighlight {
            navigator.step(&mut camera, 16.0);
            ticks += 1;
            assert!(ticks < 1000, "navigation never converged");
        }
        assert_eq!(navigator.mode(), HighlightMode::Highlight);
        assert_eq!(camera.position, Vec3::new(2.0, 1.0, 2.0));
        assert_eq!(camera.fov, 30.0);
        assert_eq!(navigator.view(), Vec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn zero_speed_snaps_in_one_tick() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        let mut camera = camera();
        navigator.select(
            target(HighlightSpeed {
                ease_in: 0.0,
                ease_out: 0.0,
                fov: 0.0,
            }),
            Vec3::ZERO,
        );
        assert_eq!(
            navigator.step(&mut camera, 16.0),
            Some(HighlightMode::Highlight)
        );
        assert_eq!(camera.fov, 30.0);

        assert!(navigator.release());
        assert_eq!(navigator.step(&mut camera, 16.0), Some(HighlightMode::Orbit));
        assert_eq!(camera.fov, 45.0);
        assert!((camera.position.length() - DEFAULT_ORBIT_DISTANCE).abs() < 1e-4);
    }

    #[test]
    fn zero_speed_on_one_axis_only_snaps_that_axis() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        let mut camera = camera();
        navigator.select(
            target(HighlightSpeed {
                fov: 0.0,
                ..HighlightSpeed::default()
            }),
            Vec3::ZERO,
        );
        navigator.step(&mut camera, 16.0);
        assert_eq!(camera.fov, 30.0);
        assert_ne!(camera.position, Vec3::new(2.0, 1.0, 2.0));
        assert_eq!(navigator.mode(), HighlightMode::ToHighlight);
    }

    #[test]
    fn selection_is_ignored_while_approaching() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        navigator.select(target(HighlightSpeed::default()), Vec3::ZERO);
        let mut other = target(HighlightSpeed::default());
        other.id = "wheel".into();
        assert!(!navigator.select(other, Vec3::ZERO));
        assert_eq!(navigator.focused(), Some("door"));
    }

    #[test]
    fn small_drags_keep_the_highlight() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        let mut camera = camera();
        navigator.select(
            target(HighlightSpeed {
                ease_in: 0.0,
                ease_out: 0.0,
                fov: 0.0,
            }),
            Vec3::ZERO,
        );
        navigator.step(&mut camera, 16.0);
        assert!(!navigator.note_drag(3.0));
        assert_eq!(navigator.mode(), HighlightMode::Highlight);
        assert!(navigator.note_drag(12.0));
        assert_eq!(navigator.mode(), HighlightMode::ToOrbit);
        assert_eq!(navigator.focused(), None);
    }

    #[test]
    fn wheel_suppresses_distance_easing_on_the_way_back() {
        let mut navigator = HighlightNavigator::new(45.0, DEFAULT_ORBIT_DISTANCE);
        let mut camera = camera();
        navigator.select(
            target(HighlightSpeed {
                ease_in: 0.0,
                ..HighlightSpeed::default()
            }),
            Vec3::ZERO,
        );
        while navigator.mode() != HighlightMode::Highlight {
            navigator.step(&mut camera, 16.0);
        }
        navigator.release();
        navigator.note_wheel();
        let mut ticks = 0;
        while navigator.mode() == HighlightMode::ToOrbit {
            navigator.step(&mut camera, 16.0);
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert_eq!(navigator.mode(), HighlightMode::Orbit);
        assert_eq!(camera.fov, 45.0);
        assert_eq!(navigator.view(), Vec3::ZERO);
        assert!((camera.position.length() - DEFAULT_ORBIT_DISTANCE).abs() > 0.1);
    }
}
