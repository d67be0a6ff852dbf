use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error};
use parking_lot::Mutex;

use crate::channel::{ReplaySubject, Subject, Subscription};
use crate::clock::Clock;
use crate::config::{CameraConfig, RenderConfig, RenderSize, ViewerConfig};
use crate::engine::camera::PerspectiveCamera;
use crate::engine::texture::{EnvironmentMap, Texture};
use crate::engine::{Composer, RenderBackend};
use crate::error::{LoadError, ViewerError, ViewerResult};
use crate::services::scene_graph::SceneGraphService;
use crate::viewport::RenderTarget;

/// Quiet period after the last window resize before the target is
/// re-measured.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Timing of one rendered frame, passed to the render hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub frame: u64,
    pub delta: Duration,
    pub elapsed: Duration,
}

impl FrameTick {
    pub fn delta_millis(&self) -> f32 {
        self.delta.as_secs_f32() * 1000.0
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

struct RenderState {
    backend: Box<dyn RenderBackend>,
    composer: Composer,
    camera: PerspectiveCamera,
    camera_config: CameraConfig,
    render_config: RenderConfig,
    target: Option<RenderTarget>,
    aspect_override: bool,
    loop_installed: bool,
    /// Features currently animating the camera; they keep the loop running
    /// without touching the configured flag.
    continuous_holds: usize,
    last_frame: Option<Duration>,
    frame: u64,
    resize_due: Option<Duration>,
}

/// Owns the renderer, the post-processing composer and the camera, and
/// drives rendering.
pub struct RenderService {
    scene_graph: Arc<SceneGraphService>,
    clock: Arc<dyn Clock>,
    state: Mutex<RenderState>,
    rendering: AtomicBool,
    camera: ReplaySubject<PerspectiveCamera>,
    render_config: ReplaySubject<RenderConfig>,
    before_render: Subject<FrameTick>,
    after_render: Subject<FrameTick>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl RenderService {
    pub fn new(
        scene_graph: Arc<SceneGraphService>,
        backend: Box<dyn RenderBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let size = backend.size();
        Self {
            scene_graph,
            clock,
            state: Mutex::new(RenderState {
                backend,
                composer: Composer::new(size),
                camera: PerspectiveCamera::default(),
                camera_config: CameraConfig::defaults(size.aspect()),
                render_config: RenderConfig::defaults(size),
                target: None,
                aspect_override: false,
                loop_installed: false,
                continuous_holds: 0,
                last_frame: None,
                frame: 0,
                resize_due: None,
            }),
            rendering: AtomicBool::new(false),
            camera: ReplaySubject::new(),
            render_config: ReplaySubject::new(),
            before_render: Subject::new(),
            after_render: Subject::new(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Re-applies camera and render sections whenever a configuration is
    /// loaded.
    pub fn connect(self: &Arc<Self>, configs: &ReplaySubject<Arc<ViewerConfig>>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = configs.subscribe(move |config| {
            if let Some(render) = weak.upgrade() {
                render.apply_config(config);
            }
        });
        self.subscriptions.lock().push(subscription);
    }

    pub fn camera(&self) -> ReplaySubject<PerspectiveCamera> {
        self.camera.clone()
    }

    pub fn render_config(&self) -> ReplaySubject<RenderConfig> {
        self.render_config.clone()
    }

    pub fn before_render(&self) -> Subject<FrameTick> {
        self.before_render.clone()
    }

    pub fn after_render(&self) -> Subject<FrameTick> {
        self.after_render.clone()
    }

    /// Binds the renderer to a target. Fails when the backend cannot draw
    /// into that kind of target.
    pub fn attach_target(&self, target: RenderTarget) -> ViewerResult<RenderSize> {
        let mut state = self.state.lock();
        if !state.backend.supports_target(&target) {
            let backend = state.backend.name();
            error!(
                "render backend `{backend}` cannot draw into a {} target",
                target.kind().as_str()
            );
            return Err(ViewerError::UnsupportedTarget {
                backend,
                target: target.kind().as_str(),
            });
        }
        let size = target.measure();
        state.target = Some(target);
        Ok(size)
    }

    pub fn init(&self, config: &ViewerConfig, target: RenderTarget) -> ViewerResult<()> {
        self.attach_target(target)?;
        self.apply_config(config);
        Ok(())
    }

    /// Overlays the configuration's camera and render sections on the
    /// defaults for the current target size and applies the result.
    pub fn apply_config(&self, config: &ViewerConfig) {
        let size = {
            let mut state = self.state.lock();
            let Some(target) = state.target.as_ref() else {
                debug!("no render target attached yet; camera and render config deferred");
                return;
            };
            let size = target.measure();
            state.aspect_override = config.camera.aspect.is_some();
            size
        };
        let camera = CameraConfig::defaults(size.aspect()).overlay(&config.camera);
        let render = RenderConfig::defaults(size).overlay(&config.render);
        self.set_camera_config(&camera);
        self.set_render_config(&render);
    }

    pub fn set_camera_config(&self, patch: &CameraConfig) {
        let snapshot = {
            let mut state = self.state.lock();
            let camera = &mut state.camera;
            if let Some(aspect) = patch.aspect {
                camera.aspect = aspect;
            }
            if let Some(near) = patch.near {
                camera.near = near;
            }
            if let Some(far) = patch.far {
                camera.far = far;
            }
            if let Some(fov) = patch.fov {
                camera.fov = fov;
            }
            if let Some(position) = patch.position {
                camera.position = position;
            }
            if let Some(target) = patch.target {
                camera.look_at(target);
            }
            camera.update_projection_matrix();
            let snapshot = *camera;
            state.camera_config = state.camera_config.overlay(patch);
            snapshot
        };
        self.camera.publish(snapshot);
    }

    pub fn set_render_config(&self, patch: &RenderConfig) {
        let merged = {
            let mut state = self.state.lock();
            let merged = state.render_config.overlay(patch);
            if patch.clear_color.is_some() || patch.clear_alpha.is_some() {
                state.backend.set_clear_color(
                    merged.clear_color.unwrap_or(crate::config::Color::WHITE),
                    merged.clear_alpha.unwrap_or(1.0),
                );
            }
            if let Some(continuous) = patch.continuous_rendering {
                if continuous != state.loop_installed {
                    debug!(
                        "{} continuous render loop",
                        if continuous { "installing" } else { "removing" }
                    );
                }
                state.loop_installed = continuous;
            }
            if let Some(ratio) = patch.pixel_ratio {
                state.backend.set_pixel_ratio(ratio);
            }
            if let Some(size) = patch.render_size {
                state.backend.set_size(size);
                state.composer.set_size(size);
            }
            if patch.shadow_map_enabled.is_some() || patch.shadow_map_type.is_some() {
                state.backend.set_shadow_map(
                    merged.shadow_map_enabled.unwrap_or(false),
                    merged.shadow_map_type.unwrap_or_default(),
                );
            }
            if let Some(auto_clear) = patch.auto_clear {
                state.backend.set_auto_clear(auto_clear);
            }
            state.render_config = merged;
            merged
        };
        self.render_config.publish(merged);
    }

    pub fn camera_snapshot(&self) -> PerspectiveCamera {
        self.state.lock().camera
    }

    /// Mutates the camera, refreshes its projection and republishes it.
    pub fn update_camera<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut PerspectiveCamera) -> R,
    {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = update(&mut state.camera);
            state.camera.update_projection_matrix();
            (result, state.camera)
        };
        self.camera.publish(snapshot);
        result
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().target.is_some()
    }

    /// True while the configuration asks for continuous rendering or any
    /// feature holds the loop.
    pub fn is_continuous(&self) -> bool {
        let state = self.state.lock();
        state.loop_installed || state.continuous_holds > 0
    }

    /// Keeps the render loop running until the matching
    /// [`release_continuous`](Self::release_continuous).
    pub fn hold_continuous(&self) {
        let mut state = self.state.lock();
        state.continuous_holds += 1;
        debug!("continuous render hold taken ({} active)", state.continuous_holds);
    }

    pub fn release_continuous(&self) {
        let mut state = self.state.lock();
        state.continuous_holds = state.continuous_holds.saturating_sub(1);
        debug!("continuous render hold released ({} active)", state.continuous_holds);
    }

    pub fn renderer_size(&self) -> RenderSize {
        self.state.lock().backend.size()
    }

    pub fn composer_size(&self) -> RenderSize {
        self.state.lock().composer.size()
    }

    pub fn add_post_pass(&self, name: &str) {
        self.state.lock().composer.add_pass(name);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frame
    }

    /// Fires the before hook, draws once and fires the after hook. Does
    /// nothing until a target is attached, or when called from inside a
    /// render hook.
    pub fn render_single_frame(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        if self
            .rendering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let tick = {
            let mut state = self.state.lock();
            let now = self.clock.now();
            let delta = state
                .last_frame
                .map(|last| now.saturating_sub(last))
                .unwrap_or(Duration::ZERO);
            state.last_frame = Some(now);
            state.frame += 1;
            FrameTick {
                frame: state.frame,
                delta,
                elapsed: now,
            }
        };

        self.before_render.publish(tick);
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let camera = state.camera;
            let backend = &mut state.backend;
            self.scene_graph
                .with_scene(|scene| backend.render(scene, &camera));
        }
        self.after_render.publish(tick);

        self.rendering.store(false, Ordering::Release);
        true
    }

    /// Entry point for the display refresh callback: applies a due resize
    /// and renders when the continuous loop is installed.
    pub fn animation_frame(&self) -> bool {
        let resized = self.apply_pending_resize();
        if self.is_continuous() {
            self.render_single_frame()
        } else {
            resized
        }
    }

    /// Records a window resize; the target is re-measured once no further
    /// resize arrived for [`RESIZE_DEBOUNCE`].
    pub fn schedule_resize(&self) {
        let due = self.clock.now() + RESIZE_DEBOUNCE;
        self.state.lock().resize_due = Some(due);
    }

    pub fn apply_pending_resize(&self) -> bool {
        let due = {
            let mut state = self.state.lock();
            match state.resize_due {
                Some(due) if due <= self.clock.now() => {
                    state.resize_due = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            self.handle_resize();
        }
        due
    }

    /// Re-measures the target, resizes renderer and composer, refreshes the
    /// camera aspect and forces one frame.
    pub fn handle_resize(&self) {
        let (size, aspect_override) = {
            let state = self.state.lock();
            let Some(target) = state.target.as_ref() else {
                return;
            };
            (target.measure(), state.aspect_override)
        };
        self.set_render_config(&RenderConfig {
            render_size: Some(size),
            ..RenderConfig::default()
        });
        if !aspect_override {
            self.set_camera_config(&CameraConfig {
                aspect: Some(size.aspect()),
                ..CameraConfig::default()
            });
        }
        self.render_single_frame();
    }

    pub fn prepare_environment(
        &self,
        source: &Texture,
        resolution: u32,
    ) -> Result<EnvironmentMap, LoadError> {
        let mut state = self.state.lock();
        if state.target.is_none() {
            return Err(LoadError::RendererUnavailable(source.source.clone()));
        }
        Ok(state.backend.prepare_environment(source, resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::HeadlessRenderer;
    use crate::viewport::WindowViewport;
    use glam::Vec3;

    fn service() -> (Arc<RenderService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let render = Arc::new(RenderService::new(
            Arc::new(SceneGraphService::new()),
            Box::new(HeadlessRenderer::offscreen()),
            clock.clone(),
        ));
        (render, clock)
    }

    #[test]
    fn wrong_target_kind_fails_loudly() {
        let (render, _) = service();
        let surface = RenderTarget::surface(Arc::new(WindowViewport::new(10, 10)));
        assert!(matches!(
            render.attach_target(surface),
            Err(ViewerError::UnsupportedTarget { .. })
        ));
        assert!(!render.render_single_frame());
    }

    #[test]
    fn init_overlays_config_on_defaults() {
        let (render, _) = service();
        let config = ViewerConfig {
            camera: CameraConfig {
                fov: Some(60.0),
                position: Some(Vec3::new(0.0, 0.0, 10.0)),
                ..CameraConfig::default()
            },
            ..ViewerConfig::default()
        };
        render.init(&config, RenderTarget::offscreen(400, 200)).unwrap();
        let camera = render.camera_snapshot();
        assert_eq!(camera.fov, 60.0);
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(camera.near, CameraConfig::DEFAULT_NEAR);
        assert!(camera.direction().distance(Vec3::NEG_Z) < 1e-4);
        assert_eq!(render.renderer_size(), RenderSize::new(400, 200));
        assert!(!render.is_continuous());
    }

    #[test]
    fn render_size_reaches_renderer_and_composer_before_publish() {
        let (render, _) = service();
        render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(100, 100))
            .unwrap();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let observed_render = Arc::clone(&render);
        let _sub = render.render_config().subscribe(move |_| {
            sink.lock()
                .push((observed_render.renderer_size(), observed_render.composer_size()));
        });
        render.set_render_config(&RenderConfig {
            render_size: Some(RenderSize::new(640, 480)),
            ..RenderConfig::default()
        });
        let observed = observed.lock();
        let last = observed.last().unwrap();
        assert_eq!(last.0, RenderSize::new(640, 480));
        assert_eq!(last.0, last.1);
        assert!(observed.iter().all(|(renderer, composer)| renderer == composer));
    }

    #[test]
    fn hooks_wrap_each_frame_with_clock_delta() {
        let (render, clock) = service();
        render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(10, 10))
            .unwrap();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let _before = render
            .before_render()
            .subscribe(move |tick: &FrameTick| sink.lock().push(tick.delta));
        render.render_single_frame();
        clock.advance_millis(16);
        render.render_single_frame();
        assert_eq!(
            *ticks.lock(),
            vec![Duration::ZERO, Duration::from_millis(16)]
        );
    }

    #[test]
    fn continuous_loop_renders_on_animation_frames_only_when_installed() {
        let (render, _) = service();
        render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(10, 10))
            .unwrap();
        assert!(!render.animation_frame());
        render.set_render_config(&RenderConfig {
            continuous_rendering: Some(true),
            ..RenderConfig::default()
        });
        assert!(render.animation_frame());
        assert!(render.animation_frame());
        assert_eq!(render.frames_rendered(), 2);
        render.set_render_config(&RenderConfig {
            continuous_rendering: Some(false),
            ..RenderConfig::default()
        });
        assert!(!render.animation_frame());
        assert_eq!(render.frames_rendered(), 2);
    }

    #[test]
    fn holds_keep_the_loop_without_touching_the_config() {
        let (render, _) = service();
        render
            .init(&ViewerConfig::default(), RenderTarget::offscreen(10, 10))
            .unwrap();
        render.hold_continuous();
        render.hold_continuous();
        assert!(render.is_continuous());
        assert_eq!(
            render.render_config().latest().unwrap().continuous_rendering,
            Some(false)
        );

        render.release_continuous();
        assert!(render.animation_frame());
        render.release_continuous();
        assert!(!render.is_continuous());

        render.set_render_config(&RenderConfig {
            continuous_rendering: Some(true),
            ..RenderConfig::default()
        });
        render.hold_continuous();
        render.release_continuous();
        assert!(render.is_continuous());
    }

    #[test]
    fn resize_is_debounced() {
        let clock = Arc::new(ManualClock::new());
        let render = RenderService::new(
            Arc::new(SceneGraphService::new()),
            Box::new(HeadlessRenderer::surface()),
            clock.clone(),
        );
        let window = Arc::new(WindowViewport::new(200, 100));
        render
            .init(&ViewerConfig::default(), RenderTarget::surface(window.clone()))
            .unwrap();

        window.update(300, 100);
        render.schedule_resize();
        clock.advance_millis(200);
        assert!(!render.apply_pending_resize());
        render.schedule_resize();
        clock.advance_millis(299);
        assert!(!render.apply_pending_resize());
        clock.advance_millis(1);
        assert!(render.apply_pending_resize());

        assert_eq!(render.renderer_size(), RenderSize::new(300, 100));
        assert_eq!(render.composer_size(), RenderSize::new(300, 100));
        assert_eq!(render.camera_snapshot().aspect, 3.0);
        assert_eq!(render.frames_rendered(), 1);
    }
}
