use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{Color, RenderSize, ShadowMapType};
use crate::engine::camera::PerspectiveCamera;
use crate::engine::texture::{EnvironmentMap, Texture};
use crate::engine::RenderBackend;
use crate::scene::Scene;
use crate::viewport::{RenderTarget, TargetKind};

/// Counters exposed by [`HeadlessRenderer`] so callers can observe what was
/// drawn after the renderer has been handed to the runtime.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames: AtomicU64,
    objects: AtomicUsize,
    lights: AtomicUsize,
}

impl RenderStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn last_object_count(&self) -> usize {
        self.objects.load(Ordering::Acquire)
    }

    pub fn last_light_count(&self) -> usize {
        self.lights.load(Ordering::Acquire)
    }
}

/// Render backend without a GPU. It keeps the renderer state the runtime
/// configures and counts frames; useful for headless image pipelines and
/// tests.
#[derive(Debug)]
pub struct HeadlessRenderer {
    accepts: TargetKind,
    size: RenderSize,
    pixel_ratio: f32,
    clear: (Color, f32),
    shadow_map: (bool, ShadowMapType),
    auto_clear: bool,
    stats: Arc<RenderStats>,
}

impl HeadlessRenderer {
    /// Renderer bound to off-screen, size-only targets.
    pub fn offscreen() -> Self {
        Self::for_target(TargetKind::Offscreen)
    }

    /// Renderer bound to on-screen surfaces.
    pub fn surface() -> Self {
        Self::for_target(TargetKind::Surface)
    }

    fn for_target(accepts: TargetKind) -> Self {
        Self {
            accepts,
            size: RenderSize::new(1, 1),
            pixel_ratio: 1.0,
            clear: (Color::BLACK, 1.0),
            shadow_map: (false, ShadowMapType::default()),
            auto_clear: true,
            stats: Arc::new(RenderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn clear_color(&self) -> (Color, f32) {
        self.clear
    }

    pub fn shadow_map(&self) -> (bool, ShadowMapType) {
        self.shadow_map
    }

    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }
}

impl RenderBackend for HeadlessRenderer {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn supports_target(&self, target: &RenderTarget) -> bool {
        target.kind() == self.accepts
    }

    fn set_size(&mut self, size: RenderSize) {
        self.size = size;
    }

    fn size(&self) -> RenderSize {
        self.size
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn set_clear_color(&mut self, color: Color, alpha: f32) {
        self.clear = (color, alpha);
    }

    fn set_shadow_map(&mut self, enabled: bool, kind: ShadowMapType) {
        self.shadow_map = (enabled, kind);
    }

    fn set_auto_clear(&mut self, auto_clear: bool) {
        self.auto_clear = auto_clear;
    }

    fn render(&mut self, scene: &Scene, _camera: &PerspectiveCamera) {
        self.stats.objects.store(scene.objects.len(), Ordering::Release);
        self.stats.lights.store(scene.lights.len(), Ordering::Release);
        self.stats.frames.fetch_add(1, Ordering::AcqRel);
    }

    fn prepare_environment(&mut self, source: &Texture, resolution: u32) -> EnvironmentMap {
        EnvironmentMap {
            source: source.source.clone(),
            resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames_and_checks_target_kind() {
        let mut renderer = HeadlessRenderer::offscreen();
        let stats = renderer.stats();
        assert!(renderer.supports_target(&RenderTarget::offscreen(4, 4)));
        renderer.render(&Scene::default(), &PerspectiveCamera::default());
        renderer.render(&Scene::default(), &PerspectiveCamera::default());
        assert_eq!(stats.frames(), 2);
    }
}
