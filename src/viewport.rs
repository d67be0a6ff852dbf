use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RenderSize;

/// Something on screen that a viewer can be mounted into and measured.
pub trait ViewportProvider: Send + Sync {
    /// Current bounding box size of the element, in pixels.
    fn viewport_size(&self) -> (u32, u32);
}

/// Viewport whose size follows its hosting window.
#[derive(Debug)]
pub struct WindowViewport {
    size: RwLock<(u32, u32)>,
}

impl WindowViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: RwLock::new((width, height)),
        }
    }

    pub fn update(&self, width: u32, height: u32) {
        *self.size.write() = (width.max(1), height.max(1));
    }
}

impl ViewportProvider for WindowViewport {
    fn viewport_size(&self) -> (u32, u32) {
        *self.size.read()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Surface,
    Offscreen,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Surface => "surface",
            TargetKind::Offscreen => "offscreen",
        }
    }
}

/// Where a viewer draws: an on-screen element measured on demand, or a
/// fixed size off-screen buffer for headless image generation.
#[derive(Clone)]
pub enum RenderTarget {
    Surface(Arc<dyn ViewportProvider>),
    Offscreen(RenderSize),
}

impl RenderTarget {
    pub fn surface(viewport: Arc<dyn ViewportProvider>) -> Self {
        RenderTarget::Surface(viewport)
    }

    pub fn offscreen(width: u32, height: u32) -> Self {
        RenderTarget::Offscreen(RenderSize::new(width, height))
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            RenderTarget::Surface(_) => TargetKind::Surface,
            RenderTarget::Offscreen(_) => TargetKind::Offscreen,
        }
    }

    pub fn measure(&self) -> RenderSize {
        match self {
            RenderTarget::Surface(viewport) => {
                let (width, height) = viewport.viewport_size();
                RenderSize::new(width.max(1), height.max(1))
            }
            RenderTarget::Offscreen(size) => *size,
        }
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTarget::Surface(viewport) => f
                .debug_tuple("Surface")
                .field(&viewport.viewport_size())
                .finish(),
            RenderTarget::Offscreen(size) => f.debug_tuple("Offscreen").field(size).finish(),
        }
    }
}
