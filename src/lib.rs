//! Embeddable 3D model viewer runtime.
//!
//! The crate composes a set of services (scene graph, rendering, assets,
//! lights, materials, animation, controls) around a declarative
//! [`ViewerConfig`] and lets optional features plug into them. Drawing and
//! file decoding stay behind the traits in [`engine`] so that the runtime
//! remains testable and easy to embed in headless tools.

pub mod app;
pub mod channel;
pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod features;
pub mod input;
pub mod scene;
pub mod services;
pub mod viewer;
pub mod viewport;

pub use channel::{ReplaySubject, Subject, Subscription};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CameraConfig, Color, FeatureConfig, ObjectSetup, ProjectInfo, RenderConfig, RenderSize,
    ShadowMapType, ViewerConfig,
};
pub use context::ServiceContext;
pub use engine::{AssetLoader, HeadlessRenderer, JsonAssetLoader, MemoryAssetLoader, RenderBackend};
pub use error::{
    AnimationError, FeatureError, LightError, LoadError, ViewerError, ViewerResult,
};
pub use features::{Feature, FeatureId, FeatureRegistry, FeatureService};
pub use input::{PointerButton, PointerEvent, PointerState};
pub use scene::{Background, Scene, SceneNode};
pub use viewer::{Viewer, ViewerLauncher};
pub use viewport::{RenderTarget, TargetKind, ViewportProvider, WindowViewport};
