//! Core services of the viewer. Each one owns a slice of the runtime and
//! exposes its state through channels.

pub mod animation;
pub mod asset;
pub mod config;
pub mod control;
pub mod light;
pub mod loading;
pub mod material;
pub mod render;
pub mod scene_graph;
pub mod tasks;

pub use animation::{AnimationId, AnimationService};
pub use asset::AssetService;
pub use config::ConfigService;
pub use control::{ControlService, OrbitControls, PointerInput};
pub use light::{LightService, LightSetup};
pub use loading::{LoadFailure, LoadingManager, LoadingState};
pub use material::MaterialService;
pub use render::{FrameTick, RenderService, RESIZE_DEBOUNCE};
pub use scene_graph::SceneGraphService;
pub use tasks::TaskQueue;
