//! Error types for the viewer runtime.

use thiserror::Error;

use crate::features::FeatureId;

/// Failures raised while fetching or preparing an asset.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("unsupported file extension `{extension}` for {path}")]
    UnsupportedExtension { path: String, extension: String },

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no renderer is available to prepare {0}")]
    RendererUnavailable(String),
}

/// Failures raised while turning a light setup into a light.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LightError {
    #[error("unknown light type: {0}")]
    UnknownLightType(String),
}

/// Failures raised by the animation service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnimationError {
    #[error("no animation mixer for object: {0}")]
    UnknownObject(String),

    #[error("object {object} has no clip named {clip}")]
    UnknownClip { object: String, clip: String },

    #[error("no animation action is active")]
    NoActiveAction,
}

/// Failures raised by the feature registry and by individual features.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureError {
    #[error("feature already registered: {0}")]
    FeatureAlreadyRegistered(FeatureId),

    #[error("feature not registered: {0}")]
    FeatureNotRegistered(FeatureId),

    #[error("feature registry has no component registry attached")]
    MissingComponentRegistry,

    #[error("invalid configuration for feature {id}: {message}")]
    InvalidConfig { id: FeatureId, message: String },

    #[error("unknown light scenario: {0}")]
    UnknownScenario(String),

    #[error("unknown highlight: {0}")]
    UnknownHighlight(String),

    #[error("feature {0} is disabled")]
    Disabled(FeatureId),

    #[error(transparent)]
    Light(#[from] LightError),
}

/// Top level viewer errors.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("render backend `{backend}` cannot draw into a {target} target")]
    UnsupportedTarget {
        backend: &'static str,
        target: &'static str,
    },

    #[error("invalid viewer configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Light(#[from] LightError),

    #[error(transparent)]
    Animation(#[from] AnimationError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
