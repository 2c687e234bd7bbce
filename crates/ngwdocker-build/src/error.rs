use std::path::PathBuf;

use crate::event::EventKind;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Error type event handlers return; any error aborts the build.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Core(#[from] ngwdocker_core::Error),

    #[error("failed to {action} {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("copy source {path} does not exist")]
    MissingSource { path: PathBuf },

    // ── Events ──
    #[error("{kind} handler for image [{image}] failed")]
    Handler {
        image: String,
        kind: EventKind,
        source: HandlerError,
    },

    #[error("event of image [{expected}] rendered into image [{actual}]")]
    ImageMismatch { expected: String, actual: String },

    // ── Topology ──
    #[error("image [{0}] is already configured")]
    ImageConfigured(String),

    #[error("image [{0}] is already registered")]
    DuplicateImage(String),

    #[error("service [{0}] is already registered")]
    DuplicateService(String),

    #[error("service [{service}] uses unknown image [{image}]")]
    UnknownImage { service: String, image: String },

    #[error("service [{service}] depends on unknown service [{dependency}]")]
    UnknownDependency { service: String, dependency: String },

    #[error("package [{name}] not found in {path}")]
    PackageNotFound { name: String, path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to serialize compose file")]
    Compose(#[source] serde_yaml::Error),
}

impl BuildError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}
