mod build;

/// Configuration file used when `--config` is not given.
pub(crate) const DEFAULT_CONFIG: &str = "ngwdocker.yaml";

pub use build::build;
