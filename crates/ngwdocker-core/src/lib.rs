//! Core types and helpers for ngwdocker.
//!
//! This crate defines the `ngwdocker.yaml` schema ([`Settings`]), the
//! `.env` codec, the [`Git`] executor seam, and shared error types.

pub mod config;
pub mod envfile;
pub mod error;
pub mod git;
pub mod util;
pub mod version;

pub use config::{
    Mode, PackageSettings, RegistrySettings, RepositorySettings, Settings, StackSettings,
};
pub use envfile::{EnvValues, read_envfile, write_envfile};
pub use error::{Error, Result};
pub use git::{Git, RealGit};
pub use version::PackageVersion;
