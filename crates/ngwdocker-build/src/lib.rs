//! Dockerfile and docker-compose generation for NextGIS Web.
//!
//! # Build pipeline
//!
//! ```text
//! ngwdocker
//!   1. Packages   ── ngwdocker (built-in), nextgisweb, package/* by name
//!   2. Setup      ── PackageHooks::setup for every package
//!   3. Initialize ── PackageHooks::initialize: images, services, volumes
//!   4. Configure  ── Image::configure per image → build/<image>/Dockerfile
//!   5. Compose    ── ComposeGenerator::render() → docker-compose.yaml
//!   6. Env file   ── .env, previous version kept when it changed
//! ```
//!
//! # Events
//!
//! Image recipes emit their steps as events ([`events`]). Packages
//! subscribe to them on the [`EventBus`] during the lifecycle passes and
//! can add apt packages, home directories, python requirements, config
//! options or trailing instructions to any image before it is rendered.

pub mod base;
pub mod compose;
pub mod context;
pub mod error;
pub mod event;
pub mod events;
pub mod image;
pub mod package;
pub mod service;
pub mod topology;

pub use compose::ComposeGenerator;
pub use context::{BuildOutput, Context};
pub use error::{BuildError, HandlerError, Result};
pub use event::{Event, EventBus, EventKind, HandlerResult, Notified, Renderable};
pub use image::{BuildCx, Image, ImageRecipe, Owner, Profile};
pub use package::{NoopHooks, PackageHooks, PackageInfo, PackageRegistry};
pub use service::{Mount, MountKind, Service, ServiceImage, Ulimit};
pub use topology::Topology;
