//! Package hooks and the registry that maps package names to them.
//!
//! A package is a directory under `package/` (or the built-in base
//! package). Packages that need to contribute images, services, or event
//! handlers register a [`PackageHooks`] constructor; every other package
//! gets [`NoopHooks`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ngwdocker_core::{PackageSettings, PackageVersion};

use crate::error::{BuildError, Result};
use crate::topology::Topology;

/// Name of the built-in package that provides the base topology.
pub const BASE_PACKAGE: &str = "ngwdocker";

/// Package loaded before every other non-builtin package.
pub const PRIMARY_PACKAGE: &str = "nextgisweb";

#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    pub path: PathBuf,
    pub settings: PackageSettings,
    pub version: Option<PackageVersion>,
    /// Provided by this crate rather than a directory under `package/`
    pub builtin: bool,
}

impl PackageInfo {
    /// Location of the package sources inside the image.
    pub fn target(&self) -> String {
        format!("$NGWROOT/package/{}", self.name)
    }

    /// Whether the package is a python distribution installable with pip.
    pub fn is_python(&self) -> bool {
        !self.builtin && self.path.join("setup.py").exists()
    }

    /// Read the optional `VERSION` file of a package directory.
    pub fn read_version(path: &Path) -> Result<Option<PackageVersion>> {
        let vfile = path.join("VERSION");
        if !vfile.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&vfile).map_err(BuildError::io("read", &vfile))?;
        let version = PackageVersion::parse(&raw);
        tracing::debug!(path = %path.display(), version = %version, "package version");
        Ok(Some(version))
    }
}

/// Lifecycle callbacks of a package.
///
/// All packages run `setup` before any package runs `initialize`, so
/// `setup` sees the full package set and `initialize` may rely on every
/// package having subscribed its handlers.
pub trait PackageHooks {
    fn setup(&self, _package: &PackageInfo, _topology: &mut Topology) -> Result<()> {
        Ok(())
    }

    fn initialize(&self, _package: &PackageInfo, _topology: &mut Topology) -> Result<()> {
        Ok(())
    }
}

/// Hooks of a package that contributes nothing but its sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PackageHooks for NoopHooks {}

pub type HooksFactory = fn() -> Box<dyn PackageHooks>;

/// Maps package names to hook constructors.
pub struct PackageRegistry {
    factories: HashMap<String, HooksFactory>,
}

impl PackageRegistry {
    /// A registry without any package, not even the base one.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, factory: HooksFactory) -> &mut Self {
        self.factories.insert(name.to_owned(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Hooks for `name`, falling back to [`NoopHooks`].
    pub fn hooks_for(&self, name: &str) -> Box<dyn PackageHooks> {
        match self.factories.get(name) {
            Some(factory) => factory(),
            None => {
                tracing::debug!(package = %name, "no hooks registered, using defaults");
                Box::new(NoopHooks)
            }
        }
    }
}

impl Default for PackageRegistry {
    /// Registry with the built-in base package.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(BASE_PACKAGE, || Box::new(crate::base::BasePackage));
        registry
    }
}
