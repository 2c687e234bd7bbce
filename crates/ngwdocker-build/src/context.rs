//! Build orchestration: package discovery, the two lifecycle passes,
//! image configuration and output files.
//!
//! ```text
//! Context::from_file(ngwdocker.yaml)
//!   load_packages  ── ngwdocker, nextgisweb, then the rest by name
//!   build
//!     1. clear build/
//!     2. read .env
//!     3. setup       ── every package
//!     4. initialize  ── every package
//!     5. configure   ── every image, in registration order
//!     6. compose     ── docker-compose.yaml
//!     7. write .env
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use ngwdocker_core::{Git, RealGit, Settings, read_envfile, write_envfile};

use crate::compose::ComposeGenerator;
use crate::error::{BuildError, Result};
use crate::image::Owner;
use crate::package::{BASE_PACKAGE, PRIMARY_PACKAGE, PackageHooks, PackageInfo, PackageRegistry};
use crate::topology::Topology;

pub const COMPOSE_FILE: &str = "docker-compose.yaml";
pub const ENV_FILE: &str = ".env";

/// What a build wrote.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub compose_file: PathBuf,
    pub env_file: PathBuf,
    /// Previous env file, when its content changed
    pub env_backup: Option<PathBuf>,
    pub images: Vec<String>,
    pub services: Vec<String>,
}

pub struct Context {
    topology: Topology,
    hooks: IndexMap<String, Box<dyn PackageHooks>>,
    git: Box<dyn Git>,
}

impl Context {
    /// Load settings from `path`; the project directory is its parent.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = Settings::load(path)?;
        let project_path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok(Self::new(project_path, settings))
    }

    pub fn new(project_path: impl Into<PathBuf>, settings: Settings) -> Self {
        let owner = Owner::detect(settings.mode);
        Self {
            topology: Topology::new(project_path, settings, owner),
            hooks: IndexMap::new(),
            git: Box::new(RealGit),
        }
    }

    pub fn with_git(mut self, git: Box<dyn Git>) -> Self {
        self.git = git;
        self
    }

    /// Override the detected owner of files inside images.
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.topology.set_owner(owner);
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Discover, order, update and register packages.
    pub fn load_packages(&mut self, registry: &PackageRegistry) -> Result<()> {
        let package_path = self.topology.package_path();
        ensure_dir(&package_path)?;
        ensure_dir(self.topology.build_path())?;

        let base = PackageInfo {
            name: BASE_PACKAGE.to_owned(),
            path: self.topology.project_path().to_path_buf(),
            settings: self.topology.settings().package_settings(BASE_PACKAGE),
            version: None,
            builtin: true,
        };
        self.register(registry, base);

        let mut names = self.discover(&package_path)?;
        names.sort_by(|a, b| {
            (a != PRIMARY_PACKAGE, a.as_str()).cmp(&(b != PRIMARY_PACKAGE, b.as_str()))
        });

        for name in names {
            let settings = self.topology.settings().package_settings(&name);
            if !settings.enabled {
                tracing::debug!(package = %name, "package disabled, skipping");
                continue;
            }

            let path = package_path.join(&name);
            if let Some(repo) = &settings.repository {
                tracing::info!(
                    package = %name,
                    remote = %repo.remote,
                    revision = %repo.revision,
                    "updating package from repository"
                );
                self.git.checkout(&path, &repo.remote, &repo.revision)?;
            }

            let version = PackageInfo::read_version(&path)?;
            if version.is_none() {
                tracing::warn!(package = %name, "version information not available");
            }

            self.register(
                registry,
                PackageInfo {
                    name,
                    path,
                    settings,
                    version,
                    builtin: false,
                },
            );
        }
        Ok(())
    }

    fn discover(&self, package_path: &Path) -> Result<Vec<String>> {
        let settings = self.topology.settings();
        let mut names = Vec::new();

        if settings.autoload {
            let entries =
                std::fs::read_dir(package_path).map_err(BuildError::io("read", package_path))?;
            for entry in entries {
                let entry = entry.map_err(BuildError::io("read", package_path))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !entry.path().is_dir() || name.starts_with('.') || name == BASE_PACKAGE {
                    continue;
                }
                names.push(name);
            }
        } else {
            for (name, pkg) in &settings.package {
                if name == BASE_PACKAGE || !pkg.enabled {
                    continue;
                }
                let path = package_path.join(name);
                if !path.is_dir() && pkg.repository.is_none() {
                    return Err(BuildError::PackageNotFound {
                        name: name.clone(),
                        path,
                    });
                }
                names.push(name.clone());
            }
        }

        Ok(names)
    }

    fn register(&mut self, registry: &PackageRegistry, package: PackageInfo) {
        let version = match &package.version {
            Some(version) => version.as_str(),
            None => "-",
        };
        tracing::info!(package = %package.name, version, "package loaded");
        self.hooks
            .insert(package.name.clone(), registry.hooks_for(&package.name));
        self.topology.insert_package(package);
    }

    /// Generate every output file.
    pub fn build(&mut self) -> Result<BuildOutput> {
        let build_path = self.topology.build_path().to_path_buf();
        ensure_dir(&build_path)?;
        clear_dir(&build_path)?;

        let env_file = self.topology.project_path().join(ENV_FILE);
        let values = read_envfile(&env_file)?;
        self.topology.set_envfile(values);

        let packages: Vec<PackageInfo> = self.topology.packages().values().cloned().collect();
        for package in &packages {
            if let Some(hooks) = self.hooks.get(&package.name) {
                tracing::debug!(package = %package.name, "setup");
                hooks.setup(package, &mut self.topology)?;
            }
        }
        for package in &packages {
            if let Some(hooks) = self.hooks.get(&package.name) {
                tracing::debug!(package = %package.name, "initialize");
                hooks.initialize(package, &mut self.topology)?;
            }
        }

        self.topology.configure_images(self.git.as_ref())?;

        let compose = ComposeGenerator::new(&self.topology).render()?;
        let compose_file = self.topology.project_path().join(COMPOSE_FILE);
        std::fs::write(&compose_file, compose).map_err(BuildError::io("write", &compose_file))?;
        tracing::info!(path = %compose_file.display(), "compose file written");

        let env_backup = write_envfile(&env_file, self.topology.envfile())?;

        Ok(BuildOutput {
            compose_file,
            env_file,
            env_backup,
            images: self
                .topology
                .images()
                .map(|entry| entry.image.name().to_owned())
                .collect(),
            services: self.topology.services().keys().cloned().collect(),
        })
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        tracing::info!(path = %path.display(), "creating directory");
        std::fs::create_dir_all(path).map_err(BuildError::io("create", path))?;
    }
    Ok(())
}

fn clear_dir(path: &Path) -> Result<()> {
    let entries = std::fs::read_dir(path).map_err(BuildError::io("read", path))?;
    for entry in entries {
        let entry = entry.map_err(BuildError::io("read", path))?;
        let target = entry.path();
        let file_type = entry.file_type().map_err(BuildError::io("stat", &target))?;
        if file_type.is_dir() {
            std::fs::remove_dir_all(&target).map_err(BuildError::io("remove", &target))?;
        } else {
            std::fs::remove_file(&target).map_err(BuildError::io("remove", &target))?;
        }
    }
    Ok(())
}
