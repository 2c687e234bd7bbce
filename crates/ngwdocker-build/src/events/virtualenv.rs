use std::path::{Path, PathBuf};

use ngwdocker_core::Git;
use tempfile::TempDir;

use crate::error::{BuildError, Result};
use crate::event::{Dispatched, Event, EventKind, Renderable};
use crate::image::Image;

const SITE_PACKAGES: &str = "import distutils.sysconfig as sc; print(sc.get_python_lib())";

/// Version-control state of a local package source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub commit: String,
    pub dirty: bool,
}

impl Revision {
    /// Local version label: the short commit, with `.dirty` for
    /// uncommitted changes.
    pub fn local_version(&self) -> String {
        if self.dirty {
            format!("{}.dirty", self.commit)
        } else {
            self.commit.clone()
        }
    }
}

/// A python package installed in editable mode from the build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub name: String,
    /// Source directory on the host
    pub source: PathBuf,
    /// Location inside the image
    pub target: String,
    pub revision: Option<Revision>,
}

impl LocalPackage {
    /// Describe a local package, reading its revision through `git`.
    pub fn resolve(
        name: &str,
        source: &Path,
        target: impl Into<String>,
        git: &dyn Git,
    ) -> Result<Self> {
        let revision = match git.commit(source)? {
            Some(commit) => Some(Revision {
                commit,
                dirty: git.is_dirty(source)?,
            }),
            None => None,
        };
        Ok(Self {
            name: name.to_owned(),
            source: source.to_path_buf(),
            target: target.into(),
            revision,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Named(String),
    Local(LocalPackage),
}

/// Builds a python virtual environment at `path` inside the image.
///
/// Local packages are staged under [`package_root`](Self::package_root)
/// and the whole staging tree is copied to `$NGWROOT/` on render.
#[derive(Debug)]
pub struct VirtualenvEvent {
    image: String,
    development: bool,
    pub path: String,
    pub requirements: Vec<Requirement>,
    pub commands_prepare: Vec<String>,
    pub commands_before_install: Vec<String>,
    pub commands_after_install: Vec<String>,
    staging: TempDir,
}

impl VirtualenvEvent {
    pub fn new(image: &Image, path: &str) -> Result<Self> {
        let profile = image.profile();
        let staging = TempDir::new().map_err(BuildError::io("create", std::env::temp_dir()))?;
        let package_root = staging.path().join("package");
        std::fs::create_dir(&package_root).map_err(BuildError::io("create", &package_root))?;

        let mut event = Self {
            image: image.name().to_owned(),
            development: profile.is_development(),
            path: path.to_owned(),
            requirements: Vec::new(),
            commands_prepare: Vec::new(),
            commands_before_install: Vec::new(),
            commands_after_install: Vec::new(),
            staging,
        };

        if profile.python3 {
            event.before_install([format!("python3 -m venv {path}")]);
        } else {
            event.before_install([
                "export PYTHONWARNINGS=ignore:DEPRECATION::pip._internal.cli.base_command"
                    .to_owned(),
                format!("/usr/bin/virtualenv {path}"),
            ]);
        }
        event.before_install([format!("{path}/bin/pip install --upgrade pip setuptools")]);
        Ok(event)
    }

    /// Root of the tree copied to `$NGWROOT/`.
    pub fn staging_root(&self) -> &Path {
        self.staging.path()
    }

    /// Where local package sources are staged, one directory per package.
    pub fn package_root(&self) -> PathBuf {
        self.staging.path().join("package")
    }

    pub fn requirement<I, S>(&mut self, requirements: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .extend(requirements.into_iter().map(|r| Requirement::Named(r.into())));
    }

    pub fn package(&mut self, package: LocalPackage) {
        self.requirements.push(Requirement::Local(package));
    }

    pub fn prepare<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands_prepare
            .extend(commands.into_iter().map(Into::into));
    }

    pub fn before_install<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands_before_install
            .extend(commands.into_iter().map(Into::into));
    }

    pub fn after_install<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands_after_install
            .extend(commands.into_iter().map(Into::into));
    }

    /// Command buckets, one `RUN` each.
    ///
    /// Production yields a single bucket. Development yields two: the
    /// local version stamps go into a trailing layer of their own, so a
    /// new commit does not invalidate the install layer.
    pub fn commands(&self) -> Vec<Vec<String>> {
        let mut install = Vec::new();
        let mut local_version = Vec::new();

        if !self.requirements.is_empty() {
            let terms: Vec<String> = self
                .requirements
                .iter()
                .map(|req| match req {
                    Requirement::Named(name) => name.clone(),
                    Requirement::Local(pkg) => format!("-e {}", pkg.target),
                })
                .collect();
            install.push(format!(
                "{}/bin/pip install --no-cache-dir \n    {}",
                self.path,
                terms.join("\n    ")
            ));
        }

        let mut site_detected = false;
        for req in &self.requirements {
            let Requirement::Local(pkg) = req else {
                continue;
            };

            if !site_detected {
                let cmd_site = format!("SITE=$({}/bin/python -c '{SITE_PACKAGES}')", self.path);
                if self.development {
                    local_version.push(cmd_site.clone());
                }
                install.push(cmd_site);
                site_detected = true;
            }

            install.extend([
                format!("rm $SITE/{}.egg-link", pkg.name.replace('_', "-")),
                format!("ln -s {0}/{1} $SITE/{1}", pkg.target, pkg.name),
                format!("mv {0}/{1}.egg-info $SITE/", pkg.target, pkg.name),
            ]);

            if let Some(revision) = &pkg.revision {
                local_version.push(stamp_command(&pkg.name, &revision.local_version()));
            }
        }

        let mut main = Vec::new();
        main.extend(self.commands_prepare.iter().cloned());
        main.extend(self.commands_before_install.iter().cloned());
        main.extend(install);
        main.extend(self.commands_after_install.iter().cloned());

        if self.development {
            vec![main, local_version]
        } else {
            main.extend(local_version);
            vec![main]
        }
    }
}

/// Rewrite the installed `Version:` to carry a local `+label`.
fn stamp_command(name: &str, label: &str) -> String {
    format!("sed -ri 's/^(Version:[^\\+]+).*/\\1+{label}/gi' $SITE/{name}.egg-info/PKG-INFO")
}

impl Event for VirtualenvEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        EventKind::Virtualenv
    }
}

impl Renderable for VirtualenvEvent {
    fn render(self, image: &mut Image, _proof: Dispatched) -> Result<()> {
        image.copy(self.staging_root(), "$NGWROOT/", Some("$NGWUSER:$NGWUSER"))?;
        for bucket in self.commands() {
            if bucket.is_empty() {
                continue;
            }
            image.run(bucket, true);
        }
        Ok(())
    }
}
