use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use ngwdocker_core::util::{copy_slug, copy_tree, ndjson};
use ngwdocker_core::{Git, Mode};

use crate::error::{BuildError, Result};
use crate::event::EventBus;
use crate::events::AptEvent;
use crate::package::PackageInfo;

const DEFAULT_BASE: &str = "ubuntu:18.04";
const DEFAULT_LOCALE: &str = "C.UTF-8";

/// Installed by every image in its own layer so it stays cached.
const BOOTSTRAP_PACKAGES: [&str; 4] = [
    "curl",
    "ca-certificates",
    "gnupg",
    "software-properties-common",
];

/// Numeric owner of the files inside images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub const DEFAULT: Owner = Owner {
        uid: 1000,
        gid: 1000,
    };

    /// Host user ids for development builds on Linux by a non-root user,
    /// so bind-mounted files keep their ownership. [`Owner::DEFAULT`] otherwise.
    pub fn detect(mode: Mode) -> Self {
        if mode == Mode::Development
            && let Some(owner) = host_owner()
        {
            return owner;
        }
        Self::DEFAULT
    }
}

#[cfg(target_os = "linux")]
fn host_owner() -> Option<Owner> {
    // SAFETY: getuid and getgid have no preconditions and never fail.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    (uid != 0).then_some(Owner { uid, gid })
}

#[cfg(not(target_os = "linux"))]
fn host_owner() -> Option<Owner> {
    None
}

/// Build-wide switches every image sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub mode: Mode,
    pub python3: bool,
    pub default_instance: bool,
    pub owner: Owner,
}

impl Profile {
    pub fn is_development(&self) -> bool {
        self.mode == Mode::Development
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    /// Distribution packages providing the python runtime.
    pub fn python_packages(&self) -> &'static [&'static str] {
        if self.python3 {
            &["python3", "python3-dev", "python3-venv"]
        } else {
            &["python", "python-dev", "virtualenv", "python-virtualenv"]
        }
    }
}

/// Shared state an [`ImageRecipe`] can read while configuring.
pub struct BuildCx<'a> {
    pub bus: &'a EventBus,
    pub packages: &'a IndexMap<String, PackageInfo>,
    pub git: &'a dyn Git,
}

/// Image-specific build steps, run between the common preamble and
/// [`Image::close`].
pub trait ImageRecipe {
    fn name(&self) -> &str;

    fn configure(&mut self, image: &mut Image, cx: &BuildCx<'_>) -> Result<()>;
}

/// A Dockerfile under construction plus its build-context directory.
#[derive(Debug)]
pub struct Image {
    name: String,
    path: PathBuf,
    profile: Profile,
    pub base: String,
    pub locale: String,
    lines: Vec<String>,
    copy_idx: usize,
    pub volumes: Vec<String>,
    pub expose: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub environment: IndexMap<String, String>,
    pub args: IndexMap<String, String>,
    flags: IndexSet<String>,
    closed: bool,
}

impl Image {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, profile: Profile) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            profile,
            base: DEFAULT_BASE.to_owned(),
            locale: DEFAULT_LOCALE.to_owned(),
            lines: Vec::new(),
            copy_idx: 0,
            volumes: Vec::new(),
            expose: Vec::new(),
            entrypoint: None,
            command: None,
            environment: IndexMap::new(),
            args: IndexMap::new(),
            flags: IndexSet::new(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build-context directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    pub fn add_flag(&mut self, flag: impl Into<String>) {
        self.flags.insert(flag.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append raw lines verbatim.
    pub fn write<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
    }

    /// Append one `RUN` instruction. Commands are chained so the first
    /// failure aborts the instruction; `sep` adds a blank line after it.
    pub fn run<I, S>(&mut self, commands: I, sep: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = vec!["set -ex".to_owned()];
        parts.extend(
            commands
                .into_iter()
                .map(|cmd| cmd.as_ref().replace('\n', " \\\n    ")),
        );
        self.lines.push(format!("RUN {}", parts.join("; \\\n    ")));
        if sep {
            self.lines.push(String::new());
        }
    }

    /// Stage `source` (file or tree) into the build context and emit a
    /// `COPY` to `target`. Returns the staged name.
    pub fn copy(&mut self, source: &Path, target: &str, chown: Option<&str>) -> Result<String> {
        if !source.exists() {
            return Err(BuildError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        self.copy_idx += 1;
        let ctx_name = copy_slug(target, self.copy_idx);
        copy_tree(source, &self.path.join(&ctx_name))?;

        tracing::debug!(
            image = %self.name,
            source = %source.display(),
            staged = %ctx_name,
            "staged copy"
        );

        self.lines.push(match chown {
            Some(owner) => format!("COPY --chown={owner} {ctx_name} {target}"),
            None => format!("COPY {ctx_name} {target}"),
        });
        Ok(ctx_name)
    }

    /// Run the whole build: preamble, bootstrap packages, the recipe, then
    /// [`close`](Self::close).
    pub fn configure(&mut self, recipe: &mut dyn ImageRecipe, cx: &BuildCx<'_>) -> Result<()> {
        if self.closed {
            return Err(BuildError::ImageConfigured(self.name.clone()));
        }
        tracing::info!(image = %self.name, "configuring image");

        let preamble = [
            format!("FROM {}", self.base),
            format!("ENV LC_ALL={}", self.locale),
            String::new(),
        ];
        self.write(preamble);

        let mut bootstrap = AptEvent::bootstrap(self);
        bootstrap.package(BOOTSTRAP_PACKAGES);
        cx.bus.notify(bootstrap)?.render(self)?;

        recipe.configure(self, cx)?;

        self.close()
    }

    /// Emit trailing declarations and flush the Dockerfile to disk.
    /// Environment goes last.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(BuildError::ImageConfigured(self.name.clone()));
        }

        if !self.volumes.is_empty() {
            let line = format!("VOLUME {}", ndjson(&self.volumes));
            self.write([line, String::new()]);
        }

        if !self.expose.is_empty() {
            let line = format!("EXPOSE {}", self.expose.join(" "));
            self.write([line]);
        }

        if let Some(entrypoint) = &self.entrypoint {
            let line = format!("ENTRYPOINT {}", ndjson(entrypoint));
            self.write([line, String::new()]);
        }

        if let Some(command) = &self.command {
            let line = format!("CMD {}", ndjson(command));
            self.write([line, String::new()]);
        }

        let env: Vec<String> = self
            .environment
            .iter()
            .map(|(k, v)| match v.as_str() {
                "" => format!("ENV {k} \"\""),
                v => format!("ENV {k} {v}"),
            })
            .collect();
        self.write(env);

        let dockerfile = self.path.join("Dockerfile");
        std::fs::create_dir_all(&self.path).map_err(BuildError::io("create", &self.path))?;
        std::fs::write(&dockerfile, self.dockerfile())
            .map_err(BuildError::io("write", &dockerfile))?;
        self.closed = true;

        tracing::debug!(image = %self.name, path = %dockerfile.display(), "Dockerfile written");
        Ok(())
    }

    pub fn dockerfile(&self) -> String {
        self.lines.iter().map(|line| format!("{line}\n")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(mode: Mode) -> Profile {
        Profile {
            mode,
            python3: true,
            default_instance: true,
            owner: Owner::DEFAULT,
        }
    }

    #[test]
    fn run_chains_commands_fail_fast() {
        let mut image = Image::new("app", "/nonexistent", profile(Mode::Production));
        image.run(["apt-get update", "apt-get install x"], true);

        assert_eq!(
            image.lines(),
            &[
                "RUN set -ex; \\\n    apt-get update; \\\n    apt-get install x".to_owned(),
                String::new(),
            ]
        );
    }

    #[test]
    fn run_turns_newlines_into_continuations() {
        let mut image = Image::new("app", "/nonexistent", profile(Mode::Production));
        image.run(["pip install \n    a b"], false);

        assert_eq!(image.lines().len(), 1);
        assert!(image.lines()[0].ends_with("pip install  \\\n        a b"));
    }

    #[test]
    fn copy_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let mut image = Image::new("app", tmp.path().join("app"), profile(Mode::Production));

        let err = image
            .copy(&tmp.path().join("missing"), "$NGWROOT", None)
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingSource { .. }));
        assert!(image.lines().is_empty());
    }

    #[test]
    fn copy_to_same_target_never_collides() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("file.txt");
        std::fs::write(&src, "x").unwrap();
        let mut image = Image::new("app", tmp.path().join("app"), profile(Mode::Production));

        let first = image.copy(&src, "$NGWROOT/", None).unwrap();
        let second = image
            .copy(&src, "$NGWROOT/", Some("$NGWUSER:$NGWUSER"))
            .unwrap();

        assert_eq!(first, "01-ngwroot");
        assert_eq!(second, "02-ngwroot");
        assert!(tmp.path().join("app/01-ngwroot").is_file());
        assert!(tmp.path().join("app/02-ngwroot").is_file());
        assert_eq!(image.lines()[0], "COPY 01-ngwroot $NGWROOT/");
        assert_eq!(
            image.lines()[1],
            "COPY --chown=$NGWUSER:$NGWUSER 02-ngwroot $NGWROOT/"
        );
    }

    #[test]
    fn close_emits_trailer_in_fixed_order() {
        let tmp = TempDir::new().unwrap();
        let mut image = Image::new("app", tmp.path().join("app"), profile(Mode::Production));
        image.environment.insert("A".to_owned(), "1".to_owned());
        image.command = Some(vec!["postgres".to_owned()]);
        image.entrypoint = Some(vec!["/opt/ngw/bin/docker-entrypoint".to_owned()]);
        image.expose.push("5432".to_owned());
        image.volumes.push("$NGWROOT/data".to_owned());

        image.close().unwrap();

        let written = std::fs::read_to_string(tmp.path().join("app/Dockerfile")).unwrap();
        assert_eq!(
            written,
            "VOLUME [\"$NGWROOT/data\"]\n\nEXPOSE 5432\n\
             ENTRYPOINT [\"/opt/ngw/bin/docker-entrypoint\"]\n\n\
             CMD [\"postgres\"]\n\nENV A 1\n"
        );
        assert!(image.is_closed());
        assert!(matches!(
            image.close().unwrap_err(),
            BuildError::ImageConfigured(_)
        ));
    }

    #[test]
    fn flags_are_unique_and_ordered() {
        let mut image = Image::new("postgres", "/nonexistent", profile(Mode::Production));
        image.add_flag("postgres10");
        image.add_flag("postgis25");
        image.add_flag("postgres10");
        assert_eq!(image.flags().collect::<Vec<_>>(), vec!["postgres10", "postgis25"]);
    }

    #[test]
    fn development_owner_falls_back_for_production() {
        assert_eq!(Owner::detect(Mode::Production), Owner::DEFAULT);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn copy_names_are_strictly_increasing(targets in proptest::collection::vec("[A-Za-z$/_ .-]{0,12}", 1..8)) {
                let tmp = TempDir::new().unwrap();
                let src = tmp.path().join("src.txt");
                std::fs::write(&src, "x").unwrap();
                let mut image = Image::new("app", tmp.path().join("app"), profile(Mode::Production));

                let mut seen = std::collections::HashSet::new();
                for (idx, target) in targets.iter().enumerate() {
                    let name = image.copy(&src, target, None).unwrap();
                    let prefix = format!("{:02}-", idx + 1);
                    prop_assert!(name.starts_with(&prefix), "{} lacks {}", name, prefix);
                    prop_assert!(seen.insert(name));
                }
            }
        }
    }
}
