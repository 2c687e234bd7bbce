use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// ngwdocker.yaml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Build mode (defaults to development)
    #[serde(default)]
    pub mode: Mode,
    /// Build python 3 images instead of python 2
    #[serde(default)]
    pub python3: bool,
    /// Image tag naming for a container registry
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Stack deployment settings. Any non-null value enables stack mode,
    /// an empty mapping (`stack: {}`) included.
    #[serde(default)]
    pub stack: Option<StackSettings>,
    /// Discover packages by scanning the `package/` directory.
    /// When false, only packages listed in `package` are loaded.
    #[serde(default = "default_autoload")]
    pub autoload: bool,
    /// Per-package settings, keyed by package name
    #[serde(default)]
    pub package: IndexMap<String, PackageSettings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Prepended to the service name; enables image tags when set
    pub prefix: Option<String>,
    /// Appended to the service name
    pub suffix: Option<String>,
    /// Explicit version tag (defaults to `latest`)
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackSettings {
    /// Copied verbatim into every service's `deploy.placement`
    #[serde(default)]
    pub placement: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    pub remote: String,
    pub revision: String,
}

/// Settings sub-tree of a single package.
///
/// Accepts `name:` (empty), `name: false`, `name: {enabled: false}`,
/// `name: {repository: {remote, revision}}` and any free-form options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawPackageSettings")]
pub struct PackageSettings {
    pub enabled: bool,
    pub repository: Option<RepositorySettings>,
    #[serde(flatten)]
    pub options: IndexMap<String, serde_yaml::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPackageSettings {
    Empty,
    Flag(bool),
    Table(PackageTable),
}

#[derive(Deserialize)]
struct PackageTable {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    repository: Option<RepositorySettings>,
    #[serde(flatten)]
    options: IndexMap<String, serde_yaml::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            python3: false,
            registry: RegistrySettings::default(),
            stack: None,
            autoload: default_autoload(),
            package: IndexMap::new(),
        }
    }
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            repository: None,
            options: IndexMap::new(),
        }
    }
}

impl From<RawPackageSettings> for PackageSettings {
    fn from(raw: RawPackageSettings) -> Self {
        match raw {
            RawPackageSettings::Empty => Self::default(),
            RawPackageSettings::Flag(enabled) => Self {
                enabled,
                ..Self::default()
            },
            RawPackageSettings::Table(table) => Self {
                enabled: table.enabled,
                repository: table.repository,
                options: table.options,
            },
        }
    }
}

impl PackageSettings {
    /// Whether an optional feature is switched on with `<name>: {enabled: true}`.
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.options
            .get(name)
            .and_then(|v| v.get("enabled"))
            .and_then(serde_yaml::Value::as_bool)
            == Some(true)
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown mode '{other}', expected 'development' or 'production'"
            )),
        }
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_owned()
    }
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl Settings {
    /// Load from the given YAML file, or return defaults if it does not exist.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "config file not found, using default configuration"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parse settings from YAML text. `path` is only used for error reporting.
    pub fn parse(content: &str, path: &Path) -> crate::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self =
            serde_yaml::from_str(content).map_err(|e| crate::Error::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> crate::Result<()> {
        for (name, package) in &self.package {
            let Some(repo) = &package.repository else {
                continue;
            };
            for (field, value) in [("remote", &repo.remote), ("revision", &repo.revision)] {
                if value.trim().is_empty() {
                    return Err(crate::Error::InvalidPackageSettings {
                        package: name.clone(),
                        reason: format!("repository {field} is empty"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Settings for a package; packages without an entry are enabled with no options.
    pub fn package_settings(&self, name: &str) -> PackageSettings {
        match self.package.get(name) {
            Some(settings) => settings.clone(),
            None => PackageSettings::default(),
        }
    }
}

fn default_autoload() -> bool {
    true
}

fn default_enabled() -> bool {
    true
}
