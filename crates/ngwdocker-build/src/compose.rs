use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{BuildError, Result};
use crate::service::{Mount, Service, ServiceImage, Ulimit};
use crate::topology::Topology;

pub const COMPOSE_VERSION: &str = "3.7";

/// docker-compose.yaml document
#[derive(Debug, Serialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: IndexMap<String, ComposeService>,
    pub volumes: IndexMap<String, VolumeSpec>,
}

#[derive(Debug, Default, Serialize)]
pub struct ComposeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub ulimits: IndexMap<String, Ulimit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Mount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
}

#[derive(Debug, Serialize)]
pub struct BuildSpec {
    pub context: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,
}

/// Swarm deployment block, emitted in stack mode.
#[derive(Debug, Serialize)]
pub struct Deploy {
    pub replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<serde_yaml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    pub endpoint_mode: String,
}

#[derive(Debug, Serialize)]
pub struct RestartPolicy {
    pub condition: String,
}

/// Named volume declaration; all volumes use driver defaults.
#[derive(Debug, Default, Serialize)]
pub struct VolumeSpec {}

/// Turns a configured topology into a compose document.
pub struct ComposeGenerator<'a> {
    topology: &'a Topology,
}

impl<'a> ComposeGenerator<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology }
    }

    /// Build the document. Dangling image references and dependency edges
    /// are rejected here, before anything is written.
    pub fn generate(&self) -> Result<ComposeFile> {
        self.validate()?;

        let mut stack_warned = false;
        let mut services = IndexMap::new();
        for (name, service) in self.topology.services() {
            let compose = self.service(service, &mut stack_warned)?;
            services.insert(name.clone(), compose);
        }

        let mut volumes: Vec<&String> = self.topology.volumes().iter().collect();
        volumes.sort_by(|a, b| volume_order(a, b));

        Ok(ComposeFile {
            version: COMPOSE_VERSION.to_owned(),
            services,
            volumes: volumes
                .into_iter()
                .map(|name| (name.clone(), VolumeSpec::default()))
                .collect(),
        })
    }

    pub fn render(&self) -> Result<String> {
        let compose = self.generate()?;
        serde_yaml::to_string(&compose).map_err(BuildError::Compose)
    }

    fn validate(&self) -> Result<()> {
        let services = self.topology.services();
        for (name, service) in services {
            if let ServiceImage::Local(image) = &service.image
                && self.topology.image(image).is_none()
            {
                return Err(BuildError::UnknownImage {
                    service: name.clone(),
                    image: image.clone(),
                });
            }
            for dependency in &service.depends_on {
                if !services.contains_key(dependency) {
                    return Err(BuildError::UnknownDependency {
                        service: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn service(&self, service: &Service, stack_warned: &mut bool) -> Result<ComposeService> {
        let settings = self.topology.settings();
        let profile = self.topology.profile();

        let mut compose = ComposeService {
            command: service.command.clone(),
            environment: service.environment.clone(),
            ulimits: service.ulimits.clone(),
            volumes: service.volumes.clone(),
            ports: service.ports.clone(),
            depends_on: service.depends_on.clone(),
            ..ComposeService::default()
        };

        match &service.image {
            ServiceImage::Local(name) => {
                let image = self
                    .topology
                    .image(name)
                    .ok_or_else(|| BuildError::UnknownImage {
                        service: service.name.clone(),
                        image: name.clone(),
                    })?;
                compose.build = Some(BuildSpec {
                    context: build_context(image.path(), self.topology.project_path()),
                    args: image.args.clone(),
                });
                compose.image = self.image_tag(&service.name, image.flags());
            }
            ServiceImage::External(reference) => {
                compose.image = Some(reference.clone());
            }
        }

        if service.restart && profile.is_production() {
            compose.restart = Some("unless-stopped".to_owned());
        }

        if let Some(stack) = &settings.stack {
            if profile.is_development() {
                if !*stack_warned {
                    tracing::warn!("stack compatible files are available only in production mode");
                    *stack_warned = true;
                }
            } else {
                compose.deploy = Some(Deploy {
                    replicas: 1,
                    placement: stack.placement.clone(),
                    restart_policy: service.restart.then(|| RestartPolicy {
                        condition: "on-failure".to_owned(),
                    }),
                    endpoint_mode: "dnsrr".to_owned(),
                });
            }
        }

        Ok(compose)
    }

    /// Registry tag `prefix + service [+ suffix] : version[-dev]-pyN[-flags]`,
    /// only when a registry prefix is configured.
    /// An empty version counts as unset.
    fn image_tag<'f>(&self, service: &str, flags: impl Iterator<Item = &'f str>) -> Option<String> {
        let registry = &self.topology.settings().registry;
        let prefix = registry.prefix.as_deref()?;
        let profile = self.topology.profile();

        let mut name = format!("{prefix}{service}");
        if let Some(suffix) = &registry.suffix {
            name.push_str(suffix);
        }

        let version = match registry.version.as_deref() {
            Some(version) if !version.is_empty() => version,
            _ => "latest",
        };
        let mut vflags = vec![version.to_owned()];
        if profile.is_development() {
            vflags.push("dev".to_owned());
        }
        vflags.push(if profile.python3 { "py3" } else { "py2" }.to_owned());
        vflags.extend(flags.map(str::to_owned));

        Some(format!("{name}:{}", vflags.join("-")))
    }
}

/// Build context relative to the directory holding the compose file.
fn build_context(image_path: &Path, project_path: &Path) -> String {
    if !image_path.starts_with(project_path) {
        return image_path.display().to_string();
    }
    image_path
        .components()
        .skip(project_path.components().count())
        .collect::<PathBuf>()
        .display()
        .to_string()
}

fn volume_class(name: &str) -> u8 {
    if name.starts_with("data_") {
        10
    } else if name.starts_with("config_") {
        20
    } else if name.starts_with("secret") {
        30
    } else {
        50
    }
}

/// Data volumes first, then config, then secrets, then the rest; by name
/// within each class.
pub fn volume_order(a: &str, b: &str) -> Ordering {
    volume_class(a)
        .cmp(&volume_class(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Owner;
    use ngwdocker_core::{Mode, Settings, StackSettings};
    use tempfile::TempDir;

    fn topology(tmp: &TempDir, settings: Settings) -> Topology {
        Topology::new(tmp.path(), settings, Owner::DEFAULT)
    }

    fn yaml(compose: &ComposeFile) -> serde_yaml::Value {
        serde_yaml::to_value(compose).unwrap()
    }

    #[test]
    fn volume_classes_sort_before_names() {
        let mut names = vec!["backup", "secret", "config_app", "data_postgres", "data_app", "config_postgres", "elasticsearch"];
        names.sort_by(|a, b| volume_order(a, b));
        assert_eq!(
            names,
            vec!["data_app", "data_postgres", "config_app", "config_postgres", "secret", "backup", "elasticsearch"]
        );
    }

    struct Empty;

    impl crate::image::ImageRecipe for Empty {
        fn name(&self) -> &str {
            "postgres"
        }

        fn configure(&mut self, _image: &mut crate::image::Image, _cx: &crate::image::BuildCx<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn tag(registry: &str, mode: Mode) -> Option<String> {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            mode,
            python3: true,
            registry: serde_yaml::from_str(registry).unwrap(),
            ..Settings::default()
        };
        let mut topo = topology(&tmp, settings);
        let package = crate::package::PackageInfo {
            name: "ngwdocker".to_owned(),
            path: tmp.path().to_path_buf(),
            settings: ngwdocker_core::PackageSettings::default(),
            version: None,
            builtin: true,
        };
        let image = topo.add_image(&package, Box::new(Empty)).unwrap();
        image.add_flag("postgres10");
        image.add_flag("postgis25");
        topo.add_service(Service::local("postgres", "postgres")).unwrap();

        let compose = ComposeGenerator::new(&topo).generate().unwrap();
        compose.services["postgres"].image.clone()
    }

    #[test]
    fn image_tag_follows_registry_settings() {
        assert_eq!(tag("{}", Mode::Production), None);
        assert_eq!(
            tag("{prefix: r/, version: '2.1'}", Mode::Production).as_deref(),
            Some("r/postgres:2.1-py3-postgres10-postgis25")
        );
        assert_eq!(
            tag("{prefix: r/, suffix: -x}", Mode::Development).as_deref(),
            Some("r/postgres-x:latest-dev-py3-postgres10-postgis25")
        );
    }

    #[test]
    fn empty_registry_version_means_latest() {
        assert_eq!(
            tag("{prefix: r/, version: ''}", Mode::Production).as_deref(),
            Some("r/postgres:latest-py3-postgres10-postgis25")
        );
    }

    #[test]
    fn external_service_keeps_reference() {
        let tmp = TempDir::new().unwrap();
        let mut topo = topology(&tmp, Settings::default());
        let mut svc = Service::external("pgadmin", "dpage/pgadmin4");
        svc.ports.push("8432:80".to_owned());
        topo.add_service(svc).unwrap();

        let compose = ComposeGenerator::new(&topo).generate().unwrap();
        let value = yaml(&compose);
        assert_eq!(value["version"], "3.7");
        assert_eq!(value["services"]["pgadmin"]["image"], "dpage/pgadmin4");
        assert_eq!(value["services"]["pgadmin"]["ports"][0], "8432:80");
        assert!(value["services"]["pgadmin"].get("build").is_none());
        assert!(value["services"]["pgadmin"].get("environment").is_none());
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut topo = topology(&tmp, Settings::default());
        let mut svc = Service::external("kibana", "kibana");
        svc.depends_on("elasticsearch");
        topo.add_service(svc).unwrap();

        let err = ComposeGenerator::new(&topo).generate().unwrap_err();
        assert!(matches!(err, BuildError::UnknownDependency { .. }));
    }

    #[test]
    fn unknown_local_image_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut topo = topology(&tmp, Settings::default());
        topo.add_service(Service::local("app", "app")).unwrap();

        let err = ComposeGenerator::new(&topo).generate().unwrap_err();
        assert!(matches!(err, BuildError::UnknownImage { .. }));
    }

    #[test]
    fn restart_only_in_production() {
        for (mode, expected) in [(Mode::Development, None), (Mode::Production, Some("unless-stopped"))] {
            let tmp = TempDir::new().unwrap();
            let settings = Settings {
                mode,
                ..Settings::default()
            };
            let mut topo = topology(&tmp, settings);
            let mut svc = Service::external("es", "elasticsearch");
            svc.restart = true;
            topo.add_service(svc).unwrap();

            let compose = ComposeGenerator::new(&topo).generate().unwrap();
            assert_eq!(compose.services["es"].restart.as_deref(), expected);
        }
    }

    #[test]
    fn stack_mode_adds_deploy_in_production_only() {
        let placement: serde_yaml::Value =
            serde_yaml::from_str("constraints: [node.role == worker]").unwrap();
        let stack = Some(StackSettings {
            placement: Some(placement.clone()),
        });

        let tmp = TempDir::new().unwrap();
        let mut topo = topology(
            &tmp,
            Settings {
                mode: Mode::Production,
                stack: stack.clone(),
                ..Settings::default()
            },
        );
        let mut svc = Service::external("es", "elasticsearch");
        svc.restart = true;
        topo.add_service(svc).unwrap();
        topo.add_service(Service::external("pgadmin", "dpage/pgadmin4")).unwrap();

        let compose = ComposeGenerator::new(&topo).generate().unwrap();
        let value = yaml(&compose);
        let deploy = &value["services"]["es"]["deploy"];
        assert_eq!(deploy["replicas"], 1);
        assert_eq!(deploy["placement"], placement);
        assert_eq!(deploy["restart_policy"]["condition"], "on-failure");
        assert_eq!(deploy["endpoint_mode"], "dnsrr");
        assert!(value["services"]["pgadmin"]["deploy"].get("restart_policy").is_none());

        let tmp = TempDir::new().unwrap();
        let mut topo = topology(
            &tmp,
            Settings {
                mode: Mode::Development,
                stack,
                ..Settings::default()
            },
        );
        topo.add_service(Service::external("es", "elasticsearch")).unwrap();
        let compose = ComposeGenerator::new(&topo).generate().unwrap();
        assert!(compose.services["es"].deploy.is_none());
    }

    #[test]
    fn render_writes_empty_volume_mappings() {
        let tmp = TempDir::new().unwrap();
        let mut topo = topology(&tmp, Settings::default());
        let mut svc = Service::external("es", "elasticsearch");
        svc.add_volume("elasticsearch", "/usr/share/elasticsearch/data");
        svc.ulimits
            .insert("memlock".to_owned(), Ulimit::Range { soft: -1, hard: -1 });
        topo.add_service(svc).unwrap();
        topo.add_volume("elasticsearch");

        let text = ComposeGenerator::new(&topo).render().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert!(value["volumes"]["elasticsearch"].as_mapping().unwrap().is_empty());
        assert_eq!(value["services"]["es"]["volumes"][0]["type"], "volume");
        assert_eq!(value["services"]["es"]["ulimits"]["memlock"]["soft"], -1);
    }
}
