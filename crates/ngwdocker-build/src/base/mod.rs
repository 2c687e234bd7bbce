//! The built-in `ngwdocker` package: the app, postgres and archivist
//! images, their services and volumes, and the optional auxiliary
//! services switched on under `package.ngwdocker`.

mod app;
mod archivist;
pub mod assets;
mod postgres;

use ngwdocker_core::util::pwgen;

pub use app::AppRecipe;
pub use archivist::ArchivistRecipe;
pub use postgres::PostgresRecipe;

use crate::error::{BuildError, Result};
use crate::package::{PRIMARY_PACKAGE, PackageHooks, PackageInfo};
use crate::service::{Service, Ulimit};
use crate::topology::Topology;

/// Env-file keys generated for instances without a secret volume.
const SECRET_KEYS: [&str; 2] = ["DATABASE_PASSWORD", "PYRAMID_SECRET"];

/// First release reading secrets from the secret volume.
const SECRET_VOLUME_RELEASE: [u64; 3] = [3, 2, 0];

const PASSWORD_LENGTH: usize = 16;

const ELASTICSEARCH_IMAGE: &str = "docker.elastic.co/elasticsearch/elasticsearch:7.5.1";
const KIBANA_IMAGE: &str = "docker.elastic.co/kibana/kibana:7.5.1";
const PGADMIN_IMAGE: &str = "dpage/pgadmin4";

#[derive(Debug, Default, Clone, Copy)]
pub struct BasePackage;

impl PackageHooks for BasePackage {
    fn initialize(&self, package: &PackageInfo, topology: &mut Topology) -> Result<()> {
        let profile = topology.profile();
        let pgadmin = package.settings.feature_enabled("pgadmin");
        let elasticsearch = package.settings.feature_enabled("elasticsearch");
        let kibana = package.settings.feature_enabled("kibana");
        if kibana && !elasticsearch {
            return Err(BuildError::Config(
                "kibana requires elasticsearch to be enabled".to_owned(),
            ));
        }

        if profile.default_instance {
            init_secrets(topology);
        }

        topology.add_image(package, Box::new(AppRecipe))?;
        topology.add_image(package, Box::new(PostgresRecipe::default()))?;
        topology.add_image(package, Box::new(ArchivistRecipe))?;

        let env_has = |topology: &Topology, key: &str| topology.envfile().contains_key(key);

        let mut app = Service::local(app::NAME, app::NAME);
        app.restart = true;
        add_data(topology, &mut app, app::NAME);
        add_config(topology, &mut app, app::NAME)?;
        add_secret(topology, &mut app)?;
        if profile.default_instance {
            if env_has(topology, "DATABASE_PASSWORD") {
                app.environment.insert(
                    "NEXTGISWEB_CORE__DATABASE__PASSWORD".to_owned(),
                    "${DATABASE_PASSWORD}".to_owned(),
                );
            }
            if env_has(topology, "PYRAMID_SECRET") {
                app.environment.insert(
                    "NEXTGISWEB_PYRAMID__SECRET".to_owned(),
                    "${PYRAMID_SECRET}".to_owned(),
                );
            }
        }
        if profile.is_development() {
            let work = project_dir(topology, "work")?;
            app.add_bind(work, "/opt/ngw/work");
        }
        add_backup(topology, &mut app)?;
        if profile.is_development() {
            app.add_bind("./package", "/opt/ngw/package");
        }
        if profile.default_instance {
            app.ports.push("8080:8080".to_owned());
        }
        app.depends_on(postgres::NAME);
        if elasticsearch {
            app.depends_on("elasticsearch");
        }

        let mut postgres = Service::local(postgres::NAME, postgres::NAME);
        postgres.restart = true;
        add_data(topology, &mut postgres, postgres::NAME);
        add_config(topology, &mut postgres, postgres::NAME)?;
        add_secret(topology, &mut postgres)?;
        if profile.default_instance && env_has(topology, "DATABASE_PASSWORD") {
            postgres.environment.insert(
                "POSTGRES_PASSWORD".to_owned(),
                "${DATABASE_PASSWORD}".to_owned(),
            );
        }

        let mut archivist = Service::local(archivist::NAME, archivist::NAME);
        archivist.restart = true;
        add_data(topology, &mut archivist, app::NAME);
        add_data(topology, &mut archivist, postgres::NAME);
        add_config(topology, &mut archivist, app::NAME)?;
        add_config(topology, &mut archivist, postgres::NAME)?;
        add_secret(topology, &mut archivist)?;
        add_backup(topology, &mut archivist)?;
        archivist.depends_on(postgres::NAME);

        topology.add_service(app)?;
        topology.add_service(postgres)?;
        topology.add_service(archivist)?;

        if pgadmin {
            let mut svc = Service::external("pgadmin", PGADMIN_IMAGE);
            svc.environment.insert(
                "PGADMIN_DEFAULT_EMAIL".to_owned(),
                "ngwdocker@localhost".to_owned(),
            );
            svc.environment
                .insert("PGADMIN_DEFAULT_PASSWORD".to_owned(), "ngwdocker".to_owned());
            svc.depends_on(postgres::NAME);
            svc.ports.push("8432:80".to_owned());
            topology.add_service(svc)?;
        }

        if elasticsearch {
            let mut svc = Service::external("elasticsearch", ELASTICSEARCH_IMAGE);
            svc.restart = true;
            svc.environment
                .insert("cluster.name".to_owned(), "ngwdocker".to_owned());
            svc.environment
                .insert("discovery.type".to_owned(), "single-node".to_owned());
            svc.ulimits
                .insert("memlock".to_owned(), Ulimit::Range { soft: -1, hard: -1 });
            topology.add_volume("elasticsearch");
            svc.add_volume("elasticsearch", "/usr/share/elasticsearch/data");
            svc.ports.push("8920:9200".to_owned());
            topology.add_service(svc)?;
        }

        if kibana {
            let mut svc = Service::external("kibana", KIBANA_IMAGE);
            svc.restart = true;
            svc.depends_on("elasticsearch");
            svc.environment
                .insert("SERVER_NAME".to_owned(), "ngwdocker".to_owned());
            svc.environment.insert(
                "ELASTICSEARCH_HOSTS".to_owned(),
                "http://elasticsearch:9200".to_owned(),
            );
            svc.ports.push("8561:5601".to_owned());
            topology.add_service(svc)?;
        }

        Ok(())
    }
}

/// Whether the application reads its secrets from the secret volume,
/// judged by the `nextgisweb` package version. Unknown means no.
fn secret_volume_supported(topology: &Topology) -> bool {
    topology
        .package(PRIMARY_PACKAGE)
        .and_then(|p| p.version.as_ref())
        .is_some_and(|v| v.at_least(&SECRET_VOLUME_RELEASE))
}

fn init_secrets(topology: &mut Topology) {
    if secret_volume_supported(topology) {
        for key in SECRET_KEYS {
            if topology.envfile().contains_key(key) {
                tracing::warn!(key, "key is present in env file but secret volume is available");
            }
        }
        return;
    }

    let envfile = topology.envfile_mut();
    for key in SECRET_KEYS {
        if !envfile.contains_key(key) {
            tracing::info!(key, "generating secret");
            envfile.insert(key.to_owned(), pwgen(PASSWORD_LENGTH));
        }
    }
}

/// Create `<project>/<rel>` if missing and return it as a compose bind
/// source relative to the project directory.
fn project_dir(topology: &Topology, rel: &str) -> Result<String> {
    let path = topology.project_path().join(rel);
    std::fs::create_dir_all(&path).map_err(BuildError::io("create", &path))?;
    Ok(format!("./{rel}"))
}

fn add_data(topology: &mut Topology, svc: &mut Service, name: &str) {
    let volume = format!("data_{name}");
    svc.add_volume(volume.clone(), format!("/opt/ngw/data/{name}"));
    topology.add_volume(volume);
}

fn add_config(topology: &mut Topology, svc: &mut Service, name: &str) -> Result<()> {
    let target = format!("/opt/ngw/config/{name}");
    if topology.profile().is_development() {
        let bind = project_dir(topology, &format!("config/{name}"))?;
        svc.add_bind(bind, target);
    } else {
        let volume = format!("config_{name}");
        svc.add_volume(volume.clone(), target);
        topology.add_volume(volume);
    }
    Ok(())
}

fn add_secret(topology: &mut Topology, svc: &mut Service) -> Result<()> {
    if topology.profile().is_development() {
        let bind = project_dir(topology, "secret")?;
        svc.add_bind(bind, "/opt/ngw/secret");
    } else {
        svc.add_volume("secret", "/opt/ngw/secret");
        topology.add_volume("secret");
    }
    Ok(())
}

fn add_backup(topology: &mut Topology, svc: &mut Service) -> Result<()> {
    if topology.profile().is_development() {
        let bind = project_dir(topology, "backup")?;
        svc.add_bind(bind, "/opt/ngw/backup");
    } else {
        svc.add_volume("backup", "/opt/ngw/backup");
        topology.add_volume("backup");
    }
    Ok(())
}
