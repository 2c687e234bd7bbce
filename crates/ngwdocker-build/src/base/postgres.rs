use tempfile::TempDir;

use super::assets;
use crate::error::{BuildError, Result};
use crate::events::{AptEvent, FinishEvent, HomeEvent, VirtualenvEvent};
use crate::image::{BuildCx, Image, ImageRecipe};

pub const NAME: &str = "postgres";

const PGDG_KEY: &str = "https://www.postgresql.org/media/keys/ACCC4CF8.asc";
const PGDG_REPOSITORY: &str =
    "deb http://apt.postgresql.org/pub/repos/apt/ bionic-pgdg main $POSTGRES_MAJOR";

/// PostgreSQL with PostGIS, run as the image user.
#[derive(Debug)]
pub struct PostgresRecipe {
    pub postgres_version: String,
    pub postgis_version: String,
}

impl Default for PostgresRecipe {
    fn default() -> Self {
        Self {
            postgres_version: "10".to_owned(),
            postgis_version: "2.5".to_owned(),
        }
    }
}

impl ImageRecipe for PostgresRecipe {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, image: &mut Image, cx: &BuildCx<'_>) -> Result<()> {
        let profile = image.profile();

        image.write([
            format!("ENV POSTGRES_MAJOR {}", self.postgres_version),
            format!("ENV POSTGIS_MAJOR {}", self.postgis_version),
        ]);
        image.add_flag(format!("postgres{}", self.postgres_version.replace('.', "")));
        image.add_flag(format!("postgis{}", self.postgis_version.replace('.', "")));

        let mut apt = AptEvent::new(image);
        apt.add_key(PGDG_KEY);
        apt.add_repository(PGDG_REPOSITORY);
        apt.package(["git", "build-essential", "libssl-dev"]);
        apt.package(profile.python_packages().iter().copied());
        apt.package(["postgresql-common", "locales"]);
        apt.pop();
        apt.command([
            r#"sed -ri "s/#(create_main_cluster) .*$/\1 = false/" /etc/postgresql-common/createcluster.conf"#,
            "localedef -i en_US -c -f UTF-8 -A /usr/share/locale/locale.alias en_US.UTF-8",
        ]);
        apt.package([
            "postgresql-$POSTGRES_MAJOR",
            "postgresql-$POSTGRES_MAJOR-postgis-$POSTGIS_MAJOR",
            "postgresql-$POSTGRES_MAJOR-postgis-$POSTGIS_MAJOR-scripts",
        ]);
        // Recreated with the image user's ids by the home step.
        apt.cleanup(["userdel postgres"]);
        cx.bus.notify(apt)?.render(image)?;

        let mut home = HomeEvent::with_user(image, "postgres");
        home.directory(["data", "data/postgres"]);
        home.directory(["config", "config/postgres"]);
        home.directory(["secret"]);
        home.command([
            "chown -R $NGWUSER:$NGWUSER /var/run/postgresql /var/lib/postgresql",
            "ln -s $NGWROOT/data/postgres /var/lib/postgresql/data",
        ]);
        let home = cx.bus.notify(home)?;
        let home_dir = home.home.clone();
        home.render(image)?;

        let venv = VirtualenvEvent::new(image, "$NGWROOT/env")?;
        cx.bus.notify(venv)?.render(image)?;

        image.write(["", "ENV POSTGRES_USER nextgisweb"]);

        let staging = TempDir::new().map_err(BuildError::io("create", std::env::temp_dir()))?;
        assets::stage(assets::POSTGRES, staging.path())?;
        image.copy(staging.path(), "$NGWROOT", Some("$NGWUSER:$NGWUSER"))?;

        image
            .environment
            .insert("NGWDOCKER_POSTGRES_INITDB".to_owned(), "yes".to_owned());
        if profile.default_instance {
            image
                .environment
                .insert("NGWDOCKER_DEFAULT_INSTANCE".to_owned(), "yes".to_owned());
        }

        image.expose.push("5432".to_owned());
        image.entrypoint = Some(vec![format!("{home_dir}/bin/docker-entrypoint")]);
        image.command = Some(vec!["postgres".to_owned()]);

        cx.bus.notify(FinishEvent::new(image))?.render(image)
    }
}
