use std::path::PathBuf;

use ngwdocker_core::util::copy_files;
use tempfile::TempDir;

use super::assets;
use crate::error::{BuildError, Result};
use crate::events::{
    AptEvent, ConfigEvent, FinishEvent, HomeEvent, IniConfig, LocalPackage, PackageFilesEvent,
    VirtualenvEvent,
};
use crate::image::{BuildCx, Image, ImageRecipe};

pub const NAME: &str = "app";

const NEXTGIS_KEY: &str = "https://nextgis.com/key/68514A1DCF0CF9F7.asc";
const NEXTGIS_PPA: &str = "ppa:nextgis/ppa";

/// Files of a local package a development image needs to install it.
const METADATA_FILES: [&str; 3] = ["setup.py", "setup.cfg", "VERSION"];

const RUNTIME_PACKAGES: [&str; 11] = [
    "libgdal-dev",
    "libgeos-dev",
    "gdal-bin",
    "g++",
    "libxml2-dev",
    "libxslt1-dev",
    "zlib1g-dev",
    "libjpeg-turbo8-dev",
    "nodejs",
    "postgresql-client",
    "libmagic-dev",
];

/// The web application image: every python package found under
/// `package/` installed into one virtualenv.
#[derive(Debug, Default)]
pub struct AppRecipe;

impl ImageRecipe for AppRecipe {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, image: &mut Image, cx: &BuildCx<'_>) -> Result<()> {
        let profile = image.profile();

        let mut apt = AptEvent::new(image);
        apt.add_key(NEXTGIS_KEY);
        apt.add_repository(NEXTGIS_PPA);
        apt.package(["git", "mc", "build-essential", "libssl-dev"]);
        apt.package(profile.python_packages().iter().copied());
        apt.package(RUNTIME_PACKAGES);
        cx.bus.notify(apt)?.render(image)?;

        let mut home = HomeEvent::new(image);
        home.directory(["bin", "build", "package", "backup"]);
        home.directory(["data", "data/app"]);
        home.directory(["config", "config/app"]);
        let home = cx.bus.notify(home)?;
        let home_dir = home.home.clone();
        home.render(image)?;

        let mut venv = VirtualenvEvent::new(image, "$NGWROOT/env")?;
        venv.requirement(["uwsgi"]);

        let package_root = venv.package_root();
        let mut python_packages = Vec::new();
        for package in cx.packages.values().filter(|p| p.is_python()) {
            python_packages.push(package.name.clone());

            let files: Vec<PathBuf> = if profile.is_development() {
                let mut files: Vec<PathBuf> = METADATA_FILES
                    .iter()
                    .map(|name| package.path.join(name))
                    .filter(|path| path.is_file())
                    .collect();
                let event = cx
                    .bus
                    .notify(PackageFilesEvent::new(image, &package.name))?;
                files.extend(event.files.iter().map(|f| package.path.join(f)));
                files
            } else {
                cx.git.ls_files(&package.path)?
            };

            copy_files(files, &package_root.join(&package.name), &package.path)?;
            venv.package(LocalPackage::resolve(
                &package.name,
                &package.path,
                package.target(),
                cx.git,
            )?);

            if profile.is_production() {
                venv.after_install([format!(
                    "$NGWROOT/env/bin/nextgisweb-i18n -p {} compile",
                    package.name
                )]);
            }
        }
        cx.bus.notify(venv)?.render(image)?;

        let mut config = IniConfig::new();
        if profile.is_development() {
            config.set("core", "debug", "true");
        }
        config.set("core", "sdir", "${NGWROOT}/data/app");
        config.set("core", "database.host", "postgres");
        config.set("core", "database.name", "nextgisweb");
        config.set("core", "database.user", "nextgisweb");
        config.set("core", "database.pwfile", "${NGWROOT}/secret/postgres");
        config.set("core", "backup.path", "backup");
        config.set(
            "core",
            "backup.filename",
            "nextgisweb-%Y%m%d-%H%M%S.ngwbackup",
        );
        config.set("pyramid", "backup.download", "true");
        let config = cx.bus.notify(ConfigEvent::new(image, config))?.config.clone();

        let staging = TempDir::new().map_err(BuildError::io("create", std::env::temp_dir()))?;
        assets::stage(assets::APP, staging.path())?;
        let config_file = staging.path().join("build/config/app/config.ini");
        std::fs::write(&config_file, config.render())
            .map_err(BuildError::io("write", &config_file))?;
        image.copy(staging.path(), "$NGWROOT", Some("$NGWUSER:$NGWUSER"))?;

        let env = &mut image.environment;
        env.insert("NGWDOCKER_PACKAGES".to_owned(), python_packages.join(" "));
        if profile.default_instance {
            for key in [
                "NGWDOCKER_DEFAULT_INSTANCE",
                "NGWDOCKER_WAIT_FOR_SERVICE",
                "NGWDOCKER_INITIALIZE_DB",
            ] {
                env.insert(key.to_owned(), "yes".to_owned());
            }
        }
        if profile.is_development() {
            env.insert("NGWDOCKER_DEVELOPMENT".to_owned(), "yes".to_owned());
        }
        env.insert(
            "NEXTGISWEB_CONFIG".to_owned(),
            "$NGWROOT/build/config/app/config.ini:$NGWROOT/config/app/config.ini".to_owned(),
        );
        env.insert(
            "NEXTGISWEB_LOGGING".to_owned(),
            "$NGWROOT/config/app/logging.ini".to_owned(),
        );

        image.expose.push("8080".to_owned());
        image.volumes.extend(
            ["$NGWROOT/data", "$NGWROOT/config", "$NGWROOT/backup"].map(str::to_owned),
        );
        image.entrypoint = Some(vec![format!("{home_dir}/bin/docker-entrypoint")]);
        image.command = Some(vec![
            if profile.is_production() {
                "uwsgi-production"
            } else {
                "pserve-development"
            }
            .to_owned(),
        ]);

        cx.bus.notify(FinishEvent::new(image))?.render(image)
    }
}
