//! The mutable graph packages build during their lifecycle passes: images,
//! services, named volumes, the env file and the event bus.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use ngwdocker_core::{EnvValues, Git, Settings};

use crate::error::{BuildError, Result};
use crate::event::EventBus;
use crate::image::{BuildCx, Image, ImageRecipe, Owner, Profile};
use crate::package::PackageInfo;
use crate::service::Service;

/// An image together with the package that registered it and the recipe
/// that configures it.
pub struct ImageEntry {
    pub package: String,
    pub image: Image,
    recipe: Box<dyn ImageRecipe>,
}

pub struct Topology {
    settings: Settings,
    profile: Profile,
    project_path: PathBuf,
    build_path: PathBuf,
    packages: IndexMap<String, PackageInfo>,
    images: IndexMap<String, ImageEntry>,
    services: IndexMap<String, Service>,
    volumes: IndexSet<String>,
    envfile: EnvValues,
    bus: EventBus,
}

impl Topology {
    pub fn new(project_path: impl Into<PathBuf>, settings: Settings, owner: Owner) -> Self {
        let project_path = project_path.into();
        let profile = Profile {
            mode: settings.mode,
            python3: settings.python3,
            default_instance: true,
            owner,
        };
        Self {
            build_path: project_path.join("build"),
            project_path,
            settings,
            profile,
            packages: IndexMap::new(),
            images: IndexMap::new(),
            services: IndexMap::new(),
            volumes: IndexSet::new(),
            envfile: EnvValues::new(),
            bus: EventBus::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Only affects images registered afterwards.
    pub(crate) fn set_owner(&mut self, owner: Owner) {
        self.profile.owner = owner;
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn package_path(&self) -> PathBuf {
        self.project_path.join("package")
    }

    pub fn build_path(&self) -> &Path {
        &self.build_path
    }

    pub fn packages(&self) -> &IndexMap<String, PackageInfo> {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.get(name)
    }

    pub(crate) fn insert_package(&mut self, package: PackageInfo) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn envfile(&self) -> &EnvValues {
        &self.envfile
    }

    pub fn envfile_mut(&mut self) -> &mut EnvValues {
        &mut self.envfile
    }

    pub(crate) fn set_envfile(&mut self, values: EnvValues) {
        self.envfile = values;
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Register an image owned by `package`; its build-context directory
    /// is created under `build/`.
    pub fn add_image(&mut self, package: &PackageInfo, recipe: Box<dyn ImageRecipe>) -> Result<&mut Image> {
        let name = recipe.name().to_owned();
        if self.images.contains_key(&name) {
            return Err(BuildError::DuplicateImage(name));
        }

        let path = self.build_path.join(&name);
        std::fs::create_dir_all(&path).map_err(BuildError::io("create", &path))?;
        tracing::debug!(image = %name, package = %package.name, "image registered");

        let entry = ImageEntry {
            package: package.name.clone(),
            image: Image::new(name.clone(), path, self.profile),
            recipe,
        };
        Ok(&mut self.images.entry(name).or_insert(entry).image)
    }

    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.get(name).map(|entry| &entry.image)
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageEntry> {
        self.images.values()
    }

    pub fn add_service(&mut self, service: Service) -> Result<()> {
        if self.services.contains_key(&service.name) {
            return Err(BuildError::DuplicateService(service.name));
        }
        tracing::debug!(service = %service.name, "service registered");
        self.services.insert(service.name.clone(), service);
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.get_mut(name)
    }

    pub fn services(&self) -> &IndexMap<String, Service> {
        &self.services
    }

    /// Declare a named volume. Declaring it twice is a no-op.
    pub fn add_volume(&mut self, name: impl Into<String>) {
        self.volumes.insert(name.into());
    }

    pub fn volumes(&self) -> &IndexSet<String> {
        &self.volumes
    }

    /// Configure every image in registration order.
    pub(crate) fn configure_images(&mut self, git: &dyn Git) -> Result<()> {
        let Self {
            bus,
            packages,
            images,
            ..
        } = self;
        let cx = BuildCx {
            bus: &*bus,
            packages: &*packages,
            git,
        };
        for entry in images.values_mut() {
            entry.image.configure(entry.recipe.as_mut(), &cx)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("project_path", &self.project_path)
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .field("images", &self.images.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("volumes", &self.volumes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngwdocker_core::PackageSettings;
    use tempfile::TempDir;

    struct Empty(&'static str);

    impl ImageRecipe for Empty {
        fn name(&self) -> &str {
            self.0
        }

        fn configure(&mut self, _image: &mut Image, _cx: &BuildCx<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn base(path: &Path) -> PackageInfo {
        PackageInfo {
            name: "ngwdocker".to_owned(),
            path: path.to_path_buf(),
            settings: PackageSettings::default(),
            version: None,
            builtin: true,
        }
    }

    #[test]
    fn images_get_a_build_directory() {
        let tmp = TempDir::new().unwrap();
        let mut topo = Topology::new(tmp.path(), Settings::default(), Owner::DEFAULT);
        let pkg = base(tmp.path());

        let image = topo.add_image(&pkg, Box::new(Empty("app"))).unwrap();
        assert_eq!(image.path(), tmp.path().join("build/app"));
        assert!(tmp.path().join("build/app").is_dir());
        assert_eq!(topo.images().next().unwrap().package, "ngwdocker");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut topo = Topology::new(tmp.path(), Settings::default(), Owner::DEFAULT);
        let pkg = base(tmp.path());

        topo.add_image(&pkg, Box::new(Empty("app"))).unwrap();
        assert!(matches!(
            topo.add_image(&pkg, Box::new(Empty("app"))),
            Err(BuildError::DuplicateImage(name)) if name == "app"
        ));

        topo.add_service(Service::local("app", "app")).unwrap();
        assert!(matches!(
            topo.add_service(Service::local("app", "app")),
            Err(BuildError::DuplicateService(name)) if name == "app"
        ));
    }

    #[test]
    fn volumes_are_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let mut topo = Topology::new(tmp.path(), Settings::default(), Owner::DEFAULT);
        topo.add_volume("secret");
        topo.add_volume("data_app");
        topo.add_volume("secret");
        assert_eq!(topo.volumes().iter().collect::<Vec<_>>(), vec!["secret", "data_app"]);
    }

    #[test]
    fn configure_writes_every_dockerfile() {
        let tmp = TempDir::new().unwrap();
        let mut topo = Topology::new(tmp.path(), Settings::default(), Owner::DEFAULT);
        let pkg = base(tmp.path());
        topo.add_image(&pkg, Box::new(Empty("app"))).unwrap();
        topo.add_image(&pkg, Box::new(Empty("postgres"))).unwrap();

        topo.configure_images(&ngwdocker_core::RealGit).unwrap();

        for name in ["app", "postgres"] {
            let dockerfile = std::fs::read_to_string(tmp.path().join("build").join(name).join("Dockerfile")).unwrap();
            assert!(dockerfile.starts_with("FROM ubuntu:18.04\nENV LC_ALL=C.UTF-8\n\n"));
        }
        assert!(topo.images().all(|entry| entry.image.is_closed()));
    }
}
