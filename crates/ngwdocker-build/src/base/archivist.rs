use tempfile::TempDir;

use super::assets;
use crate::error::{BuildError, Result};
use crate::events::{AptEvent, HomeEvent, VirtualenvEvent};
use crate::image::{BuildCx, Image, ImageRecipe};

pub const NAME: &str = "archivist";

/// Backup sidecar: archives the data, config and secret trees of the
/// other services with zstd.
#[derive(Debug, Default)]
pub struct ArchivistRecipe;

impl ImageRecipe for ArchivistRecipe {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&mut self, image: &mut Image, cx: &BuildCx<'_>) -> Result<()> {
        let mut apt = AptEvent::new(image);
        apt.package(image.profile().python_packages().iter().copied());
        apt.package(["zstd"]);
        cx.bus.notify(apt)?.render(image)?;

        let mut home = HomeEvent::new(image);
        home.directory(["bin", "backup"]);
        home.directory(["data", "data/app", "data/postgres"]);
        home.directory(["config", "config/app", "config/postgres"]);
        home.directory(["secret"]);
        let home = cx.bus.notify(home)?;
        let home_dir = home.home.clone();
        home.render(image)?;

        let venv = VirtualenvEvent::new(image, "$NGWROOT/env")?;
        cx.bus.notify(venv)?.render(image)?;

        let staging = TempDir::new().map_err(BuildError::io("create", std::env::temp_dir()))?;
        assets::stage(assets::ARCHIVIST, staging.path())?;
        image.copy(staging.path(), "$NGWROOT", Some("$NGWUSER:$NGWUSER"))?;

        image.entrypoint = Some(vec![format!("{home_dir}/bin/docker-entrypoint")]);
        image.command = Some(vec!["/bin/bash".to_owned()]);
        Ok(())
    }
}
