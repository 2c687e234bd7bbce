use std::path::Path;

use anyhow::Context as _;
use ngwdocker_build::{Context, PackageRegistry};

use super::DEFAULT_CONFIG;

/// Generate build contexts, docker-compose.yaml and .env.
///
/// An explicitly given config file must exist; the default one may be
/// missing, in which case default settings apply.
pub fn build(config: Option<&Path>) -> anyhow::Result<()> {
    let config_path = match config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("config file {} not found", path.display());
            }
            path
        }
        None => Path::new(DEFAULT_CONFIG),
    };

    tracing::debug!(config = %config_path.display(), "loading configuration");
    let mut ctx = Context::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    ctx.load_packages(&PackageRegistry::default())
        .context("failed to load packages")?;
    let output = ctx.build().context("build failed")?;

    for image in &output.images {
        println!("Built image context build/{image}");
    }
    println!(
        "Wrote {} ({} services)",
        output.compose_file.display(),
        output.services.len()
    );
    if let Some(backup) = &output.env_backup {
        println!("Previous env file saved as {}", backup.display());
    }
    Ok(())
}
