//! Files baked into the base images: entrypoint scripts, helper commands
//! and configuration templates. Paths are relative to `$NGWROOT`.

use std::path::Path;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub path: &'static str,
    pub content: &'static str,
    pub executable: bool,
}

const fn script(path: &'static str, content: &'static str) -> Asset {
    Asset {
        path,
        content,
        executable: true,
    }
}

const fn file(path: &'static str, content: &'static str) -> Asset {
    Asset {
        path,
        content,
        executable: false,
    }
}

pub const APP: &[Asset] = &[
    script(
        "bin/docker-entrypoint",
        include_str!("../../assets/app/bin/docker-entrypoint"),
    ),
    script(
        "bin/uwsgi-production",
        include_str!("../../assets/app/bin/uwsgi-production"),
    ),
    script(
        "bin/pserve-development",
        include_str!("../../assets/app/bin/pserve-development"),
    ),
    file(
        "build/config/app/paste.ini",
        include_str!("../../assets/app/config/paste.ini"),
    ),
    file(
        "build/template/app/config.ini",
        include_str!("../../assets/app/template/config.ini"),
    ),
    file(
        "build/template/app/logging.ini",
        include_str!("../../assets/app/template/logging.ini"),
    ),
];

pub const POSTGRES: &[Asset] = &[
    script(
        "bin/docker-entrypoint",
        include_str!("../../assets/postgres/bin/docker-entrypoint"),
    ),
    file(
        "build/template/postgres/postgresql.conf",
        include_str!("../../assets/postgres/template/postgresql.conf"),
    ),
    file(
        "build/template/postgres/pg_hba.conf",
        include_str!("../../assets/postgres/template/pg_hba.conf"),
    ),
];

pub const ARCHIVIST: &[Asset] = &[
    script(
        "bin/docker-entrypoint",
        include_str!("../../assets/archivist/bin/docker-entrypoint"),
    ),
    script("bin/backup", include_str!("../../assets/archivist/bin/backup")),
    script("bin/restore", include_str!("../../assets/archivist/bin/restore")),
];

/// Write `assets` under `root`, creating parent directories.
pub fn stage(assets: &[Asset], root: &Path) -> Result<()> {
    for asset in assets {
        let path = root.join(asset.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(BuildError::io("create", parent))?;
        }
        std::fs::write(&path, asset.content).map_err(BuildError::io("write", &path))?;
        if asset.executable {
            make_executable(&path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(BuildError::io("chmod", path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
