//! Persisted `KEY=VALUE` settings (the project's `.env` file).
//!
//! The format is deliberately minimal: one pair per line, split at the
//! first `=`, no quoting and no escaping. Writing keeps a timestamped
//! copy of the previous file whenever its content changes.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use time::OffsetDateTime;

pub type EnvValues = IndexMap<String, String>;

/// Read an env file. A missing file yields an empty mapping.
pub fn read_envfile(path: &Path) -> crate::Result<EnvValues> {
    let mut values = EnvValues::new();
    if !path.exists() {
        return Ok(values);
    }

    let content = std::fs::read_to_string(path).map_err(|e| crate::Error::EnvFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    for (idx, line) in content.lines().enumerate() {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| crate::Error::EnvFileParse {
                path: path.to_path_buf(),
                line: idx + 1,
            })?;
        values.insert(key.to_owned(), value.to_owned());
    }

    Ok(values)
}

/// Write an env file, renaming the previous one aside if its content differs.
///
/// Returns the backup path when a backup was made.
pub fn write_envfile(path: &Path, values: &EnvValues) -> crate::Result<Option<PathBuf>> {
    let original = read_envfile(path)?;

    let mut backup = None;
    if !original.is_empty() && original != *values {
        let target = backup_path(path, &backup_suffix());
        std::fs::rename(path, &target).map_err(|e| crate::Error::EnvFileBackup {
            path: path.to_path_buf(),
            backup: target.clone(),
            source: e,
        })?;
        tracing::info!(backup = %target.display(), "env file changed, previous version kept");
        backup = Some(target);
    }

    std::fs::write(path, render_envfile(values)).map_err(|e| crate::Error::EnvFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(backup)
}

pub fn render_envfile(values: &EnvValues) -> String {
    values
        .iter()
        .map(|(k, v)| format!("{k}={v}\n"))
        .collect()
}

fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => String::new(),
    };
    path.with_file_name(format!("{name}-{suffix}"))
}

/// Local timestamp as `YYYYMMDD-HHMMSS`.
fn backup_suffix() -> String {
    let now = match OffsetDateTime::now_local() {
        Ok(now) => now,
        Err(e) => {
            tracing::debug!(error = %e, "local offset unavailable, using UTC for backup name");
            OffsetDateTime::now_utc()
        }
    };
    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
