//! Small helpers shared by the image builder: passwords, one-line JSON,
//! build-context names, and file tree copies.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use walkdir::WalkDir;

/// Generate a random alphanumeric password.
///
/// The result always has at least one lowercase letter, one uppercase
/// letter, and three digits.
pub fn pwgen(length: usize) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let password: String = (0..length)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        if is_strong(&password) {
            return password;
        }
    }
}

fn is_strong(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().filter(|c| c.is_ascii_digit()).count() >= 3
}

/// Dump a list of strings as one-line JSON, as used by `VOLUME`,
/// `ENTRYPOINT` and `CMD` instructions.
pub fn ndjson(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

/// Build-context name for the `index`-th copy into `target`.
///
/// `$NGWROOT/` with index 1 becomes `01-ngwroot`.
pub fn copy_slug(target: &str, index: usize) -> String {
    let mut slug = String::with_capacity(target.len());
    for c in target.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }
    format!("{index:02}-{}", slug.trim_matches('_'))
}

/// Copy a file or a whole directory tree. Symlinks inside trees are
/// recreated rather than followed.
pub fn copy_tree(src: &Path, dst: &Path) -> crate::Result<()> {
    let copy_err = |from: &Path, to: &Path, source: std::io::Error| crate::Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if src.is_file() {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| copy_err(src, dst, e))?;
        }
        std::fs::copy(src, dst).map_err(|e| copy_err(src, dst, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| crate::Error::Walk {
            path: src.to_path_buf(),
            source: e,
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| copy_err(entry.path(), dst, std::io::Error::other(e)))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| copy_err(entry.path(), &target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let link = std::fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}

/// Copy `sources` into `dst`, keeping each source's path relative to `relative`.
pub fn copy_files<I>(sources: I, dst: &Path, relative: &Path) -> crate::Result<()>
where
    I: IntoIterator<Item = PathBuf>,
{
    for source in sources {
        let rel = source.strip_prefix(relative).map_err(|e| crate::Error::Copy {
            from: source.clone(),
            to: dst.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        copy_tree(&source, &dst.join(rel))?;
    }
    Ok(())
}
