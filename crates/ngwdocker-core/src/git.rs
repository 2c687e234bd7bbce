use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Exit code git uses when the working directory is not a repository.
const NOT_A_REPOSITORY: i32 = 128;

/// Abstraction over the git CLI for testability.
///
/// Production code uses [`RealGit`], tests use mockall-generated mocks.
/// All calls block until git exits.
pub trait Git {
    /// Files git considers part of the tree at `path` (absolute paths).
    fn ls_files(&self, path: &Path) -> crate::Result<Vec<PathBuf>>;

    /// Short id of `HEAD`, or `None` if `path` is not under version control.
    fn commit(&self, path: &Path) -> crate::Result<Option<String>>;

    /// Whether the working tree at `path` has uncommitted changes.
    fn is_dirty(&self, path: &Path) -> crate::Result<bool>;

    /// Clone `remote` into `path` if missing, fetch, and check out `revision`.
    fn checkout(&self, path: &Path, remote: &str, revision: &str) -> crate::Result<()>;
}

/// Real git CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealGit;

impl RealGit {
    fn output(&self, cwd: &Path, args: &[&str]) -> crate::Result<Output> {
        tracing::debug!(cwd = %cwd.display(), args = ?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| crate::Error::GitCommand {
                detail: format!("failed to execute git {}", args.join(" ")),
                source: e,
            })
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> crate::Result<String> {
        let output = self.output(cwd, args)?;
        if !output.status.success() {
            return Err(failed(cwd, args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn failed(cwd: &Path, args: &[&str], output: &Output) -> crate::Error {
    crate::Error::GitFailed {
        args: args.iter().map(|a| (*a).to_owned()).collect(),
        cwd: cwd.to_path_buf(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    }
}

impl Git for RealGit {
    fn ls_files(&self, path: &Path) -> crate::Result<Vec<PathBuf>> {
        let stdout = self.run(path, &["ls-files", "--exclude-standard"])?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| path.join(line))
            .collect())
    }

    fn commit(&self, path: &Path) -> crate::Result<Option<String>> {
        let args = ["rev-parse", "--short", "HEAD"];
        let output = self.output(path, &args)?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            )),
            Some(NOT_A_REPOSITORY) => Ok(None),
            _ => Err(failed(path, &args, &output)),
        }
    }

    fn is_dirty(&self, path: &Path) -> crate::Result<bool> {
        let args = ["diff", "--no-ext-diff", "--quiet"];
        let output = self.output(path, &args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(failed(path, &args, &output)),
        }
    }

    fn checkout(&self, path: &Path, remote: &str, revision: &str) -> crate::Result<()> {
        if !path.exists() {
            let target = path.to_string_lossy().into_owned();
            self.run(Path::new("."), &["clone", remote, target.as_str()])?;
        }
        self.run(path, &["fetch", "--all"])?;
        self.run(path, &["checkout", revision])?;
        Ok(())
    }
}
