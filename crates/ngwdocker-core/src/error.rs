use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid settings for package [{package}]: {reason}")]
    InvalidPackageSettings { package: String, reason: String },

    // ── Env file ──
    #[error("failed to read env file {path}")]
    EnvFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed line {line} in env file {path}: expected KEY=VALUE")]
    EnvFileParse { path: PathBuf, line: usize },

    #[error("failed to write env file {path}")]
    EnvFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to back up env file {path} to {backup}")]
    EnvFileBackup {
        path: PathBuf,
        backup: PathBuf,
        source: std::io::Error,
    },

    // ── Filesystem ──
    #[error("failed to copy {from} to {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk directory {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    // ── Git ──
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },

    #[error("git {} in {} exited with {status}: {stderr}", args.join(" "), cwd.display())]
    GitFailed {
        args: Vec<String>,
        cwd: PathBuf,
        status: String,
        stderr: String,
    },
}
