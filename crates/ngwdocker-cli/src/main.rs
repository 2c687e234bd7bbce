mod commands;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "ngwdocker",
    about = "Generate Dockerfiles and docker-compose.yaml for NextGIS Web"
)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ngwdocker.yaml)
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    commands::build(cli.config.as_deref())
}
