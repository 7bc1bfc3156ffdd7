use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tsprep::config::PipelineConfig;
use tsprep::pipeline;

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let config_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yml"));
    info!(path = %config_path.display(), "loading configuration");

    let config = PipelineConfig::load(&config_path)?;
    let today = Local::now().date_naive();

    if let Err(e) = pipeline::run(&config, today) {
        error!("pipeline failed: {e}");
        return Err(e.into());
    }
    Ok(())
}
