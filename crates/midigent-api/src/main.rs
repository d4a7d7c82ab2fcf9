//! Binary entrypoint for the midigent API server.
use anyhow::Context;
use midigent_api::{run, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // MIDIGENT_CONFIG names an optional YAML file; MIDIGENT_* variables override it
    let settings = Settings::load().context("loading settings")?;
    run(settings).await.context("serving API")?;
    Ok(())
}
