//! Binary entrypoint for the Form-Titan API server.
use std::sync::Arc;

use formtitan_api::{run, FormStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Default listen address can be overridden with FORMTITAN_ADDR
    let addr = std::env::var("FORMTITAN_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    let store = Arc::new(FormStore::seeded()?);
    run(&addr, store).await?;
    Ok(())
}
