use anyhow::Context;
use clap::Parser;
use sshxfer_lib::api::ApiService;
use sshxfer_lib::config::ServiceConfig;
use sshxfer_lib::logging::init_tracing;
use sshxfer_lib::transfer::Ssh2Connector;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env values fill in whatever the environment does not already set.
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = ServiceConfig::parse();
    init_tracing(config.log_format)?;
    if !dotenv_loaded {
        tracing::info!("No .env file found, using environment variables");
    }
    config.validate().context("invalid configuration")?;

    tracing::info!(
        "Host key policy: {}; rate limit: {} requests per {}s",
        config.ssh_host_trust,
        config.rate_limit_requests,
        config.rate_limit_duration
    );

    let api = Arc::new(ApiService::new(config, Arc::new(Ssh2Connector)));
    api.start_server().await.context("HTTP server failed")?;
    Ok(())
}
