//! Provisioning daemon: opens the job store, wires the external clients,
//! and runs the background poller until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;

use domainforge_core::RetryPolicy;
use domainforge_infra::SqliteJobStore;
use domainforge_pipeline::{spawn_poller, JobEngine, PipelineConfig, StepHandlers};
use domainforge_provisioning::{CaddyClient, CloudflareClient, ProxyAllowlist};
use domainforge_registrar::{RegistrarConfig, RegistrarSelector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    domainforge_observability::init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::warn!("DATABASE_URL not set; using ./domainforge.db");
        "sqlite://domainforge.db?mode=rwc".to_string()
    });
    let store = Arc::new(
        SqliteJobStore::connect(&database_url)
            .await
            .context("opening job store")?,
    );

    let registrars = RegistrarSelector::from_config(&RegistrarConfig::from_env())
        .context("building registrar selector")?;

    let cloudflare_url = std::env::var("CLOUDFLARE_API_URL")
        .unwrap_or_else(|_| "https://api.cloudflare.com/client/v4".to_string());
    let cloudflare_token = std::env::var("CLOUDFLARE_API_TOKEN").unwrap_or_else(|_| {
        tracing::warn!("CLOUDFLARE_API_TOKEN not set; legacy DNS steps will fail");
        String::new()
    });
    let dns = Arc::new(
        CloudflareClient::new(cloudflare_url, cloudflare_token)
            .context("building dns client")?,
    );

    let caddy_url = std::env::var("CADDY_API_URL").unwrap_or_else(|_| {
        tracing::warn!("CADDY_API_URL not set; using http://127.0.0.1:2019");
        "http://127.0.0.1:2019".to_string()
    });
    // A missing token is surfaced at call time, not here.
    let caddy_token = std::env::var("CADDY_API_TOKEN").ok();
    let allowlist =
        Arc::new(CaddyClient::new(caddy_url, caddy_token).context("building proxy client")?);

    if !allowlist.health().await {
        tracing::warn!("proxy allowlist service is unreachable");
    }

    let config = PipelineConfig::from_env();
    let handlers = StepHandlers::new(
        store.clone(),
        registrars,
        dns,
        allowlist,
        config.clone(),
    );
    let engine = Arc::new(JobEngine::new(
        store.clone(),
        handlers,
        RetryPolicy::default(),
    ));

    let poller = spawn_poller(store, engine, config.poll_interval, config.batch_size);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received");

    poller.shutdown();
    poller.join().await;
    Ok(())
}
