// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vaultlink::backend::{authenticate, SecretBackend, VaultClient};
use vaultlink::binding::{BindingOrchestrator, KubeBinder, PendingBinds, Reconciler};
use vaultlink::config::Config;
use vaultlink::health::HealthServer;
use vaultlink::kubernetes::NamespaceMarker;
use vaultlink::naming::NamingTemplates;
use vaultlink::reconcilers::{NamespaceWatcher, SecretWatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting vaultlink operator");
    info!(
        "Configuration loaded: backend={} cluster={} service_account={}",
        config.backend_addr, config.cluster, config.service_account
    );

    let templates = NamingTemplates::from_config(&config).context("Invalid naming templates")?;

    // Establish the backend credential
    let backend = VaultClient::new(&config.backend_addr)?;
    let backend = Arc::new(
        authenticate(backend, &config)
            .await
            .context("Failed to authenticate against the backend")?,
    );
    info!("Authenticated against backend {}", backend.address());

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let orchestrator = BindingOrchestrator::new(backend.clone(), templates, config.sso_mount.clone());
    let marker = NamespaceMarker::new(client.clone(), backend.address());
    let binder = KubeBinder::new(
        client.clone(),
        orchestrator,
        marker,
        config.cluster.clone(),
        config.service_account.clone(),
        config.kube_addr.clone(),
    );

    // Create the reconciler and get a handle for the watchers
    let (reconciler, handle) = Reconciler::new(binder, PendingBinds::new(), config.service_account.clone());

    let namespace_watcher = NamespaceWatcher::new(client.clone(), handle.clone());
    let secret_watcher = SecretWatcher::new(client, handle);
    let health = HealthServer::new(backend, config.health_port);

    info!("Starting watchers...");

    tokio::select! {
        result = async {
            tokio::try_join!(
                reconciler.run(),
                namespace_watcher.run(),
                secret_watcher.run(),
                health.run()
            )
        } => {
            result?;
            // Watchers run forever unless their streams end
            warn!("All watchers stopped unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
