//! Serve command - starts the API server.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cw_api::auth::TokenMap;
use cw_api::rate_limit::TenantRateLimiter;
use cw_api::{ApiServer, ApiServerConfig, AppState};
use cw_core::{ActionKind, CorrelatorConfig, MemoryStore, PatternCorrelator, TenantId};
use cw_dispatch::{ActionSink, Dispatcher, LogSink, RetryPolicy, SinkRegistry, WebhookSink};
use cw_policy::{PolicySnapshot, PolicyStore};

use crate::config::AppConfig;

/// Runs the API server from the loaded configuration.
pub async fn run_server(config: AppConfig) -> Result<()> {
    println!("{} Starting Crosswatch event router...", "[server]".cyan());

    let auth = build_token_map(&config)?;
    println!("  {} {} tenant(s) registered", "→".green(), config.tenants.len());

    let policy = match &config.policy_file {
        Some(path) => {
            let snapshot = PolicySnapshot::load(Path::new(path))
                .with_context(|| format!("Failed to load policy from {path}"))?;
            println!("  {} Policy: {} ({})", "→".green(), path, snapshot.version);
            PolicyStore::new(snapshot)
        }
        None => {
            println!("  {} Policy: builtin severity routing", "→".green());
            PolicyStore::default()
        }
    };

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let registry = build_sink_registry(&config)?;
    let retry = RetryPolicy {
        max_attempts: config.dispatch.max_attempts,
        base_backoff: Duration::from_millis(config.dispatch.base_backoff_ms),
        max_backoff: Duration::from_millis(config.dispatch.max_backoff_ms),
        attempt_timeout: Duration::from_secs(config.dispatch.attempt_timeout_secs),
    };
    let dispatcher = Dispatcher::new(registry, store.clone()).with_retry_policy(retry);

    let correlator = PatternCorrelator::new(CorrelatorConfig {
        window: chrono::Duration::minutes(config.correlator.window_minutes),
        min_tenants: config.correlator.min_tenants,
    });
    println!(
        "  {} Correlator: {}m window, {} distinct tenants",
        "→".green(),
        config.correlator.window_minutes,
        config.correlator.min_tenants
    );

    let state = AppState::new(
        store,
        policy,
        dispatcher,
        correlator,
        auth,
        TenantRateLimiter::new(config.rate_limit.events_per_minute),
    );

    let bind_address: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let server_config = ApiServerConfig {
        bind_address,
        sweep_interval: Duration::from_secs(config.correlator.sweep_interval_secs),
    };

    println!("  {} Listening on {}", "✓".green(), bind_address);
    println!();

    ApiServer::new(state, server_config)
        .run()
        .await
        .context("API server failed")?;
    Ok(())
}

fn build_token_map(config: &AppConfig) -> Result<TokenMap> {
    let mut auth = TokenMap::new();
    for tenant in &config.tenants {
        let id = TenantId::new(tenant.id.as_str());
        if !id.is_well_formed() {
            bail!("malformed tenant id in config: '{}'", tenant.id);
        }
        if tenant.token.is_empty() {
            bail!("tenant '{}' has an empty token", tenant.id);
        }
        auth.insert(&tenant.token, id);
    }
    Ok(auth)
}

fn build_sink_registry(config: &AppConfig) -> Result<SinkRegistry> {
    let timeout = Duration::from_secs(config.sinks.webhook_timeout_secs);
    let mut registry = SinkRegistry::new();
    let endpoints = [
        (ActionKind::Page, "page", &config.sinks.page_webhook),
        (ActionKind::Ticket, "ticket", &config.sinks.ticket_webhook),
        (ActionKind::Alert, "alert", &config.sinks.alert_webhook),
        (
            ActionKind::Escalate,
            "escalate",
            &config.sinks.escalate_webhook,
        ),
    ];
    for (action, name, endpoint) in endpoints {
        let sink: Arc<dyn ActionSink> = match endpoint {
            Some(url) => Arc::new(
                WebhookSink::new(name, url, timeout)
                    .with_context(|| format!("Failed to build {name} webhook sink"))?,
            ),
            None => Arc::new(LogSink),
        };
        registry.register(action, sink);
    }
    Ok(registry)
}
