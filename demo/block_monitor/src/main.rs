use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use vigil_core::realtime::{Notification, Urgency};
use vigil_core::telemetry::init_tracing;
use vigil_core::{
    BindingState, Dashboard, DashboardDefinition, HttpResolver, RealtimeCoordinator, VigilConfig,
};

const DEFAULT_FILTER: &str = "info,vigil_core=info,block_monitor=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing(DEFAULT_FILTER)?;

    let config = VigilConfig::from_env();
    let token = std::env::var("VIGIL_AUTH_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let dashboard_path =
        std::env::var("VIGIL_DASHBOARD").unwrap_or_else(|_| "dashboard.json".to_string());

    let definition = DashboardDefinition::load(&dashboard_path)?;
    info!(
        target: "block_monitor",
        dashboard = %definition.name,
        blocks = definition.blocks.len(),
        api = %config.api_base_url,
        "Loaded dashboard"
    );

    let mut resolver = HttpResolver::new(&config);
    if let Some(token) = &token {
        resolver = resolver.with_bearer_token(token.clone());
    }
    let dashboard = Dashboard::new(Arc::new(resolver));

    let mut watchers = Vec::new();
    for block in &definition.blocks {
        let rx = dashboard.mount(block);
        watchers.push(tokio::spawn(watch_block(block.label().to_string(), rx)));
    }

    // Alert channel
    let realtime = RealtimeCoordinator::from_config(&config);
    let notify_task = if realtime.is_enabled() {
        let mut notifications = realtime.subscribe();
        realtime.set_token(token.clone()).await;
        if token.is_none() {
            warn!(target: "block_monitor", "VIGIL_AUTH_TOKEN not set; realtime alerts stay off");
        }
        Some(tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(n) => log_notification(&n),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "block_monitor", skipped, "Notification listener lagged");
                    }
                    Err(_) => break,
                }
            }
        }))
    } else {
        info!(target: "block_monitor", "VIGIL_REALTIME_URL not set; realtime alerts disabled");
        None
    };

    info!(target: "block_monitor", "Running. Press Ctrl+C to stop.");
    if let Err(e) = signal::ctrl_c().await {
        error!(target: "block_monitor", error = %e, "Failed to listen for shutdown signal");
    }

    info!(target: "block_monitor", "Shutting down");
    realtime.shutdown().await;
    dashboard.unmount_all();
    for handle in watchers {
        handle.abort();
    }
    if let Some(handle) = notify_task {
        handle.abort();
    }
    Ok(())
}

async fn watch_block(label: String, mut rx: watch::Receiver<BindingState>) {
    loop {
        let state = rx.borrow_and_update().clone();
        match &state {
            BindingState::Idle => info!(target: "block_monitor", block = %label, "idle"),
            BindingState::Loading { .. } => {
                info!(target: "block_monitor", block = %label, "loading")
            }
            BindingState::Ready { value, updated_at } => info!(
                target: "block_monitor",
                block = %label,
                updated_at = %updated_at,
                data = %preview(value),
                "ready"
            ),
            BindingState::Failed { error, last, .. } => warn!(
                target: "block_monitor",
                block = %label,
                error = %error,
                stale = last.is_some(),
                "failed"
            ),
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn log_notification(n: &Notification) {
    match n.urgency {
        Urgency::High => warn!(
            target: "block_monitor",
            alert = %n.alert_name,
            service = %n.service,
            "{}: {}",
            n.title,
            n.message
        ),
        Urgency::Normal => info!(
            target: "block_monitor",
            alert = %n.alert_name,
            service = %n.service,
            "{}: {}",
            n.title,
            n.message
        ),
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 120 {
        let head: String = text.chars().take(120).collect();
        format!("{}...", head)
    } else {
        text
    }
}
