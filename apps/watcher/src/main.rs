use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use listing::{
    CronScheduler, Listener, MexcPriceClient, Observer, PollConfig, PriceSnapshot, Subject,
};

mod config;

use config::Config;

/// Observer that logs every snapshot it receives.
struct LogObserver;

#[async_trait]
impl Observer for LogObserver {
    async fn on_price_update(&self, snapshot: PriceSnapshot) -> Result<()> {
        let mut pairs: Vec<_> = snapshot.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let rendered = pairs
            .iter()
            .map(|(symbol, price)| format!("{symbol}={price}"))
            .collect::<Vec<_>>()
            .join(" ");

        info!(prices = %rendered, "snapshot");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let source = Arc::new(MexcPriceClient::from_env().expect("init price client failed"));
    let mut scheduler = CronScheduler::new()
        .await
        .expect("init scheduler failed");

    let poll = PollConfig::new(
        config.poll_interval,
        config.fetch_timeout,
        config.notify_timeout,
    )?;
    let listener = Listener::new(source, Arc::new(scheduler.clone()), poll);

    listener.subscribe(Arc::new(LogObserver));

    for spec in &config.symbols {
        let activate_at = spec
            .activate_after
            .map(|after| {
                Utc::now()
                    + chrono::Duration::from_std(after).unwrap_or_else(|_| chrono::Duration::zero())
            });
        let added = listener.add_symbol(&spec.symbol, activate_at).await?;
        info!(symbol = %spec.symbol, added, delayed = spec.activate_after.is_some(), "watching");
    }

    shutdown_signal().await;

    listener.shutdown().await;
    scheduler.shutdown().await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
