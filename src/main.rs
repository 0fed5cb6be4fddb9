use anyhow::Result;
use firely_reconciler::cache::LocalCache;
use firely_reconciler::config::Config;
use firely_reconciler::feed::LiveFeedSubscriber;
use firely_reconciler::reconcile::{ReconcileEngine, HISTORY_CAPACITY};
use tokio::sync::mpsc;

fn init_tracing() -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,firely_reconciler=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let config = Config::from_env()?;

    let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
    let cache = LocalCache::new(config.state_dir.clone());
    let engine = ReconcileEngine::new(cache, HISTORY_CAPACITY, Some(alarm_tx));

    // Seed from the local cache before any live data arrives.
    engine.restore().await;

    let status_engine = engine.clone();
    let status_interval = config.status_log_interval();
    let status_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(status_interval);
        loop {
            ticker.tick().await;
            let snapshot = status_engine.snapshot().await;
            tracing::info!(
                phase = ?snapshot.phase,
                temperature = ?snapshot.reading.temperature,
                probability = snapshot.fire_risk_probability,
                fire_risk = snapshot.fire_risk,
                alarm_on = snapshot.alarm_on,
                history_len = snapshot.history.len(),
                "reconciler status"
            );
        }
    });

    let subscriber = LiveFeedSubscriber::spawn(config, engine.clone(), alarm_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    // Mark the engine torn down first so late-arriving events are dropped,
    // then cancel every open subscription.
    engine.teardown().await;
    subscriber.teardown().await;
    status_handle.abort();

    Ok(())
}
