use crate::config::Config;
use crate::reconcile::ReconcileEngine;
use crate::telemetry::decode_payload;
use chrono::Utc;
use rumqttc::{AsyncClient, ClientError, Event, Incoming, MqttOptions, QoS};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Topic subscriptions registered for one MQTT session. Replaces the
/// module-global listener arrays the drifted revisions used: every cancel
/// handle is owned here and released by a single scoped teardown call.
struct SubscriptionRegistry {
    client: AsyncClient,
    topics: Vec<String>,
}

impl SubscriptionRegistry {
    fn new(client: AsyncClient) -> Self {
        Self {
            client,
            topics: Vec::new(),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.client.subscribe(topic, QoS::AtLeastOnce).await?;
        self.topics.push(topic.to_string());
        Ok(())
    }

    /// Cancels every registered subscription. A failure to cancel one never
    /// prevents cancellation of the rest.
    async fn teardown(mut self) {
        for topic in self.topics.drain(..) {
            if let Err(err) = self.client.unsubscribe(topic.clone()).await {
                tracing::warn!(topic = %topic, error=%err, "failed to cancel subscription");
            }
        }
        if let Err(err) = self.client.disconnect().await {
            tracing::debug!(error=%err, "mqtt disconnect failed");
        }
    }
}

/// Owns the live-feed task: one current-reading topic plus the history
/// topics (primary and legacy fallback, both watched because deployments
/// vary), routed into the engine, with the alarm write-back channel flowing
/// the other way.
pub struct LiveFeedSubscriber {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LiveFeedSubscriber {
    pub fn spawn(
        config: Config,
        engine: ReconcileEngine,
        alarm_rx: mpsc::UnboundedReceiver<bool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_listener(config, engine, alarm_rx, shutdown_rx));
        Self {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Total, cooperative cancellation: signals the feed task, which cancels
    /// every registered subscription before exiting. No event reaches the
    /// engine afterwards.
    pub async fn teardown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.task.await {
            tracing::warn!(error=%err, "feed task failed during teardown");
        }
    }
}

async fn run_listener(
    config: Config,
    engine: ReconcileEngine,
    mut alarm_rx: mpsc::UnboundedReceiver<bool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    engine.mark_subscribing().await;
    let mut alarm_open = true;

    loop {
        let mut mqttoptions = MqttOptions::new(
            config.mqtt_client_id.clone(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        mqttoptions.set_keep_alive(config.mqtt_keepalive());
        if let Some(username) = &config.mqtt_username {
            mqttoptions.set_credentials(
                username.clone(),
                config.mqtt_password.clone().unwrap_or_default(),
            );
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 32);
        let mut registry = SubscriptionRegistry::new(client.clone());

        let mut subscribed = true;
        for topic in std::iter::once(&config.current_topic).chain(config.history_topics.iter()) {
            match registry.subscribe(topic).await {
                Ok(()) => tracing::info!(topic=%topic, "subscribed to feed"),
                Err(err) => {
                    tracing::warn!(topic=%topic, error=%err, "failed to subscribe; retrying");
                    subscribed = false;
                    break;
                }
            }
        }
        if !subscribed {
            registry.teardown().await;
            tokio::select! {
                _ = &mut shutdown_rx => return,
                _ = sleep(Duration::from_secs(2)) => continue,
            }
        }
        engine.mark_live().await;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    registry.teardown().await;
                    return;
                }
                maybe = alarm_rx.recv(), if alarm_open => {
                    match maybe {
                        Some(on) => publish_alarm(&client, &config.alarm_topic, on).await,
                        None => alarm_open = false,
                    }
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            let received_at = Utc::now();
                            let mut payload = publish.payload.to_vec();
                            let value = match decode_payload(&mut payload) {
                                Ok(value) => value,
                                Err(err) => {
                                    tracing::warn!(topic=%publish.topic, error=%err, "failed to decode feed payload");
                                    continue;
                                }
                            };
                            if publish.topic == config.current_topic {
                                engine.handle_current_reading(&value, received_at).await;
                            } else if config.history_topics.iter().any(|t| t == &publish.topic) {
                                engine.handle_history_tree(&value).await;
                            } else {
                                tracing::debug!(topic=%publish.topic, "ignoring message on unrouted topic");
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(error=%err, "MQTT connection dropped; reconnecting");
                            break;
                        }
                    }
                }
            }
        }

        registry.teardown().await;
        tokio::select! {
            _ = &mut shutdown_rx => return,
            _ = sleep(Duration::from_secs(1)) => {}
        }
    }
}

/// Best-effort remote write of the alarm state. Failure keeps the optimistic
/// local mutation; local and remote reconverge once connectivity returns.
async fn publish_alarm(client: &AsyncClient, topic: &str, on: bool) {
    let payload = if on { "true" } else { "false" };
    if let Err(err) = client.publish(topic, QoS::AtLeastOnce, true, payload).await {
        tracing::debug!(alarm = on, error=%err, "failed to write alarm state; keeping local value");
    }
}

#[cfg(test)]
mod tests {
    use super::LiveFeedSubscriber;
    use crate::cache::LocalCache;
    use crate::config::Config;
    use crate::reconcile::{ReconcileEngine, HISTORY_CAPACITY};
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn teardown_completes_without_a_broker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::from_env().expect("config");
        config.mqtt_host = "127.0.0.1".to_string();
        config.mqtt_port = 1;
        config.state_dir = dir.path().to_path_buf();

        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
        let engine = ReconcileEngine::new(
            LocalCache::new(dir.path()),
            HISTORY_CAPACITY,
            Some(alarm_tx),
        );
        engine.restore().await;

        let subscriber = LiveFeedSubscriber::spawn(config, engine.clone(), alarm_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.teardown().await;
        timeout(Duration::from_secs(5), subscriber.teardown())
            .await
            .expect("teardown finished");
    }
}
