use crate::topic::topic_matches;
use async_trait::async_trait;
use chrono::Utc;
use otlink_sdk::{
    AdapterError, AdapterResult, ConnectionConfig, LiveHandle, MqttConfig, MqttSample,
    OperationTimeouts, Protocol, ProtocolAdapter, ReadRequest, ReadResult,
};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// One message forwarded from the event loop to any active collector.
#[derive(Debug, Clone)]
struct IncomingMessage {
    topic: String,
    payload: Vec<u8>,
}

/// Live broker link: the client plus the background task driving its event
/// loop. The connected flag mirrors the transport state as observed by the
/// event loop; checking it costs no round trip.
pub struct MqttHandle {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    incoming_tx: broadcast::Sender<IncomingMessage>,
    event_task: JoinHandle<()>,
    client_id: String,
}

impl LiveHandle for MqttHandle {}

/// MQTT protocol adapter
pub struct MqttAdapter {
    timeouts: OperationTimeouts,
}

impl MqttAdapter {
    pub fn new(timeouts: OperationTimeouts) -> Self {
        Self { timeouts }
    }
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new(OperationTimeouts::default())
    }
}

fn build_options(cfg: &MqttConfig, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, cfg.broker_host.trim(), cfg.broker_port);
    match (&cfg.username, &cfg.password) {
        (Some(user), Some(pass)) => {
            options.set_credentials(user, pass);
        }
        (Some(user), None) => {
            options.set_credentials(user, "");
        }
        _ => {}
    }
    options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(5)));
    options.set_clean_session(cfg.clean_session);
    options
}

/// Generate a client id when the config carries none. A short 8-hex suffix
/// keeps the id within broker length limits.
fn generate_client_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("otlink-{}", &simple[..8])
}

/// Drive the event loop until the transport dies or the handle is torn
/// down. The first CONNACK resolves the connect call through `ready_tx`;
/// PUBLISH packets fan out to active collectors.
async fn run_event_loop(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    incoming_tx: broadcast::Sender<IncomingMessage>,
    ready_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut ready_tx = Some(ready_tx);
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                debug!("MQTT connection established");
                connected.store(true, Ordering::Release);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let _ = incoming_tx.send(IncomingMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("MQTT server sent disconnect");
                connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Release);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(e.to_string()));
                } else {
                    warn!(error = %e, "MQTT event loop error, link considered dead");
                }
                break;
            }
        }
    }
}

fn parse_payload(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl ProtocolAdapter for MqttAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    #[instrument(level = "debug", skip_all)]
    async fn connect(&self, config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>> {
        let ConnectionConfig::Mqtt(cfg) = config else {
            return Err(AdapterError::ConfigError(
                "MQTT adapter received a non-MQTT config".to_string(),
            ));
        };

        let client_id = cfg.client_id.clone().unwrap_or_else(generate_client_id);
        let options = build_options(cfg, &client_id);
        let (client, event_loop) = AsyncClient::new(options, 128);

        let connected = Arc::new(AtomicBool::new(false));
        let (incoming_tx, _) = broadcast::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let event_task = tokio::spawn(run_event_loop(
            event_loop,
            Arc::clone(&connected),
            incoming_tx.clone(),
            ready_tx,
        ));

        match timeout(self.timeouts.connect(), ready_rx).await {
            Ok(Ok(Ok(()))) => {
                debug!(client_id = %client_id, host = %cfg.broker_host, "MQTT broker link opened");
                Ok(Arc::new(MqttHandle {
                    client,
                    connected,
                    incoming_tx,
                    event_task,
                    client_id,
                }))
            }
            Ok(Ok(Err(reason))) => {
                event_task.abort();
                Err(AdapterError::ConnectError(format!(
                    "MQTT connect failed: {reason}"
                )))
            }
            Ok(Err(_closed)) => {
                event_task.abort();
                Err(AdapterError::ConnectError(
                    "MQTT event loop terminated before CONNACK".to_string(),
                ))
            }
            Err(_elapsed) => {
                event_task.abort();
                Err(AdapterError::Timeout(self.timeouts.connect()))
            }
        }
    }

    /// The transport's own connected flag; no network round trip.
    async fn verify_live(&self, handle: &Arc<dyn LiveHandle>) -> bool {
        handle
            .downcast_ref::<MqttHandle>()
            .map(|h| h.connected.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    #[instrument(level = "debug", skip_all)]
    async fn read(
        &self,
        handle: &Arc<dyn LiveHandle>,
        request: &ReadRequest,
    ) -> AdapterResult<ReadResult> {
        let handle = handle
            .downcast_ref::<MqttHandle>()
            .ok_or(AdapterError::SessionError(
                "handle is not an MQTT handle".to_string(),
            ))?;
        let ReadRequest::Mqtt {
            topics,
            collect_window,
        } = request
        else {
            return Err(AdapterError::ConfigError(
                "MQTT adapter received a non-MQTT read request".to_string(),
            ));
        };
        if topics.is_empty() {
            return Ok(ReadResult::Mqtt(Vec::new()));
        }
        if !handle.connected.load(Ordering::Acquire) {
            return Err(AdapterError::SessionError(
                "MQTT transport is not connected".to_string(),
            ));
        }

        // Subscribe after taking the receiver so no message arriving during
        // the window can be missed.
        let mut rx = handle.incoming_tx.subscribe();
        for topic in topics {
            handle
                .client
                .subscribe(topic.clone(), QoS::AtMostOnce)
                .await
                .map_err(|e| {
                    AdapterError::ReadError(format!("MQTT subscribe to '{topic}' failed: {e}"))
                })?;
        }

        let deadline = tokio::time::Instant::now() + *collect_window;
        let mut samples = Vec::new();
        loop {
            let received = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                r = rx.recv() => r,
            };
            match received {
                Ok(message) => {
                    if topics.iter().any(|p| topic_matches(p, &message.topic)) {
                        samples.push(MqttSample {
                            topic: message.topic,
                            payload: parse_payload(&message.payload),
                            received_at: Utc::now(),
                        });
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "collector lagged behind incoming messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        for topic in topics {
            if let Err(e) = handle.client.unsubscribe(topic.clone()).await {
                debug!(topic = %topic, error = %e, "MQTT unsubscribe failed");
            }
        }

        Ok(ReadResult::Mqtt(samples))
    }

    async fn disconnect(&self, handle: Arc<dyn LiveHandle>) {
        let Some(handle) = handle.downcast_ref::<MqttHandle>() else {
            return;
        };
        if let Err(e) = handle.client.disconnect().await {
            debug!(client_id = %handle.client_id, error = %e, "MQTT disconnect failed");
        }
        handle.event_task.abort();
        debug!(client_id = %handle.client_id, "MQTT broker link closed");
    }
}
