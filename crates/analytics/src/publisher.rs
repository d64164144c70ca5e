//! Batching event publisher
//!
//! A shared singleton wrapping the pub/sub bus. Events queue on a channel;
//! a worker task flushes when 10 messages are pending or 1 second has
//! passed, whichever comes first. Shutdown drains the queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::AnalyticsEvent;
use crate::AnalyticsError;

/// Messages per batch before an immediate flush
const MAX_BATCH_MESSAGES: usize = 10;
/// Maximum time a message waits before a flush
const MAX_BATCH_LATENCY: Duration = Duration::from_secs(1);

/// One message as handed to the bus
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub data: serde_json::Value,
    /// Envelope attributes used for routing (`event_type`, `event_id`)
    pub attributes: HashMap<String, String>,
}

/// Pluggable pub/sub bus
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, messages: Vec<WireMessage>) -> Result<(), AnalyticsError>;
}

/// Bus client over HTTP
pub struct HttpEventBus {
    config: HttpEventBusConfig,
    client: reqwest::Client,
}

/// Configuration for the HTTP bus
#[derive(Debug, Clone)]
pub struct HttpEventBusConfig {
    pub endpoint: String,
    pub topic: String,
    pub timeout: Duration,
}

impl Default for HttpEventBusConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8093".to_string(),
            topic: "clauselens-events".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpEventBus {
    pub fn new(config: HttpEventBusConfig) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalyticsError::Publish(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EventBus for HttpEventBus {
    async fn publish(&self, messages: Vec<WireMessage>) -> Result<(), AnalyticsError> {
        let url = format!(
            "{}/v1/topics/{}:publish",
            self.config.endpoint, self.config.topic
        );
        let body = serde_json::json!({
            "messages": messages
                .iter()
                .map(|m| serde_json::json!({
                    "data": m.data,
                    "attributes": m.attributes,
                }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyticsError::Publish(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::Publish(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

/// Bus capturing messages in memory, for tests
#[derive(Default)]
pub struct InMemoryBus {
    pub messages: parking_lot::Mutex<Vec<WireMessage>>,
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, messages: Vec<WireMessage>) -> Result<(), AnalyticsError> {
        self.messages.lock().extend(messages);
        Ok(())
    }
}

/// Batching publisher over an `EventBus`
pub struct AnalyticsPublisher {
    sender: parking_lot::RwLock<Option<mpsc::Sender<WireMessage>>>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        let (sender, receiver) = mpsc::channel::<WireMessage>(1024);
        let worker = tokio::spawn(batch_worker(bus, receiver));
        Self {
            sender: parking_lot::RwLock::new(Some(sender)),
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    /// Queue an event for publication. Failures are logged and swallowed so
    /// no caller ever fails because analytics did.
    pub fn publish_event(&self, event: &AnalyticsEvent) {
        let wire = match event.to_wire() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize analytics event");
                return;
            },
        };

        let message = WireMessage {
            data: wire,
            attributes: HashMap::from([
                ("event_type".to_string(), event.event_type.as_str().to_string()),
                ("event_id".to_string(), event.event_id.clone()),
            ]),
        };

        match &*self.sender.read() {
            Some(sender) => {
                if let Err(e) = sender.try_send(message) {
                    tracing::error!(error = %e, "Analytics queue full or closed, dropping event");
                }
            },
            None => tracing::warn!("Analytics publisher already shut down, dropping event"),
        }
    }

    /// Flush pending messages and stop the worker
    pub async fn shutdown(&self) {
        // Dropping the sender closes the channel; the worker drains what is
        // queued, publishes a final batch, and exits.
        drop(self.sender.write().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
            tracing::info!("Analytics publisher shut down");
        }
    }
}

async fn batch_worker(bus: Arc<dyn EventBus>, mut receiver: mpsc::Receiver<WireMessage>) {
    let mut pending: Vec<WireMessage> = Vec::with_capacity(MAX_BATCH_MESSAGES);

    loop {
        let timeout = tokio::time::sleep(MAX_BATCH_LATENCY);
        tokio::pin!(timeout);

        let flush = tokio::select! {
            message = receiver.recv() => match message {
                Some(message) => {
                    pending.push(message);
                    pending.len() >= MAX_BATCH_MESSAGES
                },
                None => {
                    // Channel closed: final flush then exit
                    flush_batch(&bus, &mut pending).await;
                    break;
                },
            },
            _ = &mut timeout => !pending.is_empty(),
        };

        if flush {
            flush_batch(&bus, &mut pending).await;
        }
    }
}

async fn flush_batch(bus: &Arc<dyn EventBus>, pending: &mut Vec<WireMessage>) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    let count = batch.len();
    match bus.publish(batch).await {
        Ok(()) => tracing::debug!(count, "Published analytics batch"),
        Err(e) => tracing::error!(count, error = %e, "Failed to publish analytics batch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_the_bus() {
        let bus = Arc::new(InMemoryBus::default());
        let publisher = AnalyticsPublisher::new(bus.clone());

        let event = AnalyticsEvent::question_asked("what about liability?", 0.8, 1, 50, None);
        publisher.publish_event(&event);

        // The 1 s latency flush picks the message up
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let messages = bus.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].attributes.get("event_type").map(String::as_str),
            Some("question_asked")
        );
        assert_eq!(
            messages[0].attributes.get("event_id"),
            Some(&event.event_id)
        );
    }

    #[tokio::test]
    async fn test_full_batch_flushes_immediately() {
        let bus = Arc::new(InMemoryBus::default());
        let publisher = AnalyticsPublisher::new(bus.clone());

        for i in 0..MAX_BATCH_MESSAGES {
            let event = AnalyticsEvent::question_asked(&format!("q{}", i), 0.5, 0, 10, None);
            publisher.publish_event(&event);
        }

        // Well under the 1 s latency window: the size trigger flushed
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(bus.messages.lock().len(), MAX_BATCH_MESSAGES);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let bus = Arc::new(InMemoryBus::default());
        let publisher = AnalyticsPublisher::new(bus.clone());
        publisher.publish_event(&AnalyticsEvent::question_asked("q", 0.5, 0, 10, None));

        publisher.shutdown().await;
        assert_eq!(bus.messages.lock().len(), 1);
    }

    struct FailingBus;

    #[async_trait]
    impl EventBus for FailingBus {
        async fn publish(&self, _messages: Vec<WireMessage>) -> Result<(), AnalyticsError> {
            Err(AnalyticsError::Publish("bus down".into()))
        }
    }

    #[tokio::test]
    async fn test_bus_failure_never_panics_or_propagates() {
        let publisher = AnalyticsPublisher::new(Arc::new(FailingBus));
        let event = AnalyticsEvent::question_asked("q", 0.5, 0, 10, None);
        publisher.publish_event(&event);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        // Nothing to assert beyond "we got here": failure is swallowed
    }
}
