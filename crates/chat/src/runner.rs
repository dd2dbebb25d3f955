use std::collections::HashMap;
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use faqbot_core::ConversationId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{ChatEnvelope, ChatEvent, EventContext, EventDispatcher};

const DEFAULT_LANE_CAPACITY: usize = 64;
const DEFAULT_LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of chat envelopes. `next_envelope` returns `None` once the stream
/// has closed.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopEventTransport;

#[async_trait]
impl EventTransport for NoopEventTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps envelopes from a transport into per-conversation lanes. Each lane is
/// a task that handles its events one at a time in arrival order; different
/// conversations run concurrently. A lane with nothing to do for the idle
/// timeout exits and is reopened by the next event of its conversation.
pub struct EventStreamRunner {
    transport: Arc<dyn EventTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    lane_capacity: usize,
    lane_idle_timeout: Duration,
}

impl EventStreamRunner {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher: Arc::new(dispatcher),
            reconnect_policy,
            lane_capacity: DEFAULT_LANE_CAPACITY,
            lane_idle_timeout: DEFAULT_LANE_IDLE_TIMEOUT,
        }
    }

    pub fn with_lane_capacity(mut self, lane_capacity: usize) -> Self {
        self.lane_capacity = lane_capacity.max(1);
        self
    }

    pub fn with_lane_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.lane_idle_timeout = idle_timeout;
        self
    }

    /// Runs until the stream closes or reconnects are exhausted, then waits
    /// for every lane to finish its queued events.
    pub async fn start(&self) -> Result<()> {
        let mut lanes =
            Lanes::new(self.dispatcher.clone(), self.lane_capacity, self.lane_idle_timeout);

        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt, &mut lanes).await {
                Ok(()) => break,
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "event transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "event transport retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        lanes.drain().await;
        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        lanes: &mut Lanes,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening event transport connection");
        self.transport.connect().await?;
        info!(attempt, "event transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "event stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (conversation_id, form_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.chat.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                conversation_id = conversation_id.unwrap_or("unknown"),
                form_id = form_id.unwrap_or("none"),
                "received chat envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.chat.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge chat envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.chat.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged chat envelope"
                );
            }

            lanes.route(envelope).await;
        }
    }
}

struct Lane {
    sender: mpsc::Sender<ChatEnvelope>,
    worker: JoinHandle<()>,
}

struct Lanes {
    dispatcher: Arc<EventDispatcher>,
    capacity: usize,
    idle_timeout: Duration,
    lanes: HashMap<ConversationId, Lane>,
}

impl Lanes {
    fn new(dispatcher: Arc<EventDispatcher>, capacity: usize, idle_timeout: Duration) -> Self {
        Self { dispatcher, capacity, idle_timeout, lanes: HashMap::new() }
    }

    async fn route(&mut self, envelope: ChatEnvelope) {
        let Some(conversation_id) = envelope.event.conversation_id().cloned() else {
            dispatch_envelope(&self.dispatcher, &envelope).await;
            return;
        };

        // A send fails once the lane went idle and closed its queue.
        let envelope = match self.lanes.get(&conversation_id) {
            Some(lane) => match lane.sender.send(envelope).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(envelope)) => envelope,
            },
            None => envelope,
        };

        let previous = self.lanes.remove(&conversation_id).map(|lane| lane.worker);
        self.prune();
        let lane = self.open_lane(&conversation_id, previous);
        if let Err(error) = lane.sender.send(envelope).await {
            warn!(
                conversation_id = %conversation_id,
                envelope_id = %error.0.envelope_id,
                "conversation lane closed; dropping envelope"
            );
        }
        self.lanes.insert(conversation_id, lane);
    }

    /// Forgets lanes whose worker has exited.
    fn prune(&mut self) {
        self.lanes.retain(|_, lane| !lane.worker.is_finished());
    }

    /// Starts a lane worker. It waits for `previous`, the closed lane of the
    /// same conversation, so events keep their arrival order.
    fn open_lane(
        &self,
        conversation_id: &ConversationId,
        previous: Option<JoinHandle<()>>,
    ) -> Lane {
        let (sender, receiver) = mpsc::channel::<ChatEnvelope>(self.capacity);
        debug!(
            conversation_id = %conversation_id,
            open_lanes = self.lanes.len() + 1,
            "opening conversation lane"
        );

        let worker = tokio::spawn(run_lane(
            self.dispatcher.clone(),
            conversation_id.clone(),
            receiver,
            self.idle_timeout,
            previous,
        ));
        Lane { sender, worker }
    }

    async fn drain(self) {
        let workers: Vec<JoinHandle<()>> =
            self.lanes.into_values().map(|lane| lane.worker).collect();
        for worker in workers {
            if let Err(error) = worker.await {
                warn!(error = %error, "conversation lane terminated abnormally");
            }
        }
    }
}

async fn run_lane(
    dispatcher: Arc<EventDispatcher>,
    conversation_id: ConversationId,
    mut receiver: mpsc::Receiver<ChatEnvelope>,
    idle_timeout: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(error) = previous.await {
            warn!(
                conversation_id = %conversation_id,
                error = %error,
                "previous conversation lane terminated abnormally"
            );
        }
    }

    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(envelope)) => dispatch_envelope(&dispatcher, &envelope).await,
            Ok(None) => return,
            Err(_) => break,
        }
    }

    // Envelopes queued before the close still belong to this lane.
    receiver.close();
    while let Some(envelope) = receiver.recv().await {
        dispatch_envelope(&dispatcher, &envelope).await;
    }
    debug!(conversation_id = %conversation_id, "closed idle conversation lane");
}

async fn dispatch_envelope(dispatcher: &EventDispatcher, envelope: &ChatEnvelope) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    if let Err(error) = dispatcher.dispatch(envelope, &context).await {
        let (conversation_id, form_id) = correlation_fields(envelope);
        warn!(
            envelope_id = %envelope.envelope_id,
            correlation_id = %envelope.envelope_id,
            conversation_id = conversation_id.unwrap_or("unknown"),
            form_id = form_id.unwrap_or("none"),
            error = %error,
            "event dispatch failed; continuing event loop"
        );
    }
}

fn correlation_fields(envelope: &ChatEnvelope) -> (Option<&str>, Option<&str>) {
    let conversation_id = envelope.event.conversation_id().map(ConversationId::as_str);
    let form_id = match &envelope.event {
        ChatEvent::FormSubmission(event) => Some(event.form_id.as_str()),
        ChatEvent::ItemAdded(_) | ChatEvent::Unsupported { .. } => None,
    };
    (conversation_id, form_id)
}
