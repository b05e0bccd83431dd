use crate::ack::{AckLabel, Acknowledgement};
use crate::command::{Command, DEFAULT_ACK_TIMEOUT, WaitPolicy};
use crate::core::{CorrelationId, GatewayError, Result};
use crate::registry::CorrelationRegistry;
use crate::session::runner;
use crate::session::{AggregationSession, SessionHandle};
use crate::synthesis::GatewayResponse;
use async_trait::async_trait;
use http::StatusCode;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Destination of a command's single final result
///
/// The engine calls `deliver` exactly once per dispatched command.
#[async_trait]
pub trait ResponseSink: Send {
    async fn deliver(&mut self, response: GatewayResponse);
}

struct OneshotSink(Option<oneshot::Sender<GatewayResponse>>);

#[async_trait]
impl ResponseSink for OneshotSink {
    async fn deliver(&mut self, response: GatewayResponse) {
        if let Some(tx) = self.0.take() {
            // a dropped receiver means the caller went away; nothing to do
            let _ = tx.send(response);
        }
    }
}

/// Build a sink backed by a oneshot channel
///
/// The receiver resolves with the command's final result.
pub fn oneshot_sink() -> (Box<dyn ResponseSink>, oneshot::Receiver<GatewayResponse>) {
    let (tx, rx) = oneshot::channel();
    (Box::new(OneshotSink(Some(tx))), rx)
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for acknowledgement collection, unless the command
    /// overrides it
    pub ack_timeout: Duration,

    /// Capacity of each session's arrival mailbox
    pub mailbox_capacity: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            mailbox_capacity: 16,
        }
    }

    /// Set the default acknowledgement timeout
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the per-session mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "ack_timeout must be > 0".to_string(),
            ));
        }

        if self.mailbox_capacity == 0 {
            return Err(GatewayError::InvalidConfig(
                "mailbox_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Acknowledgement aggregation engine
///
/// The dispatch boundary: takes one command plus a sink, decides via the
/// wait-policy whether to answer immediately or open an aggregation
/// session, and accepts the arrivals producers deliver for in-flight
/// correlation ids. Every dispatched command eventually gets exactly one
/// result on its sink, even across timeouts and shutdown.
pub struct AckEngine {
    registry: Arc<CorrelationRegistry>,
    config: EngineConfig,
}

impl AckEngine {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(CorrelationRegistry::new()),
            config: EngineConfig::new(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(CorrelationRegistry::new()),
            config,
        })
    }

    /// The engine's correlation registry (shared with session tasks)
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Number of in-flight sessions
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Dispatch a command
    ///
    /// Fire-and-forget commands are answered on the sink before this
    /// returns, without creating a session. Waiting commands register a
    /// session under the command's correlation id and spawn its runner;
    /// the sink resolves once all expected labels arrived or the
    /// deadline fired.
    ///
    /// A duplicate correlation id is a protocol violation and returned
    /// as an error to the dispatching caller; the sink of the earlier
    /// command is unaffected.
    pub async fn dispatch(&self, command: Command, mut sink: Box<dyn ResponseSink>) -> Result<()> {
        match command.headers().normalize() {
            WaitPolicy::RespondImmediately => {
                debug!(
                    "Command '{}' does not require a response; accepting immediately",
                    command.correlation_id()
                );
                sink.deliver(GatewayResponse::accepted()).await;
                Ok(())
            }
            WaitPolicy::WaitFor(expected) => {
                let correlation_id = command.correlation_id().clone();
                let channel = command.headers().channel;
                let deadline = command
                    .headers()
                    .ack_timeout
                    .unwrap_or(self.config.ack_timeout);

                debug!(
                    "Opening aggregation session '{}' waiting on {:?} (deadline {:?})",
                    correlation_id, expected, deadline
                );

                let session = AggregationSession::new(correlation_id.clone(), channel, expected);
                let (tx, rx) = mpsc::channel(self.config.mailbox_capacity);
                let handle = SessionHandle::new(tx, AckLabel::implicit_for(channel));

                self.registry.register(correlation_id, handle)?;
                // detached by design; the task unregisters itself on
                // finalization
                let _task = runner::spawn(session, rx, deadline, Arc::clone(&self.registry), sink);
                Ok(())
            }
        }
    }

    /// Dispatch a command and get a receiver for its final result
    pub async fn submit(&self, command: Command) -> Result<oneshot::Receiver<GatewayResponse>> {
        let (sink, rx) = oneshot_sink();
        self.dispatch(command, sink).await?;
        Ok(rx)
    }

    /// Deliver the command's own execution result (implicit
    /// acknowledgement)
    ///
    /// The label is derived from the session's channel; the producer
    /// only knows the correlation id. Unknown correlation ids and
    /// already-finalized sessions are logged and dropped.
    pub async fn deliver_response(
        &self,
        correlation_id: &CorrelationId,
        status: StatusCode,
        headers: BTreeMap<String, String>,
        payload: Option<Value>,
    ) {
        let Some(handle) = self.registry.lookup(correlation_id) else {
            debug!(
                "Dropping execution result for unknown correlation id '{}'",
                correlation_id
            );
            return;
        };

        let mut ack = Acknowledgement::new(handle.implicit_label().clone(), status);
        for (name, value) in headers {
            ack = ack.with_header(name, value);
        }
        if let Some(payload) = payload {
            ack = ack.with_payload(payload);
        }

        self.forward(correlation_id, handle, ack).await;
    }

    /// Deliver an explicit acknowledgement from a downstream producer
    ///
    /// Unknown correlation ids and already-finalized sessions are logged
    /// and dropped; neither is an error the producer could act on.
    pub async fn deliver_ack(&self, correlation_id: &CorrelationId, ack: Acknowledgement) {
        let Some(handle) = self.registry.lookup(correlation_id) else {
            debug!(
                "Dropping acknowledgement '{}' for unknown correlation id '{}'",
                ack.label(),
                correlation_id
            );
            return;
        };

        self.forward(correlation_id, handle, ack).await;
    }

    async fn forward(&self, correlation_id: &CorrelationId, handle: SessionHandle, ack: Acknowledgement) {
        if handle.deliver(ack).await.is_err() {
            debug!(
                "Session '{}' finalized before the arrival could be recorded; dropping",
                correlation_id
            );
        }
    }

    /// Shut the engine down
    ///
    /// Every open session is told to finalize as timed out, so every
    /// outstanding caller still receives a result instead of being
    /// silently dropped.
    pub async fn shutdown(&self) {
        let sessions = self.registry.drain();
        if sessions.is_empty() {
            return;
        }

        info!("Shutting down with {} open sessions", sessions.len());
        futures::future::join_all(
            sessions
                .iter()
                .map(|(_, handle)| handle.shutdown()),
        )
        .await;
    }
}

impl Default for AckEngine {
    fn default() -> Self {
        Self::new()
    }
}
