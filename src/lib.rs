// ============================================================================
// Twinbridge Library
// ============================================================================

pub mod core;
pub mod ack;
pub mod command;
pub mod registry;
pub mod session;
pub mod synthesis;
pub mod dispatch;

// Re-export main types for convenience
pub use crate::core::{Channel, CorrelationId, GatewayError, Result};
pub use ack::{Acknowledgement, AckLabel};
pub use command::{Command, CommandHeaders, WaitPolicy};
pub use dispatch::{AckEngine, EngineConfig, ResponseSink, oneshot_sink};
pub use registry::CorrelationRegistry;
pub use session::{AggregationSession, SessionState};
pub use synthesis::{GatewayResponse, synthesize};

// ============================================================================
// High-level Gateway API
// ============================================================================

use http::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;

/// Gateway front door over the acknowledgement aggregation engine
///
/// This is the recommended way to embed twinbridge in an application:
/// dispatch a command, let collaborators deliver results and
/// acknowledgements for its correlation id, and await the single
/// synthesized response.
///
/// # Examples
///
/// ```
/// use twinbridge::{Channel, Command, CommandHeaders, Gateway};
///
/// # tokio_test::block_on(async {
/// let gateway = Gateway::new();
///
/// // fire-and-forget: accepted immediately, nothing awaited
/// let headers = CommandHeaders::new(Channel::Live).response_required(false);
/// let response = gateway.send(Command::new(headers)).await.unwrap();
/// assert_eq!(response.status().as_u16(), 202);
/// # });
/// ```
pub struct Gateway {
    engine: AckEngine,
}

impl Gateway {
    /// Create a gateway with default configuration
    pub fn new() -> Self {
        Self {
            engine: AckEngine::new(),
        }
    }

    /// Create a gateway with custom configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use twinbridge::{EngineConfig, Gateway};
    ///
    /// let config = EngineConfig::new()
    ///     .ack_timeout(Duration::from_secs(5))
    ///     .mailbox_capacity(32);
    ///
    /// let gateway = Gateway::with_config(config).unwrap();
    /// ```
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            engine: AckEngine::with_config(config)?,
        })
    }

    /// Dispatch a command and await its single final response
    ///
    /// For waiting commands this resolves once every expected
    /// acknowledgement arrived or the deadline fired; deliver arrivals
    /// from another task.
    pub async fn send(&self, command: Command) -> Result<GatewayResponse> {
        let rx = self.engine.submit(command).await?;
        rx.await
            .map_err(|err| GatewayError::Internal(format!("response channel closed: {}", err)))
    }

    /// Dispatch a command toward a caller-provided sink
    pub async fn dispatch(&self, command: Command, sink: Box<dyn ResponseSink>) -> Result<()> {
        self.engine.dispatch(command, sink).await
    }

    /// Dispatch a command, returning a receiver for its final response
    pub async fn submit(
        &self,
        command: Command,
    ) -> Result<tokio::sync::oneshot::Receiver<GatewayResponse>> {
        self.engine.submit(command).await
    }

    /// Deliver the command's own execution result
    pub async fn deliver_response(
        &self,
        correlation_id: &CorrelationId,
        status: StatusCode,
        headers: BTreeMap<String, String>,
        payload: Option<Value>,
    ) {
        self.engine
            .deliver_response(correlation_id, status, headers, payload)
            .await;
    }

    /// Deliver an explicit acknowledgement from a downstream producer
    pub async fn deliver_ack(&self, correlation_id: &CorrelationId, ack: Acknowledgement) {
        self.engine.deliver_ack(correlation_id, ack).await;
    }

    /// Number of in-flight sessions
    pub fn in_flight(&self) -> usize {
        self.engine.in_flight()
    }

    /// Finalize every open session as timed out and answer its caller
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
