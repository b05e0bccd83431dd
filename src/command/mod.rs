pub mod headers;

pub use headers::{CommandHeaders, DEFAULT_ACK_TIMEOUT, WaitPolicy};

use crate::core::CorrelationId;
use serde_json::Value;

/// An inbound command, immutable once dispatched
///
/// Carries the correlation id every acknowledgement must echo, the
/// declared headers and an optional JSON payload. The engine never
/// looks at the payload; it travels to the executing collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    correlation_id: CorrelationId,
    headers: CommandHeaders,
    payload: Option<Value>,
}

impl Command {
    /// Create a command with a freshly generated correlation id
    pub fn new(headers: CommandHeaders) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            headers,
            payload: None,
        }
    }

    /// Use the correlation id supplied by the inbound transport
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn headers(&self) -> &CommandHeaders {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}
