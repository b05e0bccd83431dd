pub mod label;

pub use label::{AckLabel, LIVE_RESPONSE, TWIN_PERSISTED};

use http::StatusCode;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// One contribution to a command's aggregate result
///
/// Either the command's own execution result (the implicit
/// acknowledgement, labeled per channel) or an explicit confirmation
/// from a downstream producer matching a requested custom label.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    label: AckLabel,
    status: StatusCode,
    headers: BTreeMap<String, String>,
    payload: Option<Value>,
}

impl Acknowledgement {
    pub fn new(label: AckLabel, status: StatusCode) -> Self {
        Self {
            label,
            status,
            headers: BTreeMap::new(),
            payload: None,
        }
    }

    /// Add a header (e.g. `location` for a created entity)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Failure entry synthesized for a label whose producer never answered
    ///
    /// Carries the fixed 408 status so the aggregate can distinguish it
    /// from any real producer status, plus a small payload naming the
    /// label so multi-label bodies stay self-describing.
    pub fn timed_out(label: AckLabel) -> Self {
        let payload = json!({
            "error": "acknowledgement.request.timeout",
            "message": format!(
                "The acknowledgement '{}' did not arrive before the deadline",
                label
            ),
        });
        Self::new(label, StatusCode::REQUEST_TIMEOUT).with_payload(payload)
    }

    pub fn label(&self) -> &AckLabel {
        &self.label
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
