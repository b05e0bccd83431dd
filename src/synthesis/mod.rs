use crate::ack::AckLabel;
use crate::session::AggregationSession;
use http::StatusCode;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Aggregate status when every received entry is a success code
///
/// Only the failure side (424) of the aggregate status is pinned by the
/// original gateway contract; 200 is the documented symmetric choice.
pub const ALL_SUCCEEDED: StatusCode = StatusCode::OK;

/// Aggregate status when at least one received entry is not a success
/// code, including synthesized timeout failures
pub const DEPENDENCY_FAILED: StatusCode = StatusCode::FAILED_DEPENDENCY;

/// The one externally-visible result of a command
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    payload: Option<Value>,
}

impl GatewayResponse {
    /// Fixed fire-and-forget result: 202 Accepted, no body
    pub fn accepted() -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            headers: BTreeMap::new(),
            payload: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// Produce the externally-visible result of a terminal session
///
/// Rules, in order:
/// 1. The expected set is exactly the channel's implicit label: pass
///    the single acknowledgement through verbatim (status, headers,
///    payload), preserving natural HTTP semantics such as 204 for a
///    plain update or 201 plus `location` for a creation.
/// 2. Otherwise: aggregate body mapping each label (in label order) to
///    `{"status", "headers", "payload"?}`, with status
///    [`ALL_SUCCEEDED`] or [`DEPENDENCY_FAILED`].
///
/// The fire-and-forget path never reaches this function; it is answered
/// with [`GatewayResponse::accepted`] before any session exists.
pub fn synthesize(session: &AggregationSession) -> GatewayResponse {
    debug_assert!(session.is_terminal());

    let implicit = AckLabel::implicit_for(session.channel());
    if session.expected().len() == 1 && session.expected().contains(&implicit) {
        // received is fully populated in both terminal states, so the
        // single entry is always present
        let ack = &session.received()[&implicit];
        return GatewayResponse {
            status: ack.status(),
            headers: ack.headers().clone(),
            payload: ack.payload().cloned(),
        };
    }

    let mut body = Map::new();
    let mut all_succeeded = true;
    for (label, ack) in session.received() {
        all_succeeded &= ack.is_success();

        let mut entry = Map::new();
        entry.insert("status".to_string(), json!(ack.status().as_u16()));
        entry.insert("headers".to_string(), json!(ack.headers()));
        if let Some(payload) = ack.payload() {
            entry.insert("payload".to_string(), payload.clone());
        }
        body.insert(label.to_string(), Value::Object(entry));
    }

    GatewayResponse {
        status: if all_succeeded {
            ALL_SUCCEEDED
        } else {
            DEPENDENCY_FAILED
        },
        headers: BTreeMap::new(),
        payload: Some(Value::Object(body)),
    }
}
