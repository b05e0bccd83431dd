use crate::core::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the implicit acknowledgement for twin-channel commands
pub const TWIN_PERSISTED: &str = "twin-persisted";

/// Label of the implicit acknowledgement for live-channel commands and messages
pub const LIVE_RESPONSE: &str = "live-response";

/// Named slot a command expects to be filled before it is answered
///
/// Labels are an open set: the two well-known constants above plus
/// arbitrary custom labels declared by downstream producers (e.g. a
/// connectivity adapter relaying a broker-side confirmation). Ordered so
/// aggregate bodies come out in deterministic label order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckLabel(String);

impl AckLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn twin_persisted() -> Self {
        Self(TWIN_PERSISTED.to_string())
    }

    pub fn live_response() -> Self {
        Self(LIVE_RESPONSE.to_string())
    }

    /// The label implicitly satisfied by the command's own execution result
    pub fn implicit_for(channel: Channel) -> Self {
        match channel {
            Channel::Twin => Self::twin_persisted(),
            Channel::Live => Self::live_response(),
        }
    }

    /// Whether this is one of the well-known labels (as opposed to a
    /// custom label owned by a downstream producer)
    pub fn is_well_known(&self) -> bool {
        self.0 == TWIN_PERSISTED || self.0 == LIVE_RESPONSE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AckLabel {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}
