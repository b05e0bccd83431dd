use super::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier linking a command to all of its acknowledgements
///
/// Unique per in-flight request. Usually taken from the inbound transport
/// (e.g. a message id); `generate()` creates a fresh one when the caller
/// has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random correlation id (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Channel a command is addressed to
///
/// `Twin` commands target the persisted twin representation, `Live`
/// commands and messages are forwarded to the device itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Twin,
    Live,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twin => "twin",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "twin" => Ok(Self::Twin),
            "live" => Ok(Self::Live),
            other => Err(GatewayError::Internal(format!(
                "Unknown channel tag '{}'",
                other
            ))),
        }
    }
}
