use crate::ack::AckLabel;
use crate::core::Channel;
use std::collections::BTreeSet;
use std::time::Duration;

/// How long the engine waits for acknowledgements before synthesizing
/// timeout failures, unless the command overrides it.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Declared headers of an inbound command
///
/// Similar to transport headers on an HTTP or broker message: the
/// channel tag, the response-required flag and the set of requested
/// acknowledgement labels, plus an optional per-command timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHeaders {
    /// Channel the command is addressed to
    pub channel: Channel,

    /// Whether the caller wants a response at all; `false` means
    /// fire-and-forget
    pub response_required: bool,

    /// Acknowledgement labels the caller declared
    pub requested_acks: BTreeSet<AckLabel>,

    /// Per-command override of the acknowledgement deadline
    pub ack_timeout: Option<Duration>,
}

/// What the engine does for a command: answer right away or collect
/// the expected labels first
///
/// Derived from the headers at dispatch time, never stored, and never
/// recomputed from arrival headers (a producer downgrading
/// response-required on its reply must not change the policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Reply 202 immediately, await nothing
    RespondImmediately,

    /// Hold the caller until every label arrived or the deadline fires
    WaitFor(BTreeSet<AckLabel>),
}

impl CommandHeaders {
    /// Create headers for a channel with response required and no
    /// requested acknowledgements
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            response_required: true,
            requested_acks: BTreeSet::new(),
            ack_timeout: None,
        }
    }

    /// Set the response-required flag
    pub fn response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    /// Request one acknowledgement label
    pub fn request_ack(mut self, label: AckLabel) -> Self {
        self.requested_acks.insert(label);
        self
    }

    /// Request several acknowledgement labels at once
    pub fn request_acks(mut self, labels: impl IntoIterator<Item = AckLabel>) -> Self {
        self.requested_acks.extend(labels);
        self
    }

    /// Override the acknowledgement deadline for this command
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// The label implicitly satisfied by the command's own execution result
    pub fn implicit_label(&self) -> AckLabel {
        AckLabel::implicit_for(self.channel)
    }

    /// Derive the effective wait-policy and expected label set
    ///
    /// Rules, in order:
    /// 1. response-required = false: respond immediately; the declared
    ///    set is left untouched for downstream producers but never
    ///    awaited here.
    /// 2. otherwise the channel's implicit label is unioned into the
    ///    declared set and every label in the union is awaited.
    ///
    /// Total over valid headers; no error conditions.
    pub fn normalize(&self) -> WaitPolicy {
        if !self.response_required {
            return WaitPolicy::RespondImmediately;
        }

        let mut expected = self.requested_acks.clone();
        expected.insert(self.implicit_label());
        WaitPolicy::WaitFor(expected)
    }
}
