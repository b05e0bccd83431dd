pub mod runner;

pub use runner::{SessionHandle, SessionSignal};

use crate::ack::{AckLabel, Acknowledgement};
use crate::core::{Channel, CorrelationId};
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Session lifecycle
///
/// `Complete` and `TimedOut` are terminal; a session reaches exactly one
/// of them, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting on at least one expected label
    Open,
    /// Every expected label was received before the deadline
    Complete,
    /// The deadline fired first; missing labels were synthesized as
    /// timeout failures
    TimedOut,
}

/// What `record` did with an arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored; more labels outstanding
    Recorded,
    /// Stored and the expected set is now satisfied
    Completed,
    /// Label outside the expected set; dropped
    DroppedUnexpectedLabel,
    /// Session already finalized; dropped
    DroppedTerminal,
}

/// Per-command aggregation state machine
///
/// Owns the frozen expected-label set and the keyed received map.
/// Purely synchronous; the async runner task in [`runner`] owns the
/// deadline timer and serializes all mutation.
#[derive(Debug)]
pub struct AggregationSession {
    correlation_id: CorrelationId,
    channel: Channel,
    expected: BTreeSet<AckLabel>,
    received: BTreeMap<AckLabel, Acknowledgement>,
    state: SessionState,
    opened_at: DateTime<Utc>,
}

impl AggregationSession {
    /// Open a session waiting on `expected`
    ///
    /// The set comes from [`CommandHeaders::normalize`] and is never
    /// empty: a waiting policy always contains at least the channel's
    /// implicit label.
    ///
    /// [`CommandHeaders::normalize`]: crate::command::CommandHeaders::normalize
    pub fn new(
        correlation_id: CorrelationId,
        channel: Channel,
        expected: BTreeSet<AckLabel>,
    ) -> Self {
        debug_assert!(!expected.is_empty());
        Self {
            correlation_id,
            channel,
            expected,
            received: BTreeMap::new(),
            state: SessionState::Open,
            opened_at: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != SessionState::Open
    }

    pub fn expected(&self) -> &BTreeSet<AckLabel> {
        &self.expected
    }

    pub fn received(&self) -> &BTreeMap<AckLabel, Acknowledgement> {
        &self.received
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Record one arrival
    ///
    /// Stores (or overwrites, last-write-wins) the entry for the
    /// arrival's label and re-checks completeness. Arrivals for labels
    /// outside the expected set, or after the session terminated, are
    /// dropped with a diagnostic; neither is an error to the caller.
    pub fn record(&mut self, ack: Acknowledgement) -> RecordOutcome {
        if self.is_terminal() {
            debug!(
                "Dropping late acknowledgement '{}' for finalized session '{}'",
                ack.label(),
                self.correlation_id
            );
            return RecordOutcome::DroppedTerminal;
        }

        if !self.expected.contains(ack.label()) {
            debug!(
                "Dropping acknowledgement '{}' outside the expected set of session '{}'",
                ack.label(),
                self.correlation_id
            );
            return RecordOutcome::DroppedUnexpectedLabel;
        }

        if let Some(previous) = self.received.insert(ack.label().clone(), ack) {
            debug!(
                "Overwriting acknowledgement '{}' of session '{}' (previous status {})",
                previous.label(),
                self.correlation_id,
                previous.status()
            );
        }

        if self.received.len() == self.expected.len() {
            self.state = SessionState::Complete;
            RecordOutcome::Completed
        } else {
            RecordOutcome::Recorded
        }
    }

    /// Transition to `TimedOut`
    ///
    /// Synthesizes a 408 failure entry for every expected label not yet
    /// received, so the aggregate can still be produced. No-op if the
    /// session already terminated.
    pub fn time_out(&mut self) {
        if self.is_terminal() {
            return;
        }

        for label in &self.expected {
            if !self.received.contains_key(label) {
                self.received
                    .insert(label.clone(), Acknowledgement::timed_out(label.clone()));
            }
        }
        self.state = SessionState::TimedOut;

        debug!(
            "Session '{}' timed out after {}ms waiting on {} of {} labels",
            self.correlation_id,
            (Utc::now() - self.opened_at).num_milliseconds(),
            self.received
                .values()
                .filter(|ack| ack.status() == http::StatusCode::REQUEST_TIMEOUT)
                .count(),
            self.expected.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn open_session(labels: &[&str]) -> AggregationSession {
        let expected = labels.iter().map(|label| AckLabel::new(*label)).collect();
        AggregationSession::new(CorrelationId::new("session-1"), Channel::Twin, expected)
    }

    #[test]
    fn test_single_label_completes_on_first_arrival() {
        let mut session = open_session(&["twin-persisted"]);

        let outcome = session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::NO_CONTENT,
        ));

        assert_eq!(outcome, RecordOutcome::Completed);
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn test_partial_arrival_stays_open() {
        let mut session = open_session(&["twin-persisted", "custom-ack"]);

        let outcome = session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::CREATED,
        ));

        assert_eq!(outcome, RecordOutcome::Recorded);
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_unexpected_label_is_dropped() {
        let mut session = open_session(&["twin-persisted"]);

        let outcome = session.record(Acknowledgement::new(
            AckLabel::new("uninvited"),
            StatusCode::OK,
        ));

        assert_eq!(outcome, RecordOutcome::DroppedUnexpectedLabel);
        assert!(session.received().is_empty());
    }

    #[test]
    fn test_arrival_after_terminal_is_dropped() {
        let mut session = open_session(&["twin-persisted"]);
        session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::NO_CONTENT,
        ));

        let outcome = session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::OK,
        ));

        assert_eq!(outcome, RecordOutcome::DroppedTerminal);
        assert_eq!(
            session.received()[&AckLabel::twin_persisted()].status(),
            StatusCode::NO_CONTENT
        );
    }

    #[test]
    fn test_duplicate_label_last_write_wins() {
        let mut session = open_session(&["twin-persisted", "custom-ack"]);

        session.record(Acknowledgement::new(
            AckLabel::new("custom-ack"),
            StatusCode::OK,
        ));
        session.record(Acknowledgement::new(
            AckLabel::new("custom-ack"),
            StatusCode::FORBIDDEN,
        ));

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            session.received()[&AckLabel::new("custom-ack")].status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_timeout_synthesizes_missing_entries() {
        let mut session = open_session(&["twin-persisted", "custom-ack"]);
        session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::CREATED,
        ));

        session.time_out();

        assert_eq!(session.state(), SessionState::TimedOut);
        assert_eq!(session.received().len(), 2);
        assert_eq!(
            session.received()[&AckLabel::new("custom-ack")].status(),
            StatusCode::REQUEST_TIMEOUT
        );
        // the entry that made it in time is untouched
        assert_eq!(
            session.received()[&AckLabel::twin_persisted()].status(),
            StatusCode::CREATED
        );
    }

    #[test]
    fn test_timeout_after_completion_is_noop() {
        let mut session = open_session(&["twin-persisted"]);
        session.record(Acknowledgement::new(
            AckLabel::twin_persisted(),
            StatusCode::NO_CONTENT,
        ));

        session.time_out();

        assert_eq!(session.state(), SessionState::Complete);
    }
}
