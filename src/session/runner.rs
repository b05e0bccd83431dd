use super::{AggregationSession, RecordOutcome};
use crate::ack::{AckLabel, Acknowledgement};
use crate::core::{GatewayError, Result};
use crate::dispatch::ResponseSink;
use crate::registry::CorrelationRegistry;
use crate::synthesis::synthesize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{Level, event};

/// Message into a session's mailbox
#[derive(Debug)]
pub enum SessionSignal {
    /// An acknowledgement arrival (implicit or explicit)
    Ack(Acknowledgement),
    /// Engine shutdown: finalize now as timed out
    Shutdown,
}

/// Clone-able sender side of a session's mailbox
///
/// Stored in the [`CorrelationRegistry`]; the runner task owns the
/// receiving side and with it all session mutation.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionSignal>,
    implicit_label: AckLabel,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionSignal>, implicit_label: AckLabel) -> Self {
        Self { tx, implicit_label }
    }

    /// Label the session's command result satisfies (channel-dependent)
    pub fn implicit_label(&self) -> &AckLabel {
        &self.implicit_label
    }

    /// Forward an acknowledgement to the session task
    ///
    /// Fails with `SessionClosed` when the runner already finalized and
    /// dropped its mailbox; the caller logs and drops in that case.
    pub async fn deliver(&self, ack: Acknowledgement) -> Result<()> {
        self.tx
            .send(SessionSignal::Ack(ack))
            .await
            .map_err(|err| match err.0 {
                SessionSignal::Ack(ack) => GatewayError::SessionClosed(ack.label().to_string()),
                SessionSignal::Shutdown => GatewayError::SessionClosed("shutdown".to_string()),
            })
    }

    /// Ask the session task to finalize as timed out
    pub async fn shutdown(&self) {
        // a closed mailbox means the session already finalized, which is
        // exactly what shutdown wants
        let _ = self.tx.send(SessionSignal::Shutdown).await;
    }
}

/// Spawn the task owning one session
///
/// The task serializes all mutation of the session: arrivals and
/// shutdown come through the mailbox, the deadline is raced in the same
/// `select!`, so `record` and the timeout can never finalize twice.
/// On finalization the session is removed from the registry, the result
/// is synthesized and delivered to the sink exactly once, and the timer
/// is dropped with the task.
pub(crate) fn spawn(
    mut session: AggregationSession,
    mut rx: mpsc::Receiver<SessionSignal>,
    deadline: Duration,
    registry: Arc<CorrelationRegistry>,
    mut sink: Box<dyn ResponseSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timer = sleep(deadline);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                signal = rx.recv() => match signal {
                    Some(SessionSignal::Ack(ack)) => {
                        if session.record(ack) == RecordOutcome::Completed {
                            break;
                        }
                    }
                    // all senders gone (engine dropped) behaves like shutdown
                    Some(SessionSignal::Shutdown) | None => {
                        session.time_out();
                        break;
                    }
                },
                _ = &mut timer => {
                    session.time_out();
                    break;
                }
            }
        }

        registry.remove(session.correlation_id());
        let response = synthesize(&session);
        event!(
            Level::DEBUG,
            correlation_id = %session.correlation_id(),
            state = ?session.state(),
            status = response.status().as_u16(),
            "session finalized"
        );
        sink.deliver(response).await;
    })
}
