//! Session events and detached best-effort tasks.

use std::future::Future;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{BackendError, session::Stage, voucher::Voucher};

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StageChanged { from: Stage, to: Stage },
    /// Emitted once, when the wheel has visually stopped.
    Revealed(Voucher),
    /// A best-effort call failed. Never affects the flow.
    BestEffortFailed {
        operation: &'static str,
        message: String,
    },
}

/// Run `call` as a detached task. Failures are logged and reported on
/// `events`. The flow never awaits the result; the handle only lets a caller
/// wait for it before shutting down.
pub(crate) fn detach<F>(
    operation: &'static str,
    events: Option<UnboundedSender<SessionEvent>>,
    call: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<(), BackendError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = call.await {
            tracing::warn!("{operation} failed: {err}");
            if let Some(events) = events {
                let _ = events.send(SessionEvent::BestEffortFailed {
                    operation,
                    message: err.to_string(),
                });
            }
        }
    })
}
