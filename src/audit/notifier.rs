//! Background delivery of audit records

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{AuditRecord, AuditSink};

enum Command {
    Record(Box<AuditRecord>),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle for emitting audit records.
///
/// `notify` never blocks and never fails the caller. Records are written by a
/// single background task in the order they were emitted.
#[derive(Debug, Clone)]
pub struct AuditNotifier {
    tx: Option<mpsc::UnboundedSender<Command>>,
}

impl AuditNotifier {
    /// Start the delivery task. Must be called inside a tokio runtime.
    ///
    /// The task ends once every clone of the returned notifier is dropped.
    pub fn spawn<S: AuditSink>(sink: S) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(sink, rx));
        (Self { tx: Some(tx) }, handle)
    }

    /// A notifier that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a record for delivery. `None` (an empty update) is ignored.
    pub fn notify(&self, record: Option<AuditRecord>) {
        let (Some(tx), Some(record)) = (&self.tx, record) else {
            return;
        };

        if tx.send(Command::Record(Box::new(record))).is_err() {
            tracing::warn!("Audit worker has stopped; dropping audit record");
        }
    }

    /// Wait until every record queued before this call has been handled
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_worker<S: AuditSink>(sink: S, mut rx: mpsc::UnboundedReceiver<Command>) {
    tracing::debug!("Audit worker started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(record) => {
                let model_type = record.model_type.clone();
                let model_id = record.model_id.clone();
                if let Err(e) = sink.record(*record).await {
                    tracing::warn!(
                        error = %e,
                        model_type = %model_type,
                        model_id = %model_id,
                        "Failed to write audit trace"
                    );
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("Audit worker stopped");
}
