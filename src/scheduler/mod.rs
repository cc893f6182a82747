pub mod jitter;
pub mod signals;
pub mod worker;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub use signals::{Reload, ReloadSignal, ReloadSignals, ReloadSource};
pub use worker::{Worker, PLACEHOLDER};

/// One emission of a cell: the text to show, plus the error that produced it
/// (if any).
#[derive(Debug)]
pub struct Update {
    pub index: usize,
    pub full_text: String,
    pub error: Option<anyhow::Error>,
}

impl Update {
    pub fn new(index: usize, full_text: impl Into<String>) -> Self {
        Self {
            index,
            full_text: full_text.into(),
            error: None,
        }
    }

    pub fn failed(index: usize, error: anyhow::Error) -> Self {
        Self {
            index,
            full_text: String::new(),
            error: Some(error),
        }
    }
}

/// Fans the updates of every cell worker into one ordered stream.
///
/// The channel holds one slot per cell so a burst where every cell finishes
/// at once never blocks a worker on its first send. The stream closes once
/// every worker has exited.
pub struct Scheduler {
    tx: mpsc::Sender<Update>,
    rx: mpsc::Receiver<Update>,
    workers: JoinSet<()>,
}

impl Scheduler {
    pub fn bootstrap(size: usize) -> Self {
        let (tx, rx) = mpsc::channel(size.max(1));
        Self {
            tx,
            rx,
            workers: JoinSet::new(),
        }
    }

    /// Start the update loop of one cell.
    pub fn spawn(&mut self, worker: Worker) {
        tracing::trace!(cell = worker.index(), "spawning worker");
        self.workers.spawn(worker.run(self.tx.clone()));
    }

    /// Hand out the update stream. A supervisor task waits for every worker
    /// and then drops the last sender, which closes the stream.
    pub fn into_updates(self) -> mpsc::Receiver<Update> {
        let Scheduler {
            tx,
            rx,
            mut workers,
        } = self;

        tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("cell worker aborted: {}", e);
                }
            }
            drop(tx);
            tracing::debug!("all cell workers stopped, closing update stream");
        });

        rx
    }
}
