use super::signals::{Reload, ReloadSource};
use super::Update;
use crate::module::Module;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Text shown while a cell is (re)loading.
pub const PLACEHOLDER: &str = "...";

/// Keeps the first tick strictly behind the jitter timer.
const TICKER_GRACE: Duration = Duration::from_millis(1);

/// Tokio intervals cannot have a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Update loop for a single cell.
///
/// The cell first shows the placeholder, then gets its first real paint once
/// the jitter timer fires. After that it refreshes on every tick of its
/// interval, on a broadcast reload (placeholder, jitter, refresh) and on its
/// own reload signal (refresh immediately).
pub struct Worker {
    index: usize,
    module: Arc<dyn Module>,
    interval: Duration,
    jitter: Duration,
    reload: Option<Box<dyn ReloadSource>>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        index: usize,
        module: Arc<dyn Module>,
        interval: Duration,
        jitter: Duration,
        reload: Option<Box<dyn ReloadSource>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            index,
            module,
            interval: interval.max(MIN_INTERVAL),
            jitter,
            reload,
            shutdown,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Drive the cell until `shutdown` fires or the consumer goes away.
    pub async fn run(self, out: mpsc::Sender<Update>) {
        let Worker {
            index,
            module,
            interval,
            jitter,
            mut reload,
            shutdown,
        } = self;
        let cell = Refresher { index, module, out };

        if cell.placeholder().await.is_err() {
            return;
        }

        let jitter_timer = tokio::time::sleep(jitter);
        tokio::pin!(jitter_timer);
        let mut jitter_pending = true;

        let mut ticker = tokio::time::interval_at(Instant::now() + jitter + TICKER_GRACE, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(cell = index, ?interval, ?jitter, "worker started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = &mut jitter_timer, if jitter_pending => {
                    jitter_pending = false;
                    ticker.reset();
                }

                _ = ticker.tick() => {}

                signal = next_reload(&mut reload) => match signal {
                    Some(Reload::All) => {
                        tracing::debug!(cell = index, "broadcast reload");
                        if cell.placeholder().await.is_err() {
                            break;
                        }
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(jitter) => {}
                        }
                        ticker.reset();
                    }
                    Some(Reload::One) => {
                        tracing::debug!(cell = index, "single reload");
                    }
                    None => {
                        tracing::debug!(cell = index, "reload source closed");
                        reload = None;
                        continue;
                    }
                },
            }

            if cell.refresh().await.is_err() {
                break;
            }
        }

        tracing::debug!(cell = index, "worker stopped");
    }
}

/// Wait for the next reload request, or forever when there is no source.
async fn next_reload(source: &mut Option<Box<dyn ReloadSource>>) -> Option<Reload> {
    match source {
        Some(source) => source.recv().await,
        None => std::future::pending().await,
    }
}

/// The single path through which a worker reports anything.
struct Refresher {
    index: usize,
    module: Arc<dyn Module>,
    out: mpsc::Sender<Update>,
}

impl Refresher {
    async fn refresh(&self) -> Result<(), SendError<Update>> {
        let update = match self.module.full_text().await {
            Ok(full_text) => Update::new(self.index, full_text),
            Err(e) => Update::failed(self.index, e),
        };
        self.out.send(update).await
    }

    async fn placeholder(&self) -> Result<(), SendError<Update>> {
        self.out.send(Update::new(self.index, PLACEHOLDER)).await
    }
}
