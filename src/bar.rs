use crate::module::{Module, ModuleFn};
use crate::protocol::{self, Block, Header};
use crate::scheduler::{jitter, ReloadSignals, Scheduler, Worker};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// A module and how often it refreshes. Its position in the bar is its index.
#[derive(Clone)]
pub struct Cell {
    pub module: Arc<dyn Module>,
    pub interval: Duration,
}

/// A configured status bar, ready to run.
pub struct Bar {
    cells: Vec<Cell>,
    jitter: Duration,
    header: Header,
    signals: ReloadSignals,
}

#[derive(Default)]
pub struct BarBuilder {
    cells: Vec<Cell>,
    jitter: Duration,
    signals: ReloadSignals,
}

impl BarBuilder {
    /// Append a cell. Cells are shown in the order they are added.
    pub fn module(mut self, module: impl Module + 'static, interval: Duration) -> Self {
        self.cells.push(Cell {
            module: Arc::new(module),
            interval,
        });
        self
    }

    /// Append a cell backed by a closure.
    pub fn module_fn<F>(self, f: F, interval: Duration) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        self.module(ModuleFn::new(f), interval)
    }

    pub fn cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }

    /// Upper bound of the random delay used to stagger first paints and
    /// broadcast reloads. Zero disables it.
    pub fn jitter(mut self, max: Duration) -> Self {
        self.jitter = max;
        self
    }

    pub fn reload_signals(mut self, signals: ReloadSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn build(self) -> Bar {
        Bar {
            cells: self.cells,
            jitter: self.jitter,
            header: Header::default(),
            signals: self.signals,
        }
    }
}

impl Bar {
    pub fn builder() -> BarBuilder {
        BarBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Write the protocol to `out` until `shutdown` is cancelled.
    ///
    /// Only a failure to write the header is returned; module failures and
    /// body write failures are logged and the bar keeps going.
    pub async fn run<W>(self, out: &mut W, shutdown: CancellationToken) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        // Bail out before any worker exists if nobody can read us.
        protocol::write_header(out, &self.header)
            .await
            .context("failed to write bar header")?;

        let n = self.cells.len();
        let mut scheduler = Scheduler::bootstrap(n);

        for (index, cell) in self.cells.into_iter().enumerate() {
            let reload = match self.signals.listen(index) {
                Ok(reload) => reload,
                Err(e) => {
                    tracing::warn!(cell = index, "reload signals unavailable: {:#}", e);
                    None
                }
            };
            scheduler.spawn(Worker::new(
                index,
                cell.module,
                cell.interval,
                jitter::sample(self.jitter),
                reload,
                shutdown.clone(),
            ));
        }

        tracing::info!(cells = n, "bar started");

        let mut blocks = vec![Block::default(); n];
        let mut updates = scheduler.into_updates();

        while let Some(update) = updates.recv().await {
            blocks[update.index].full_text = update.full_text;
            if let Some(e) = update.error {
                tracing::warn!(cell = update.index, "module update failed: {:#}", e);
            }
            if let Err(e) = protocol::write_body(out, &blocks).await {
                tracing::error!("{:#}", e);
            }
        }

        tracing::info!("bar stopped");
        Ok(())
    }
}
