//! Reload triggers for cell workers.
//!
//! SIGUSR1 reloads every cell. Each cell also gets its own real-time signal,
//! `SIGRTMIN+n`, picked from a fixed cyclic range. With more cells than
//! signals in the range, slots wrap and the cells sharing a slot reload
//! together.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Lowest real-time signal used for single-cell reloads.
pub const SIGRT_MIN: i32 = 0x22;
/// Upper bound (exclusive) of the single-cell reload range.
pub const SIGRT_MAX: i32 = 0x40;

/// Signal number that reloads the cell at `index`.
pub fn slot(index: usize) -> i32 {
    let span = (SIGRT_MAX - SIGRT_MIN) as usize;
    SIGRT_MIN + ((index + 1) % span) as i32
}

/// What a worker has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Broadcast reload: show the placeholder, wait out the jitter, refresh.
    All,
    /// Single-cell reload: refresh right away.
    One,
}

/// A raw trigger as it would arrive from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSignal {
    Broadcast,
    Slot(i32),
}

/// Per-worker stream of reload requests. `None` means the source is gone
/// and will never yield again.
#[async_trait]
pub trait ReloadSource: Send {
    async fn recv(&mut self) -> Option<Reload>;
}

/// Where workers get their reload triggers from.
#[derive(Debug, Clone, Default)]
pub enum ReloadSignals {
    /// Real process signals (SIGUSR1 and the per-cell real-time signal).
    #[default]
    Os,
    /// In-process triggers; each worker filters on its own slot.
    Channel(broadcast::Sender<ReloadSignal>),
    /// Cells only refresh on their timers.
    Disabled,
}

impl ReloadSignals {
    /// Subscribe the worker for cell `index`. Returns `Ok(None)` when reloads
    /// are disabled.
    pub fn listen(&self, index: usize) -> Result<Option<Box<dyn ReloadSource>>> {
        match self {
            ReloadSignals::Os => Ok(Some(Box::new(OsSignals::register(index)?))),
            ReloadSignals::Channel(tx) => Ok(Some(Box::new(ChannelSignals {
                rx: tx.subscribe(),
                slot: slot(index),
            }))),
            ReloadSignals::Disabled => Ok(None),
        }
    }
}

#[cfg(unix)]
pub struct OsSignals {
    broadcast: tokio::signal::unix::Signal,
    single: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn register(index: usize) -> Result<Self> {
        use anyhow::Context;
        use tokio::signal::unix::{signal, SignalKind};

        let id = slot(index);
        Ok(Self {
            broadcast: signal(SignalKind::user_defined1())
                .context("failed to listen for SIGUSR1")?,
            single: signal(SignalKind::from_raw(id))
                .with_context(|| format!("failed to listen for signal {}", id))?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl ReloadSource for OsSignals {
    async fn recv(&mut self) -> Option<Reload> {
        tokio::select! {
            r = self.broadcast.recv() => r.map(|()| Reload::All),
            r = self.single.recv() => r.map(|()| Reload::One),
        }
    }
}

#[cfg(not(unix))]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    fn register(_index: usize) -> Result<Self> {
        anyhow::bail!("reload signals are only supported on unix")
    }
}

#[cfg(not(unix))]
#[async_trait]
impl ReloadSource for OsSignals {
    async fn recv(&mut self) -> Option<Reload> {
        None
    }
}

/// Channel-backed source, mirroring the OS semantics including slot
/// aliasing.
pub struct ChannelSignals {
    rx: broadcast::Receiver<ReloadSignal>,
    slot: i32,
}

#[async_trait]
impl ReloadSource for ChannelSignals {
    async fn recv(&mut self) -> Option<Reload> {
        loop {
            match self.rx.recv().await {
                Ok(ReloadSignal::Broadcast) => return Some(Reload::All),
                Ok(ReloadSignal::Slot(id)) if id == self.slot => return Some(Reload::One),
                Ok(ReloadSignal::Slot(_)) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "reload triggers dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cells_get_consecutive_slots() {
        assert_eq!(slot(0), SIGRT_MIN + 1);
        assert_eq!(slot(1), SIGRT_MIN + 2);
        assert_eq!(slot(28), SIGRT_MAX - 1);
    }

    #[test]
    fn test_slot_wraps_around_signal_space() {
        let span = (SIGRT_MAX - SIGRT_MIN) as usize;
        assert_eq!(span, 30);
        // Index 29 wraps to the bottom of the range, one below index 0.
        assert_eq!(slot(29), SIGRT_MIN);
        assert_eq!(slot(29), slot(0) - 1);
        // A full cycle later, cells share slots.
        assert_eq!(slot(30), slot(0));
        assert_eq!(slot(31 + 2 * span), slot(1));
    }

    #[test]
    fn test_slots_stay_in_range() {
        for i in 0..200 {
            let s = slot(i);
            assert!((SIGRT_MIN..SIGRT_MAX).contains(&s), "slot {} out of range", s);
        }
    }

    #[test]
    fn test_disabled_has_no_source() {
        assert!(ReloadSignals::Disabled.listen(0).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_source_filters_on_slot() {
        let (tx, _) = broadcast::channel(8);
        let signals = ReloadSignals::Channel(tx.clone());
        let mut first = signals.listen(0).unwrap().unwrap();
        let mut second = signals.listen(1).unwrap().unwrap();

        tx.send(ReloadSignal::Slot(slot(1))).unwrap();
        tx.send(ReloadSignal::Broadcast).unwrap();

        assert_eq!(first.recv().await, Some(Reload::All));
        assert_eq!(second.recv().await, Some(Reload::One));
        assert_eq!(second.recv().await, Some(Reload::All));
    }

    #[tokio::test]
    async fn test_aliased_cells_reload_together() {
        let (tx, _) = broadcast::channel(8);
        let signals = ReloadSignals::Channel(tx.clone());
        let mut a = signals.listen(2).unwrap().unwrap();
        let mut b = signals.listen(32).unwrap().unwrap();

        tx.send(ReloadSignal::Slot(slot(2))).unwrap();

        assert_eq!(a.recv().await, Some(Reload::One));
        assert_eq!(b.recv().await, Some(Reload::One));
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_dropped() {
        let (tx, _) = broadcast::channel(8);
        let mut source = ReloadSignals::Channel(tx.clone()).listen(0).unwrap().unwrap();
        drop(tx);
        assert_eq!(source.recv().await, None);
    }
}
