//! Status command for swaybar / i3bar.
//!
//! Every configured cell refreshes on its own interval in its own task. The
//! results fan into a single writer that streams the bar protocol.

pub mod bar;
pub mod config;
pub mod module;
pub mod protocol;
pub mod scheduler;

pub use bar::{Bar, BarBuilder, Cell};
pub use module::{CommandModule, Module, ModuleFn};
pub use scheduler::{ReloadSignal, ReloadSignals};
