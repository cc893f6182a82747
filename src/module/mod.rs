pub mod command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use command::CommandModule;

/// A bar module produces the text of one block, or fails.
///
/// Implementations may be slow; every call runs on the owning cell's worker
/// task, so a slow module only delays its own cell.
#[async_trait]
pub trait Module: Send + Sync {
    async fn full_text(&self) -> Result<String>;
}

/// Module backed by a plain closure. The closure runs on the blocking pool
/// so it is free to block.
pub struct ModuleFn<F> {
    f: Arc<F>,
}

impl<F> ModuleFn<F>
where
    F: Fn() -> Result<String> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Module for ModuleFn<F>
where
    F: Fn() -> Result<String> + Send + Sync + 'static,
{
    async fn full_text(&self) -> Result<String> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || f())
            .await
            .context("module closure panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_module_fn_returns_text() {
        let module = ModuleFn::new(|| Ok("hello".to_string()));
        assert_eq!(module.full_text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_module_fn_propagates_error() {
        let module = ModuleFn::new(|| anyhow::bail!("sensor offline"));
        let err = module.full_text().await.unwrap_err();
        assert_eq!(err.to_string(), "sensor offline");
    }

    #[tokio::test]
    async fn test_module_fn_panic_becomes_error() {
        let module = ModuleFn::new(|| -> Result<String> { panic!("boom") });
        let err = module.full_text().await.unwrap_err();
        assert!(format!("{:#}", err).contains("module closure panicked"));
    }
}
