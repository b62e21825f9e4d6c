//! Bridges the async HTTP transport into the synchronous dispatch path.

use std::future::Future;
use std::thread;

use anyhow::{Context, anyhow};
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tokio::task;

/// Runs `future` to completion from synchronous code.
///
/// Inside a multi-threaded runtime the current worker is handed over with
/// `block_in_place`. A current-thread runtime cannot block in place, so the
/// future is driven on a helper thread instead. Outside any runtime a
/// throwaway current-thread runtime is used.
///
/// # Errors
///
/// Returns the future's own error, or an error when no runtime could be
/// started.
pub fn block_on_future<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => task::block_in_place(|| handle.block_on(future)),
        Ok(_) => thread::scope(|scope| {
            scope
                .spawn(|| run_detached(future))
                .join()
                .map_err(|_| anyhow!("async helper thread panicked"))?
        }),
        Err(_) => run_detached(future),
    }
}

fn run_detached<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start a Tokio runtime")?
        .block_on(future)
}
