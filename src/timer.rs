//! Cancellable periodic task.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Runs a callback on its own thread every `period` until cancelled.
///
/// `cancel` (and drop) return only after the thread has exited, so no tick
/// can fire once cancellation has completed. The callback must not cancel
/// its own task.
pub struct PeriodicTask {
    name: String,
    cancel: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, period: Duration, mut callback: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let ticker = tick(period);
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                select! {
                    recv(cancel_rx) -> _ => break,
                    recv(ticker) -> _ => callback(),
                }
            })
            .with_context(|| format!("failed to spawn {} thread", name))?;

        Ok(Self {
            name: name.to_string(),
            cancel: Some(cancel_tx),
            join: Some(join),
        })
    }

    /// Stop the task and wait for its thread to exit.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the select.
        drop(self.cancel.take());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("{} thread panicked", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
