//! Restartable single-slot timer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Holds at most one scheduled task. Scheduling again cancels the previous task and restarts
/// the delay, which is what makes it a trailing-edge debouncer.
///
/// A task that has fired removes itself from the slot before running, so [`DebounceTimer::cancel`]
/// only ever stops tasks that are still waiting out their delay.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    slot: Mutex<Slot>,
}

impl DebounceTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `task` after `delay` unless cancelled or rescheduled first. Must be called from
    /// within a tokio runtime.
    pub fn schedule<F>(self: &Arc<Self>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let timer = Arc::clone(self);
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if timer.take_if_current(generation) {
                task.await;
            }
        }));
    }

    /// Cancel the waiting task, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.slot.lock().pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    fn take_if_current(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation || slot.pending.is_none() {
            return false;
        }
        slot.pending = None;
        true
    }
}
