use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Thread};
use std::time::Duration;
use strum_macros::Display;

/// Lifecycle of the engine as seen by the shutdown watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum EngineStatus {
    /// Idle, safe to shut down.
    Waiting = 1,
    /// An event is being handled.
    Running = 2,
    /// Terminal.
    ShuttingDown = 3,
}

impl From<u8> for EngineStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => EngineStatus::Waiting,
            2 => EngineStatus::Running,
            _ => EngineStatus::ShuttingDown,
        }
    }
}

/// The only value shared between the event loop and the shutdown watcher. Transitions are plain
/// compare-and-swaps; the watcher parks while an event is in flight and the loop unparks it when it
/// goes back to `Waiting`.
#[derive(Debug)]
pub struct Status {
    value: AtomicU8,
    watcher: OnceLock<Thread>,
}

impl Status {
    pub fn new() -> Status {
        Status {
            value: AtomicU8::new(EngineStatus::Waiting as u8),
            watcher: OnceLock::new(),
        }
    }

    pub fn load(&self) -> EngineStatus {
        self.value.load(Ordering::Acquire).into()
    }

    /// Moves `Waiting` to `Running`. On failure returns the status that prevented it.
    pub fn begin(&self) -> Result<(), EngineStatus> {
        self.transition(EngineStatus::Waiting, EngineStatus::Running)
    }

    /// Moves `Running` back to `Waiting` and wakes the watcher if one is waiting on us.
    pub fn finish(&self) {
        if self
            .transition(EngineStatus::Running, EngineStatus::Waiting)
            .is_ok()
        {
            if let Some(watcher) = self.watcher.get() {
                watcher.unpark();
            }
        }
    }

    /// Blocks until no event is in flight, then moves to `ShuttingDown`.
    pub fn shut_down(&self) {
        let _ = self.watcher.set(thread::current());

        loop {
            match self.transition(EngineStatus::Waiting, EngineStatus::ShuttingDown) {
                Ok(()) | Err(EngineStatus::ShuttingDown) => return,
                // Running. The timeout covers a watcher registered by some other thread.
                Err(_) => thread::park_timeout(Duration::from_millis(10)),
            }
        }
    }

    fn transition(&self, from: EngineStatus, to: EngineStatus) -> Result<(), EngineStatus> {
        self.value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(EngineStatus::from)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}
