//! Cancellable one-shot timers that report back through a session inbox.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

/// Which delay elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Regular-bid commit delay.
    BidAdvance,
    /// Results auto-complete delay.
    AutoComplete,
    /// Pacing delay before dealing the next round.
    NextRound,
}

/// Message delivered to the inbox when a timer elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Which delay elapsed.
    pub kind: TimerKind,
    /// Generation of the handle that armed it.
    pub generation: u64,
}

/// Owned handle to an armed timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Generation stamped on the fire message.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `fired` was produced by this handle.
    ///
    /// A fire can already sit in the inbox when its handle is replaced, so
    /// owners must check before acting on it.
    pub fn matches(&self, fired: &TimerFired) -> bool {
        self.kind == fired.kind && self.generation == fired.generation
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type Deliver = dyn Fn(TimerFired) -> bool + Send + Sync;

/// Arms timers whose fire messages land in a single inbox.
#[derive(Clone)]
pub struct TimerQueue {
    deliver: Arc<Deliver>,
    generation: Arc<AtomicU64>,
}

impl TimerQueue {
    /// Deliver fires into `inbox`, converting them into the inbox's event type.
    pub fn new<E>(inbox: mpsc::UnboundedSender<E>) -> Self
    where
        E: From<TimerFired> + Send + 'static,
    {
        Self {
            deliver: Arc::new(move |fired| inbox.send(E::from(fired)).is_ok()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Arm a timer that fires once after `delay`.
    pub fn arm(&self, kind: TimerKind, delay: Duration) -> TimerHandle {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let deliver = self.deliver.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            deliver(TimerFired { kind, generation });
        });

        TimerHandle {
            kind,
            generation,
            task,
        }
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
