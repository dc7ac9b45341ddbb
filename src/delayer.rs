//! Debounced, coalescing execution of an async producer.
//!
//! A [`Delayer`] collapses every [`trigger`](Delayer::trigger) call made during a
//! quiet-period window into a single run of the most recently supplied producer,
//! and hands that run's outcome to every caller.
//!
//! # State machine
//!
//! ```text
//!            trigger                       timer fires
//!   Idle ────────────────► Scheduled ─────────────────► Running ──┐
//!    ▲                      │     ▲                       │        │ settle, no queue
//!    │                      └─────┘ trigger:              │ trigger│
//!    │                       restart timer,               ▼        │
//!    │                       replace producer        Running +     │
//!    │                                               queued next   │
//!    │                                                    │ settle │
//!    │                                                    ▼        │
//!    │                                               Scheduled     │
//!    └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A run that has started is never interrupted. Calls arriving while it runs are
//! collected into the next cycle, whose window starts once the current run settles.
//!
//! # Timers
//!
//! Each scheduled window is a spawned tokio task sleeping for the delay. Restarting
//! the window aborts the previous task. A generation number guards against a timer
//! that had already woken up when it was superseded.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{LockResultExt, TrackerError, TrackerResult};

/// Logging target for the delayer.
const LOG_TARGET: &str = "conflict_tracker::delayer";

type BoxedRun<T> = Pin<Box<dyn Future<Output = TrackerResult<T>> + Send>>;
type Producer<T> = Box<dyn FnOnce() -> BoxedRun<T> + Send>;
type Waiter<T> = oneshot::Sender<TrackerResult<T>>;
type IdleHook = Box<dyn Fn() + Send + Sync>;

/// The producer to run and everyone waiting for it.
struct Cycle<T> {
    producer: Producer<T>,
    waiters: Vec<Waiter<T>>,
}

impl<T> Cycle<T> {
    fn new(producer: Producer<T>, waiter: Waiter<T>) -> Self {
        Self {
            producer,
            waiters: vec![waiter],
        }
    }

    /// Last writer wins for the producer; every caller keeps its seat.
    fn absorb(&mut self, producer: Producer<T>, waiter: Waiter<T>) {
        self.producer = producer;
        self.waiters.push(waiter);
    }
}

enum State<T> {
    Idle,
    Scheduled {
        cycle: Cycle<T>,
        timer: AbortHandle,
        generation: u64,
    },
    Running {
        queued: Option<Cycle<T>>,
    },
}

struct Inner<T> {
    delay: Duration,
    label: String,
    state: Mutex<State<T>>,
    next_generation: AtomicU64,
    cancelled: CancellationToken,
    on_idle: Option<IdleHook>,
}

/// Debounced memoizer for a single producer slot.
///
/// Cloning yields another handle to the same slot.
pub struct Delayer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Delayer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Delayer<T> {
    /// Create a delayer with the given quiet-period window.
    pub fn new(delay: Duration) -> Self {
        Self::with_label(delay, "delayer")
    }

    /// Create a delayer whose log lines and cancellation errors carry `label`.
    pub fn with_label(delay: Duration, label: impl Into<String>) -> Self {
        Self::build(delay, label.into(), None)
    }

    /// Like [`with_label`](Delayer::with_label), calling `on_idle` every time a run
    /// settles with nothing queued behind it.
    ///
    /// The hook runs after the state is back to idle and before the run's waiters
    /// are woken. It must not call back into this delayer's `cancel`.
    pub fn with_idle_hook(
        delay: Duration,
        label: impl Into<String>,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::build(delay, label.into(), Some(Box::new(on_idle)))
    }

    fn build(delay: Duration, label: String, on_idle: Option<IdleHook>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                label,
                state: Mutex::new(State::Idle),
                next_generation: AtomicU64::new(0),
                cancelled: CancellationToken::new(),
                on_idle,
            }),
        }
    }

    /// Request a run of `producer`.
    ///
    /// The returned future resolves with the outcome of the run this call was
    /// coalesced into. That run may execute a producer passed by a later call.
    /// It resolves to [`TrackerError::Cancelled`] if the delayer is cancelled
    /// before the run starts.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger<F, Fut>(
        &self,
        producer: F,
    ) -> impl Future<Output = TrackerResult<T>> + Send + use<T, F, Fut>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TrackerResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let producer: Producer<T> = Box::new(move || Box::pin(producer()));

        let mut state = self.inner.state.lock().recover_poison("Delayer::trigger");
        if self.inner.cancelled.is_cancelled() {
            let _ = tx.send(Err(TrackerError::cancelled(&self.inner.label)));
        } else {
            let next = match std::mem::replace(&mut *state, State::Idle) {
                State::Idle => {
                    log::trace!(target: LOG_TARGET, "Scheduling run for {}", self.inner.label);
                    Inner::schedule(&self.inner, Cycle::new(producer, tx))
                }
                State::Scheduled {
                    mut cycle, timer, ..
                } => {
                    timer.abort();
                    cycle.absorb(producer, tx);
                    log::trace!(
                        target: LOG_TARGET,
                        "Restarted debounce window for {} ({} waiters)",
                        self.inner.label,
                        cycle.waiters.len()
                    );
                    Inner::schedule(&self.inner, cycle)
                }
                State::Running { queued } => {
                    let queued = match queued {
                        Some(mut cycle) => {
                            cycle.absorb(producer, tx);
                            cycle
                        }
                        None => Cycle::new(producer, tx),
                    };
                    log::trace!(
                        target: LOG_TARGET,
                        "Queued next run for {} behind the one in flight",
                        self.inner.label
                    );
                    State::Running {
                        queued: Some(queued),
                    }
                }
            };
            *state = next;
        }
        drop(state);

        let label = self.inner.label.clone();
        async move {
            rx.await
                .unwrap_or_else(|_| Err(TrackerError::cancelled(label)))
        }
    }

    /// Whether a run is scheduled or in flight.
    pub fn is_triggered(&self) -> bool {
        !matches!(
            *self.inner.state.lock().recover_poison("Delayer::is_triggered"),
            State::Idle
        )
    }

    /// Stop the pending timer and refuse further triggers.
    ///
    /// Callers waiting on a run that has not started resolve to
    /// [`TrackerError::Cancelled`]. A run already in flight completes and still
    /// delivers to its own waiters, but nothing is scheduled after it.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock().recover_poison("Delayer::cancel");
        self.inner.cancelled.cancel();
        match std::mem::replace(&mut *state, State::Idle) {
            State::Idle => {}
            State::Scheduled { timer, cycle, .. } => {
                timer.abort();
                log::debug!(
                    target: LOG_TARGET,
                    "Cancelled pending run for {} ({} waiters abandoned)",
                    self.inner.label,
                    cycle.waiters.len()
                );
            }
            State::Running { queued } => {
                if queued.is_some() {
                    log::debug!(
                        target: LOG_TARGET,
                        "Dropped queued run for {}",
                        self.inner.label
                    );
                }
                *state = State::Running { queued: None };
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.is_cancelled()
    }
}

impl<T: Clone + Send + 'static> Inner<T> {
    /// Start a fresh window for `cycle`. Caller holds the state lock.
    fn schedule(this: &Arc<Self>, cycle: Cycle<T>) -> State<T> {
        let generation = this.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(this);

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancelled.cancelled() => return,
                _ = tokio::time::sleep(inner.delay) => {}
            }
            Inner::run(inner, generation).await;
        });

        State::Scheduled {
            cycle,
            timer: task.abort_handle(),
            generation,
        }
    }

    async fn run(this: Arc<Self>, generation: u64) {
        let cycle = {
            let mut state = this.state.lock().recover_poison("Delayer::run");
            match std::mem::replace(&mut *state, State::Idle) {
                State::Scheduled {
                    cycle,
                    generation: current,
                    ..
                } if current == generation => {
                    *state = State::Running { queued: None };
                    cycle
                }
                other => {
                    // Superseded after the timer woke up.
                    *state = other;
                    return;
                }
            }
        };

        let Cycle { producer, waiters } = cycle;
        log::debug!(
            target: LOG_TARGET,
            "Debounce window elapsed for {}, running for {} waiters",
            this.label,
            waiters.len()
        );

        // Run on its own task so a panicking producer cannot wedge the state machine.
        let result = match tokio::spawn(async move { producer().await }).await {
            Ok(result) => result,
            Err(e) => Err(TrackerError::internal(format!(
                "producer for {} did not complete: {}",
                this.label, e
            ))),
        };

        let went_idle = {
            let mut state = this.state.lock().recover_poison("Delayer::settle");
            match std::mem::replace(&mut *state, State::Idle) {
                State::Running {
                    queued: Some(next),
                } if !this.cancelled.is_cancelled() => {
                    *state = Inner::schedule(&this, next);
                    false
                }
                _ => true,
            }
        };

        if let Some(on_idle) = this.on_idle.as_ref().filter(|_| went_idle) {
            on_idle();
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}
