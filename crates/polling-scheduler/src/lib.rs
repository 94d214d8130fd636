//! Recurring background work scoped to the authenticated lifetime.
//!
//! The scheduler owns timer tasks and nothing else: it never holds session
//! data. Each tick reads the session freshly through an accessor closure and
//! runs it through the token guard; an unusable session skips the tick
//! without sending a single request. Treating any captured-session closure
//! as a bug class is the point of the accessor indirection.
//!
//! ## Lifecycle
//!
//! 1. Create with [`PollingScheduler::new()`]
//! 2. Call [`PollingScheduler::start()`] when a session becomes usable
//! 3. Call [`PollingScheduler::stop()`] on sign-out or forced invalidation
//!
//! `start` is idempotent (repeated authentication events must not stack
//! timers) and `stop` is safe to call at any time, any number of times.

use auth_session::{Session, TokenGuard};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the tick event channel.
const TICK_CHANNEL_CAPACITY: usize = 256;

/// Boxed async session read, performed freshly at every tick.
pub type SessionAccessor =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Option<Session>> + Send>> + Send + Sync>;

/// Boxed async action invoked with the freshly-read session of its tick.
pub type TaskAction = Arc<
    dyn Fn(Session) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync,
>;

/// A recurring background task owned by the authenticated lifetime.
pub struct PollingTask {
    /// Stable identifier used in logs and tick events.
    pub id: &'static str,
    /// Time between firings. The first firing happens immediately on start.
    pub interval: Duration,
    /// The work to perform each tick.
    pub action: TaskAction,
}

impl PollingTask {
    /// Create a task from an async closure.
    pub fn new<F, Fut>(id: &'static str, interval: Duration, action: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            id,
            interval,
            action: Arc::new(move |session| Box::pin(action(session))),
        }
    }
}

/// Outcome of a single polling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The action ran and succeeded.
    Completed,
    /// The freshly-read session was not usable; no request was sent.
    Skipped,
    /// The action ran and failed; the task waits for its next interval.
    Failed(String),
}

/// One scheduled execution of a task, published for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickEvent {
    /// The task that fired.
    pub task: &'static str,
    /// What happened.
    pub outcome: TickOutcome,
}

/// Owns the recurring background tasks and their cancellation.
pub struct PollingScheduler {
    guard: TokenGuard,
    accessor: SessionAccessor,
    handles: Mutex<Vec<JoinHandle<()>>>,
    ticks: broadcast::Sender<TickEvent>,
}

impl PollingScheduler {
    /// Create a scheduler reading sessions through `accessor` and validating
    /// them with `guard` before every tick.
    pub fn new(guard: TokenGuard, accessor: SessionAccessor) -> Self {
        let (ticks, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        Self {
            guard,
            accessor,
            handles: Mutex::new(Vec::new()),
            ticks,
        }
    }

    /// Subscribe to tick outcomes.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickEvent> {
        self.ticks.subscribe()
    }

    /// Returns true if timers are currently active.
    pub fn is_running(&self) -> bool {
        !self.handles.lock().expect("lock poisoned").is_empty()
    }

    /// Start the given tasks. No-op if the scheduler is already running.
    ///
    /// Each task fires once immediately, then on its interval.
    pub fn start(&self, tasks: Vec<PollingTask>) {
        let mut handles = self.handles.lock().expect("lock poisoned");
        if !handles.is_empty() {
            debug!("Polling already running, ignoring start");
            return;
        }

        info!(tasks = tasks.len(), "Starting polling");

        for task in tasks {
            let guard = self.guard.clone();
            let accessor = self.accessor.clone();
            let ticks = self.ticks.clone();

            handles.push(tokio::spawn(async move {
                let mut ticker = interval(task.interval);
                // A slow action should delay the next tick, not burst after it
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    // First tick resolves immediately
                    ticker.tick().await;

                    let session = (accessor)().await;
                    let outcome = match session {
                        Some(session) if guard.is_usable(Some(&session)) => {
                            match (task.action)(session).await {
                                Ok(()) => TickOutcome::Completed,
                                Err(e) => {
                                    warn!(task = task.id, error = %e, "Polling tick failed");
                                    TickOutcome::Failed(e)
                                }
                            }
                        }
                        _ => {
                            debug!(task = task.id, "Skipping tick (session not usable)");
                            TickOutcome::Skipped
                        }
                    };

                    let _ = ticks.send(TickEvent {
                        task: task.id,
                        outcome,
                    });
                }
            }));
        }
    }

    /// Cancel all outstanding timers. Safe to call repeatedly or when not
    /// running.
    ///
    /// In-flight network calls started by a tick are not forcibly awaited;
    /// their results are discarded along with the aborted task.
    pub fn stop(&self) {
        let mut handles = self.handles.lock().expect("lock poisoned");
        if handles.is_empty() {
            return;
        }

        info!("Stopping polling");
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
