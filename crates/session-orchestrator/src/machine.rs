//! The session lifecycle coordinator.
//!
//! Consumes the provider's auth event stream, drives the token guard and the
//! onboarding coordinator, starts/stops the polling scheduler, and issues
//! navigation directives for the (out-of-scope) routing layer.
//!
//! One event's reaction runs to completion before the next event is
//! observed. The single exception is deliberate: while the onboarding call
//! of a fresh sign-in is in flight, the machine keeps watching the event
//! stream so a `SignedOut` can preempt it, in which case the pending
//! onboarding result and navigation are discarded rather than applied.
//! Other events arriving in that window are deferred and replayed in order.

use crate::backend::EmailBackend;
use crate::events::{
    NavigationDirective, TransitionEvent, LOGIN_PATH, MAIN_VIEW_PATH, REAUTH_REQUIRED_NOTICE,
    SESSION_EXPIRED_NOTICE,
};
use crate::fsm::{SessionFlowInput, SessionFlowMachine, SessionState};
use crate::onboarding::{OnboardingCoordinator, OnboardingError};
use auth_session::{AuthEvent, Session, SessionProvider, TokenClassification, TokenGuard};
use email_api::EmailSummary;
use polling_scheduler::{PollingScheduler, PollingTask, TickEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the transition event channel.
const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Timer intervals for the two required background tasks.
#[derive(Debug, Clone)]
pub struct SessionMachineConfig {
    /// Interval of the email snapshot refresh task.
    pub email_refresh_interval: Duration,
    /// Interval of the collection trigger task.
    pub collection_interval: Duration,
}

impl Default for SessionMachineConfig {
    fn default() -> Self {
        Self {
            email_refresh_interval: Duration::from_secs(30),
            collection_interval: Duration::from_secs(1800),
        }
    }
}

/// Internal reports routed back into the event loop.
enum Command {
    /// A protected call observed a 401.
    Unauthorized { endpoint: String },
    /// Tear the machine down.
    Shutdown,
}

/// Top-level coordinator owning the session lifecycle.
pub struct SessionStateMachine {
    inner: Arc<MachineInner>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

struct MachineInner {
    provider: Arc<SessionProvider>,
    backend: Arc<dyn EmailBackend>,
    guard: TokenGuard,
    scheduler: PollingScheduler,
    onboarding: OnboardingCoordinator,
    config: SessionMachineConfig,
    fsm: Mutex<SessionFlowMachine>,
    nav_tx: mpsc::UnboundedSender<NavigationDirective>,
    transitions: broadcast::Sender<TransitionEvent>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    snapshot_tx: watch::Sender<Vec<EmailSummary>>,
    /// Sign-outs this machine initiated whose provider echo is still pending.
    suppressed_sign_outs: AtomicUsize,
}

impl SessionStateMachine {
    /// Create a machine. Returns the machine and the receiver of navigation
    /// directives for the routing layer.
    pub fn new(
        provider: Arc<SessionProvider>,
        backend: Arc<dyn EmailBackend>,
        guard: TokenGuard,
        config: SessionMachineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<NavigationDirective>) {
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(Vec::new());

        // The scheduler reads sessions through the provider at fire time;
        // no task ever captures a session.
        let accessor_provider = provider.clone();
        let scheduler = PollingScheduler::new(
            guard.clone(),
            Arc::new(move || {
                let provider = accessor_provider.clone();
                Box::pin(async move { provider.get_current_session().await })
            }),
        );

        let onboarding = OnboardingCoordinator::new(backend.clone());

        let inner = Arc::new(MachineInner {
            provider,
            backend,
            guard,
            scheduler,
            onboarding,
            config,
            fsm: Mutex::new(SessionFlowMachine::new()),
            nav_tx,
            transitions,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            snapshot_tx,
            suppressed_sign_outs: AtomicUsize::new(0),
        });

        (
            Self {
                inner,
                run_handle: Mutex::new(None),
            },
            nav_rx,
        )
    }

    /// Subscribe to the provider and spawn the event loop.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn start(&self) {
        let commands = self
            .inner
            .commands_rx
            .lock()
            .expect("lock poisoned")
            .take()
            .expect("session machine already started");
        let events = self.inner.provider.subscribe();

        let inner = self.inner.clone();
        let handle = tokio::spawn(run(inner, events, commands));
        *self.run_handle.lock().expect("lock poisoned") = Some(handle);
    }

    /// Deterministic teardown: stops polling and ends the event loop.
    pub async fn shutdown(&self) {
        let _ = self.inner.commands_tx.send(Command::Shutdown);
        let handle = self.run_handle.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.scheduler.stop();
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Returns true while the polling scheduler has active timers.
    pub fn is_polling(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    /// Subscribe to state transitions.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<TransitionEvent> {
        self.inner.transitions.subscribe()
    }

    /// Subscribe to polling tick outcomes.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickEvent> {
        self.inner.scheduler.subscribe_ticks()
    }

    /// Latest email snapshot published by the refresh task.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Vec<EmailSummary>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Report a 401 observed by a protected call made outside the scheduler
    /// (e.g. a user-initiated delete). Uniform handling regardless of which
    /// endpoint produced it; discarded if the machine has already left the
    /// authenticated state.
    pub fn report_unauthorized(&self, endpoint: &str) {
        let _ = self.inner.commands_tx.send(Command::Unauthorized {
            endpoint: endpoint.to_string(),
        });
    }
}

/// The event loop. One event's reaction completes before the next is read.
async fn run(
    inner: Arc<MachineInner>,
    mut events: broadcast::Receiver<AuthEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    info!("Session state machine running");
    let mut deferred: VecDeque<AuthEvent> = VecDeque::new();

    loop {
        let event = if let Some(event) = deferred.pop_front() {
            event
        } else {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Auth event stream closed, stopping session machine");
                        inner.scheduler.stop();
                        return;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Unauthorized { endpoint }) => {
                        inner.handle_unauthorized(&endpoint).await;
                        continue;
                    }
                    Some(Command::Shutdown) | None => {
                        info!("Session state machine shutting down");
                        inner.scheduler.stop();
                        return;
                    }
                },
            }
        };

        debug!(event = event.name(), "Processing auth event");
        match event {
            AuthEvent::SignedIn(session) => {
                inner
                    .handle_signed_in(session, &mut events, &mut deferred)
                    .await;
            }
            AuthEvent::SignedOut => inner.handle_signed_out().await,
            AuthEvent::TokenRefreshed(_) => inner.handle_token_refreshed(),
        }
    }
}

impl MachineInner {
    fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().expect("lock poisoned").state())
    }

    /// Transition the FSM and publish the event if the state changed.
    /// Inputs not valid in the current state are logged and dropped.
    fn transition(&self, input: &SessionFlowInput) -> Option<SessionState> {
        let mut fsm = self.fsm.lock().expect("lock poisoned");
        let from = SessionState::from(fsm.state());

        if fsm.consume(input).is_err() {
            debug!(input = ?input, state = ?from, "Ignoring input not valid in this state");
            return None;
        }

        let to = SessionState::from(fsm.state());
        drop(fsm);

        if from != to {
            debug!(from = ?from, to = ?to, "Session state transition");
            let _ = self.transitions.send(TransitionEvent {
                from,
                to,
                trigger: format!("{:?}", input),
            });
        }

        Some(to)
    }

    fn navigate(&self, directive: NavigationDirective) {
        debug!(path = %directive.path, "Issuing navigation directive");
        let _ = self.nav_tx.send(directive);
    }

    fn suppress_next_sign_out(&self) {
        self.suppressed_sign_outs.fetch_add(1, Ordering::SeqCst);
    }

    fn take_suppressed_sign_out(&self) -> bool {
        self.suppressed_sign_outs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn handle_signed_in(
        &self,
        session: Session,
        events: &mut broadcast::Receiver<AuthEvent>,
        deferred: &mut VecDeque<AuthEvent>,
    ) {
        if self.transition(&SessionFlowInput::SignedIn).is_none() {
            return;
        }

        match self.guard.classify(Some(&session)) {
            TokenClassification::Poisoned => {
                warn!(
                    user_id = %session.user_id,
                    "Delegated token is the placeholder value, forcing re-consent"
                );
                self.force_sign_out(SessionFlowInput::PoisonedToken, REAUTH_REQUIRED_NOTICE)
                    .await;
            }
            TokenClassification::Missing => {
                warn!(
                    user_id = %session.user_id,
                    "Signed in without a delegated token, forcing a fresh sign-in"
                );
                self.force_sign_out(SessionFlowInput::MissingToken, SESSION_EXPIRED_NOTICE)
                    .await;
            }
            TokenClassification::Valid(_) => {
                // Run onboarding, but keep watching the stream: a SignedOut
                // takes precedence immediately and the pending effects are
                // discarded. Anything else is deferred, preserving order.
                let result = {
                    let onboarding = self.onboarding.ensure_registered(&session);
                    tokio::pin!(onboarding);
                    let mut events_closed = false;
                    loop {
                        if events_closed {
                            break (&mut onboarding).await;
                        }
                        tokio::select! {
                            biased;
                            event = events.recv() => match event {
                                Ok(AuthEvent::SignedOut) => {
                                    info!("Sign-out during onboarding, discarding pending effects");
                                    self.apply_signed_out().await;
                                    return;
                                }
                                Ok(other) => deferred.push_back(other),
                                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                    warn!(skipped, "Auth event stream lagged during onboarding");
                                }
                                Err(broadcast::error::RecvError::Closed) => {
                                    events_closed = true;
                                }
                            },
                            result = &mut onboarding => break result,
                        }
                    }
                };

                match result {
                    Ok(()) => {
                        self.transition(&SessionFlowInput::OnboardingSucceeded);
                        self.scheduler.start(self.build_tasks());
                        self.navigate(NavigationDirective::to(MAIN_VIEW_PATH));
                    }
                    Err(OnboardingError::Unauthorized) => {
                        self.force_sign_out(
                            SessionFlowInput::OnboardingUnauthorized,
                            SESSION_EXPIRED_NOTICE,
                        )
                        .await;
                    }
                }
            }
        }
    }

    async fn handle_signed_out(&self) {
        if self.take_suppressed_sign_out() {
            debug!("Ignoring sign-out echo from a forced sign-out");
            return;
        }
        self.apply_signed_out().await;
    }

    /// Unconditional sign-out effects: stop polling, clear the onboarding
    /// record, land in Anonymous, navigate to the sign-in view.
    async fn apply_signed_out(&self) {
        self.scheduler.stop();
        self.onboarding.reset().await;
        self.transition(&SessionFlowInput::SignedOut);
        self.navigate(NavigationDirective::to(LOGIN_PATH));
    }

    fn handle_token_refreshed(&self) {
        if self.state().is_authenticated() {
            // Same identity: no onboarding re-run; polling reads the fresh
            // session on its next tick
            self.transition(&SessionFlowInput::TokenRefreshed);
            debug!("Token refreshed, polling continues");
        } else {
            debug!("Ignoring token refresh outside the authenticated state");
        }
    }

    /// A protected call observed a 401. Uniform handling regardless of
    /// endpoint; stale reports (machine already left Authenticated) are
    /// discarded.
    async fn handle_unauthorized(&self, endpoint: &str) {
        if !self.state().is_authenticated() {
            debug!(endpoint, "Discarding stale unauthorized report");
            return;
        }

        warn!(endpoint, "Protected call returned 401, forcing re-login");
        self.transition(&SessionFlowInput::Unauthorized);
        self.scheduler.stop();
        self.onboarding.reset().await;
        self.suppress_next_sign_out();
        self.provider.sign_out().await;
        self.transition(&SessionFlowInput::SignOutComplete);
        self.navigate(NavigationDirective::with_notice(
            LOGIN_PATH,
            SESSION_EXPIRED_NOTICE,
        ));
    }

    /// Clear the session and land in the state selected by `input`, with a
    /// corrective message for the sign-in view. The provider's sign-out echo
    /// is suppressed so the chosen state survives.
    async fn force_sign_out(&self, input: SessionFlowInput, notice: &str) {
        self.scheduler.stop();
        self.onboarding.reset().await;
        self.suppress_next_sign_out();
        self.provider.sign_out().await;
        self.transition(&input);
        self.navigate(NavigationDirective::with_notice(LOGIN_PATH, notice));
    }

    /// The two required background tasks. Actions receive the freshly-read
    /// session of their tick from the scheduler.
    fn build_tasks(&self) -> Vec<PollingTask> {
        let backend = self.backend.clone();
        let commands = self.commands_tx.clone();
        let snapshot = self.snapshot_tx.clone();
        let refresh = PollingTask::new(
            "email-refresh",
            self.config.email_refresh_interval,
            move |session| {
                let backend = backend.clone();
                let commands = commands.clone();
                let snapshot = snapshot.clone();
                async move {
                    match backend.fetch_emails(&session).await {
                        Ok(emails) => {
                            let _ = snapshot.send(emails);
                            Ok(())
                        }
                        Err(e) if e.is_unauthorized() => {
                            let _ = commands.send(Command::Unauthorized {
                                endpoint: "emails".to_string(),
                            });
                            Err(e.to_string())
                        }
                        Err(e) => Err(e.to_string()),
                    }
                }
            },
        );

        let backend = self.backend.clone();
        let commands = self.commands_tx.clone();
        let collection = PollingTask::new(
            "collection-trigger",
            self.config.collection_interval,
            move |session| {
                let backend = backend.clone();
                let commands = commands.clone();
                async move {
                    match backend.trigger_collection(&session).await {
                        Ok(()) => Ok(()),
                        Err(e) if e.is_unauthorized() => {
                            let _ = commands.send(Command::Unauthorized {
                                endpoint: "emails/collection".to_string(),
                            });
                            Err(e.to_string())
                        }
                        // Other collection failures just wait for the next interval
                        Err(e) => Err(e.to_string()),
                    }
                }
            },
        );

        vec![refresh, collection]
    }
}
