//! # Application: hosts one main function, its resources and the OS signal listener.
//!
//! The [`Application`] owns the lifecycle state machine, the hold-on and done latches,
//! the first-error slot and the event bus. It runs a single main function while
//! coordinating with an optional [`Resources`](crate::Resources) collaborator and the
//! operating system.
//!
//! ## Key responsibilities
//! - initialize resources within [`AppConfig::initialization_timeout`]
//! - run the main function, watch resources, listen for termination signals
//! - perform graceful shutdown bounded by [`AppConfig::termination_timeout`]
//! - act as the root [`Scope`] for every collaborator
//!
//! ## High-level architecture
//! ```text
//! run()
//!   ├─► CAS Init → Running            (else WrongState)
//!   ├─► install signal handlers        (SIGHUP/SIGINT/SIGTERM/SIGQUIT)
//!   ├─► Resources::init(scope + initialization_timeout)
//!   │       └─ Err ─► record error, Running → Shutdown, close done, return error
//!   │
//!   ├─► spawn watcher:  Resources::watch(scope) ─► set_error? ─► shutdown() ─► close watch-exited
//!   ├─► spawn main:     Main::run(scope, hold_on)
//!   ├─► spawn signals:  signal ─► halt() ─► wait done | termination_timeout (TermTimeout)
//!   │
//!   ├─► wait first of: main result | signal listener result | done
//!   ├─► set_error(result?), shutdown()
//!   ├─► main still running (watch error, explicit shutdown):
//!   │       wait main | termination_timeout
//!   │
//!   └─► teardown (with resources):
//!         Resources::stop()
//!         wait watch-exited | termination_timeout
//!         Resources::release() ─► set_error?
//!       return first error
//! ```
//!
//! ## State machine
//! ```text
//! Init ──run()──► Running ──halt()──► Halt ──shutdown()──► Shutdown
//!                    │                                        ▲
//!                    └────────── init failure ────────────────┘
//! ```
//!
//! ## Rules
//! - hold-on closes strictly before done.
//! - The first error wins; later ones are published as `ErrorDropped`.
//! - The `Shutdown` sentinel is never recorded as the run error.
//! - Resources are released only after watch returned or the termination wait expired,
//!   and only after main returned or its termination wait expired.
//! - Panics in main, init, watch and release become [`AppError::Unhandled`].

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::core::builder::ApplicationBuilder;
use crate::core::config::AppConfig;
use crate::core::shutdown::ShutdownSignals;
use crate::error::AppError;
use crate::events::{Bus, Event, EventKind};
use crate::fanout::panic_message;
use crate::latch::{HoldOn, Latch};
use crate::lifecycle::{MainRef, ResourcesRef};
use crate::scope::Scope;
use crate::state::{Lifecycle, StateCell};
use crate::subscribers::{Subscribe, SubscriberWorkers};

/// Lifecycle state of an [`Application`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Created, `run` not called yet.
    Init,
    /// Main function, signal listener and resources watcher are active.
    Running,
    /// Hold-on closed; waiting for the main function to drain.
    Halt,
    /// Done closed; teardown in progress or finished.
    Shutdown,
}

impl Lifecycle for AppState {
    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => AppState::Init,
            1 => AppState::Running,
            2 => AppState::Halt,
            _ => AppState::Shutdown,
        }
    }

    fn allows(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (AppState::Init, AppState::Running)
                | (AppState::Running, AppState::Halt)
                | (AppState::Halt, AppState::Shutdown)
                | (AppState::Running, AppState::Shutdown)
        )
    }
}

/// State shared by every handle and scope of one application.
pub(crate) struct Shared {
    cfg: AppConfig,
    main: Option<MainRef>,
    resources: Option<ResourcesRef>,
    state: StateCell<AppState>,
    first_err: Mutex<Option<AppError>>,
    hold_on: Latch,
    done: Latch,
    bus: Bus,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
}

impl Shared {
    /// Reason reported by the application scope.
    pub(crate) fn scope_err(&self) -> Option<AppError> {
        if let Some(err) = self.first_error() {
            return Some(err);
        }
        (self.state.load() == AppState::Shutdown).then_some(AppError::Shutdown)
    }

    fn first_error(&self) -> Option<AppError> {
        self.first_err
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Application supervisor handle.
///
/// Cheap to clone; clones drive the same application.
///
/// # Example
/// ```no_run
/// use appvisor::{AppConfig, AppError, Application, HoldOn, MainFn, Scope};
///
/// #[tokio::main]
/// async fn main() -> Result<(), AppError> {
///     let app = Application::builder(AppConfig::default())
///         .with_main(MainFn::arc("server", |_scope: Scope, hold_on: HoldOn| async move {
///             hold_on.wait().await;
///             Ok::<_, AppError>(())
///         }))
///         .build();
///
///     app.run().await
/// }
/// ```
#[derive(Clone)]
pub struct Application {
    shared: Arc<Shared>,
}

impl Application {
    /// Starts building an application with the given configuration.
    pub fn builder(cfg: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: AppConfig,
        main: Option<MainRef>,
        resources: Option<ResourcesRef>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            shared: Arc::new(Shared {
                cfg,
                main,
                resources,
                state: StateCell::new(AppState::Init),
                first_err: Mutex::new(None),
                hold_on: Latch::new(),
                done: Latch::new(),
                bus,
                subscribers: Mutex::new(subscribers),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AppState {
        self.shared.state.load()
    }

    /// Effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.shared.cfg
    }

    /// Root scope of this application.
    ///
    /// No deadline; done once the application reaches [`AppState::Shutdown`];
    /// `err()` reports the first error, else [`AppError::Shutdown`].
    pub fn scope(&self) -> Scope {
        Scope::for_application(self.shared.clone(), self.shared.done.token().clone())
    }

    /// Shutdown request as observed by the main function.
    pub fn hold_on(&self) -> HoldOn {
        HoldOn::new(self.shared.hold_on.clone())
    }

    /// Same as `self.scope().err()`.
    pub fn err(&self) -> Option<AppError> {
        self.shared.scope_err()
    }

    /// Creates a receiver of every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Requests graceful shutdown: `Running → Halt`, closes hold-on.
    ///
    /// Only the first successful caller has an effect.
    pub fn halt(&self) {
        if self.shared.state.transition(AppState::Running, AppState::Halt) {
            self.close_hold_on();
        }
    }

    /// Halts, then moves `Halt → Shutdown` and closes done.
    ///
    /// Safe to call any number of times from any task.
    pub fn shutdown(&self) {
        self.halt();
        if self.shared.state.transition(AppState::Halt, AppState::Shutdown) {
            // a concurrent halt may have won the CAS but not closed hold-on yet
            self.close_hold_on();
            self.close_done();
        }
    }

    /// Runs the application to completion. Single call per instance.
    ///
    /// # Errors
    /// - [`AppError::MainOmitted`] without a main function (no side effects)
    /// - [`AppError::WrongState`] when called more than once (no side effects)
    /// - otherwise the first error recorded during the run
    pub async fn run(&self) -> Result<(), AppError> {
        let main = self.shared.main.clone().ok_or(AppError::MainOmitted)?;
        if !self.shared.state.transition(AppState::Init, AppState::Running) {
            return Err(AppError::WrongState);
        }

        let workers = self.spawn_subscribers();
        let result = self.run_inner(main).await;
        if let Some(workers) = workers {
            workers.shutdown(self.shared.cfg.termination_timeout()).await;
        }
        result
    }

    async fn run_inner(&self, main: MainRef) -> Result<(), AppError> {
        let signals = match ShutdownSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                let err = AppError::Signal {
                    error: e.to_string(),
                };
                self.abort_startup(err.clone());
                return Err(err);
            }
        };
        if let Err(err) = self.init().await {
            self.abort_startup(err.clone());
            return Err(err);
        }

        let watch_exited = self.spawn_watcher();
        if let Err(err) = self.drive(main, signals).await {
            self.set_error(err);
        }
        self.shutdown();
        self.teardown(watch_exited).await;

        match self.shared.first_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Initializes resources under a scope bounded by the initialization timeout.
    async fn init(&self) -> Result<(), AppError> {
        let timeout = self.shared.cfg.initialization_timeout();
        self.publish(Event::new(EventKind::InitStarted).with_timeout(timeout));

        let Some(resources) = &self.shared.resources else {
            return Ok(());
        };
        let (scope, _guard) = self.scope().with_timeout(timeout);
        tokio::select! {
            res = guarded(resources.init(scope.clone())) => res,
            _ = scope.done() => Err(scope.err().unwrap_or(AppError::DeadlineExceeded { timeout })),
        }
    }

    /// Init failure path: record the error and go straight to shutdown without halting.
    fn abort_startup(&self, err: AppError) {
        self.publish(Event::new(EventKind::InitFailed).with_reason(err.to_string()));
        self.record_error(err);
        if self.shared.state.transition(AppState::Running, AppState::Shutdown) {
            self.close_done();
        } else {
            self.shutdown();
        }
    }

    /// Spawns the resources watcher; returns its exit latch.
    fn spawn_watcher(&self) -> Option<Latch> {
        let resources = self.shared.resources.clone()?;
        let exited = Latch::new();

        let app = self.clone();
        let latch = exited.clone();
        tokio::spawn(async move {
            if let Err(err) = guarded(resources.watch(app.scope())).await {
                app.set_error(err);
            }
            app.shutdown();
            latch.close();
            app.publish(Event::new(EventKind::WatchExited));
        });
        Some(exited)
    }

    /// Runs main and the signal listener until main returns.
    ///
    /// A termination timeout from the listener ends the wait at once. When done closes
    /// for another reason (watch error, explicit shutdown) main still gets the
    /// termination timeout to drain before teardown starts.
    async fn drive(&self, main: MainRef, signals: ShutdownSignals) -> Result<(), AppError> {
        let mut main_task = self.spawn_main(main);
        let mut signal_task = tokio::spawn(listen_signals(self.clone(), signals));

        tokio::select! {
            joined = &mut main_task => return joined.unwrap_or_else(|e| Err(unhandled(e))),
            joined = &mut signal_task => {
                joined.unwrap_or_else(|e| Err(unhandled(e)))?;
            }
            _ = self.shared.done.wait() => {}
        }

        self.shutdown();
        let timeout = self.shared.cfg.termination_timeout();
        match time::timeout(timeout, &mut main_task).await {
            Ok(joined) => joined.unwrap_or_else(|e| Err(unhandled(e))),
            Err(_) => {
                self.publish(Event::new(EventKind::TerminationTimeout).with_timeout(timeout));
                Ok(())
            }
        }
    }

    fn spawn_main(&self, main: MainRef) -> JoinHandle<Result<(), AppError>> {
        let name: Arc<str> = Arc::from(main.name());
        self.publish(Event::new(EventKind::MainStarted).with_component(name.clone()));

        let app = self.clone();
        let scope = self.scope();
        let hold_on = self.hold_on();
        tokio::spawn(async move {
            let res = guarded(main.run(scope, hold_on)).await;

            let mut ev = Event::new(EventKind::MainExited).with_component(name);
            if let Err(err) = &res {
                ev = ev.with_reason(err.to_string());
            }
            app.publish(ev);
            res
        })
    }

    /// Stops resources, waits for the watcher (bounded), releases.
    async fn teardown(&self, watch_exited: Option<Latch>) {
        let (Some(resources), Some(exited)) = (&self.shared.resources, watch_exited) else {
            return;
        };

        resources.stop();
        let timeout = self.shared.cfg.termination_timeout();
        if time::timeout(timeout, exited.wait()).await.is_err() {
            self.publish(Event::new(EventKind::WatchTimeout).with_timeout(timeout));
        }

        match guarded(resources.release()).await {
            Ok(()) => self.publish(Event::new(EventKind::ReleaseCompleted)),
            Err(err) => {
                self.publish(Event::new(EventKind::ReleaseFailed).with_reason(err.to_string()));
                self.set_error(err);
            }
        }
    }

    /// Records `err` if it is the first one, then shuts down.
    pub(crate) fn set_error(&self, err: AppError) {
        self.record_error(err);
        self.shutdown();
    }

    fn record_error(&self, err: AppError) {
        if err.is_shutdown() {
            return;
        }
        let recorded = {
            let mut slot = self
                .shared
                .first_err
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(err.clone());
                true
            } else {
                false
            }
        };

        let kind = if recorded {
            EventKind::ErrorRecorded
        } else {
            EventKind::ErrorDropped
        };
        self.publish(Event::new(kind).with_reason(err.to_string()));
    }

    fn close_hold_on(&self) {
        let ev = Event::new(EventKind::HaltRequested);
        if self.shared.hold_on.close() {
            self.publish(ev);
        }
    }

    fn close_done(&self) {
        let ev = Event::new(EventKind::ShutdownRequested);
        if self.shared.done.close() {
            self.publish(ev);
        }
    }

    fn publish(&self, ev: Event) {
        self.shared.bus.publish(ev);
    }

    /// Hands the configured subscribers to their workers.
    fn spawn_subscribers(&self) -> Option<SubscriberWorkers> {
        let subscribers = std::mem::take(
            &mut *self
                .shared
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if subscribers.is_empty() {
            return None;
        }
        Some(SubscriberWorkers::spawn(subscribers, &self.shared.bus))
    }
}

/// Awaits a collaborator call, turning a panic into [`AppError::Unhandled`].
async fn guarded<F>(fut: F) -> Result<(), AppError>
where
    F: Future<Output = Result<(), AppError>>,
{
    AssertUnwindSafe(fut).catch_unwind().await.unwrap_or_else(|panic| {
        Err(AppError::Unhandled {
            detail: panic_message(&*panic),
        })
    })
}

fn unhandled(err: tokio::task::JoinError) -> AppError {
    AppError::Unhandled {
        detail: err.to_string(),
    }
}

/// Waits for a termination signal, halts, then waits for done within the termination timeout.
async fn listen_signals(app: Application, mut signals: ShutdownSignals) -> Result<(), AppError> {
    let done = app.shared.done.clone();
    tokio::select! {
        signal = signals.recv() => {
            app.publish(Event::new(EventKind::SignalReceived).with_reason(signal));
            app.halt();

            let timeout = app.shared.cfg.termination_timeout();
            tokio::select! {
                _ = done.wait() => Ok(()),
                _ = time::sleep(timeout) => {
                    app.publish(Event::new(EventKind::TerminationTimeout).with_timeout(timeout));
                    Err(AppError::TermTimeout { timeout })
                }
            }
        }
        _ = done.wait() => Ok(()),
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("state", &self.state())
            .field("cfg", &self.shared.cfg)
            .finish()
    }
}
