//! # ServiceKeeper: parallel init, periodic ping, bounded release.
//!
//! ## Architecture
//! ```text
//! init(scope) ── Init → Ready
//!   └─► FanOut(scope.with_cancel()) ─► Service::init × N ─► AggregateError?
//!
//! watch(scope) ── Ready → Running
//! loop {
//!   ├─► stop latch closed  → Ok
//!   ├─► scope done         → scope.err()          (Shutdown sentinel → Ok)
//!   └─► tick (every ping_period, start-to-start)
//!         └─► FanOut(scope.with_timeout(ping_timeout)) ─► Service::ping × N
//!               ├─► stop latch closed → cycle abandoned, Ok
//!               └─► error             → PingCycleFailed, return it
//! }
//!
//! stop() ── Running | Ready → Shutdown, close stop latch
//!
//! release() ── Shutdown → Off
//!   └─► FanOut(background().with_timeout(shutdown_timeout)) ─► Service::close × N
//!         └─► deadline first → stragglers aborted, DeadlineExceeded kept next to other errors
//! ```
//!
//! ## Rules
//! - Ping is never started after stop was signalled.
//! - A ping cycle is bounded by `ping_timeout` even when a service ignores its scope.
//! - Release gets its full `shutdown_timeout` even though the application is already done.
//! - Per-service failures are published on the application bus when one is reachable
//!   through the init scope.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::config::KeeperConfig;
use crate::error::AppError;
use crate::events::{Bus, Event, EventKind};
use crate::fanout::FanOut;
use crate::latch::Latch;
use crate::lifecycle::{Resources, ServiceRef};
use crate::scope::Scope;
use crate::state::{Lifecycle, StateCell};

/// Lifecycle state of a [`ServiceKeeper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    /// Created; services untouched.
    Init,
    /// `init` called (whether or not every service initialized).
    Ready,
    /// Watch loop active.
    Running,
    /// Stop requested; the watch loop is ending or has ended.
    Shutdown,
    /// Services released.
    Off,
}

impl Lifecycle for KeeperState {
    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => KeeperState::Init,
            1 => KeeperState::Ready,
            2 => KeeperState::Running,
            3 => KeeperState::Shutdown,
            _ => KeeperState::Off,
        }
    }

    fn allows(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (KeeperState::Init, KeeperState::Ready)
                | (KeeperState::Ready, KeeperState::Running)
                | (KeeperState::Ready, KeeperState::Shutdown)
                | (KeeperState::Running, KeeperState::Shutdown)
                | (KeeperState::Shutdown, KeeperState::Off)
        )
    }
}

/// Holds the lifecycle of a group of services.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use appvisor::{AppConfig, Application, KeeperConfig, ServiceKeeper, ServiceRef};
///
/// # fn services() -> Vec<ServiceRef> { Vec::new() }
/// # async fn demo() {
/// let keeper = ServiceKeeper::new(services(), KeeperConfig::default());
/// let app = Application::builder(AppConfig::default())
///     .with_resources(Arc::new(keeper))
///     .build();
/// # }
/// ```
pub struct ServiceKeeper {
    services: Vec<ServiceRef>,
    cfg: KeeperConfig,
    state: StateCell<KeeperState>,
    stop: Latch,
    bus: OnceLock<Bus>,
}

impl ServiceKeeper {
    /// Creates a keeper for `services`; order carries no meaning.
    pub fn new(services: Vec<ServiceRef>, cfg: KeeperConfig) -> Self {
        Self {
            services,
            cfg,
            state: StateCell::new(KeeperState::Init),
            stop: Latch::new(),
            bus: OnceLock::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> KeeperState {
        self.state.load()
    }

    /// Effective configuration.
    pub fn config(&self) -> &KeeperConfig {
        &self.cfg
    }

    /// Number of kept services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True when the keeper holds no services.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Runs `op` for every service in parallel under `scope`, publishing each failure as `kind`
    /// (with `timeout` attached when given).
    fn fan_out<F, Fut>(
        &self,
        scope: &Scope,
        kind: EventKind,
        timeout: Option<Duration>,
        op: F,
    ) -> FanOut
    where
        F: Fn(ServiceRef, Scope) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let mut fan = FanOut::new();
        for svc in &self.services {
            let svc = svc.clone();
            let bus = self.bus.get().cloned();
            let op = op.clone();
            fan.spawn(scope, move |scope| async move {
                let name = svc.name().to_owned();
                let res = op(svc, scope).await;
                if let (Err(err), Some(bus)) = (&res, bus) {
                    let mut ev = Event::new(kind)
                        .with_component(name)
                        .with_reason(err.to_string());
                    if let Some(timeout) = timeout {
                        ev = ev.with_timeout(timeout);
                    }
                    bus.publish(ev);
                }
                res
            });
        }
        fan
    }

    async fn ping_cycle(&self, scope: &Scope) -> Result<(), AppError> {
        let timeout = self.cfg.ping_timeout();
        let (cycle, _guard) = scope.with_timeout(timeout);
        let fan = self.fan_out(
            &cycle,
            EventKind::ServicePingFailed,
            Some(timeout),
            |svc, scope| async move { svc.ping(scope).await },
        );
        join_within(fan, &cycle).await
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = self.bus.get() {
            bus.publish(ev);
        }
    }
}

/// Joins `fan` until `scope` is done, aborting stragglers.
///
/// When the only failure is the scope's own reason it is returned bare; otherwise every
/// collected error is kept in the aggregate.
async fn join_within(fan: FanOut, scope: &Scope) -> Result<(), AppError> {
    let Err(agg) = fan.wait_within(scope).await else {
        return Ok(());
    };
    let mut errors = agg.into_inner();
    if errors.len() == 1 && scope.err().as_ref() == errors.first() {
        return Err(errors.remove(0));
    }
    Err(AppError::Aggregate(errors.into()))
}

#[async_trait]
impl Resources for ServiceKeeper {
    async fn init(&self, scope: Scope) -> Result<(), AppError> {
        if !self.state.transition(KeeperState::Init, KeeperState::Ready) {
            return Err(AppError::WrongState);
        }
        if let Some(app) = scope.application() {
            let _ = self.bus.set(app.bus().clone());
        }

        let (scope, _guard) = scope.with_cancel();
        let fan = self.fan_out(&scope, EventKind::ServiceInitFailed, None, |svc, scope| async move {
            svc.init(scope).await
        });
        join_within(fan, &scope).await
    }

    async fn watch(&self, scope: Scope) -> Result<(), AppError> {
        if !self.state.transition(KeeperState::Ready, KeeperState::Running) {
            // stop raced ahead of watch: nothing to ping
            if self.state() == KeeperState::Shutdown {
                return Ok(());
            }
            return Err(AppError::WrongState);
        }

        let period = self.cfg.ping_period();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let res = loop {
            tokio::select! {
                biased;
                _ = self.stop.wait() => break Ok(()),
                _ = scope.done() => break Err(scope.err().unwrap_or(AppError::Canceled)),
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = self.stop.wait() => break Ok(()),
                        res = self.ping_cycle(&scope) => {
                            if let Err(err) = res {
                                if !err.is_shutdown() {
                                    self.publish(
                                        Event::new(EventKind::PingCycleFailed).with_reason(err.to_string()),
                                    );
                                }
                                break Err(err);
                            }
                        }
                    }
                }
            }
        };

        match res {
            Err(err) if err.is_shutdown() => Ok(()),
            other => other,
        }
    }

    fn stop(&self) {
        let stopped = self.state.transition(KeeperState::Running, KeeperState::Shutdown)
            || self.state.transition(KeeperState::Ready, KeeperState::Shutdown);
        if stopped {
            self.stop.close();
        }
    }

    async fn release(&self) -> Result<(), AppError> {
        if !self.state.transition(KeeperState::Shutdown, KeeperState::Off) {
            return Err(AppError::WrongState);
        }

        let (scope, _guard) = Scope::background().with_timeout(self.cfg.shutdown_timeout());
        let fan = self.fan_out(&scope, EventKind::ServiceCloseFailed, None, |svc, scope| async move {
            svc.close(scope).await
        });
        join_within(fan, &scope).await
    }
}

impl std::fmt::Debug for ServiceKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeeper")
            .field("services", &self.services.len())
            .field("state", &self.state())
            .field("cfg", &self.cfg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AppConfig, Application};
    use crate::latch::HoldOn;
    use crate::lifecycle::{MainFn, Service};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Stub {
        name: &'static str,
        delay: Duration,
        init_err: Option<&'static str>,
        ping_err: Option<&'static str>,
        ping_hangs: bool,
        close_hangs: bool,
        pings: AtomicUsize,
        closed: AtomicBool,
    }

    impl Stub {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Service for Stub {
        fn name(&self) -> &str {
            self.name
        }

        async fn init(&self, _scope: Scope) -> Result<(), AppError> {
            time::sleep(self.delay).await;
            self.init_err.map_or(Ok(()), |e| Err(AppError::fail(e)))
        }

        async fn ping(&self, _scope: Scope) -> Result<(), AppError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.ping_hangs {
                std::future::pending::<()>().await;
            }
            self.ping_err.map_or(Ok(()), |e| Err(AppError::fail(e)))
        }

        async fn close(&self, _scope: Scope) -> Result<(), AppError> {
            if self.close_hangs {
                std::future::pending::<()>().await;
            }
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast() -> KeeperConfig {
        KeeperConfig {
            ping_period: Duration::from_millis(20),
            ping_timeout: Duration::from_millis(30),
            shutdown_timeout: Duration::from_millis(30),
        }
    }

    #[tokio::test]
    async fn init_runs_in_parallel_and_aggregates_failures() {
        let services: Vec<ServiceRef> = vec![
            Arc::new(Stub {
                delay: Duration::from_millis(60),
                init_err: Some("a down"),
                ..Stub::named("a")
            }),
            Arc::new(Stub {
                delay: Duration::from_millis(40),
                ..Stub::named("b")
            }),
            Arc::new(Stub {
                delay: Duration::from_millis(10),
                init_err: Some("c down"),
                ..Stub::named("c")
            }),
        ];
        let keeper = ServiceKeeper::new(services, fast());

        let started = Instant::now();
        let err = keeper.init(Scope::background()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(170));

        assert_eq!(
            err.to_string(),
            "the following errors occurred:\nc down\na down"
        );
        assert_eq!(keeper.state(), KeeperState::Ready);
    }

    #[tokio::test]
    async fn single_failure_still_reports_through_aggregate() {
        let keeper = ServiceKeeper::new(
            vec![Arc::new(Stub {
                init_err: Some("boom"),
                ..Stub::named("only")
            })],
            fast(),
        );
        let err = keeper.init(Scope::background()).await.unwrap_err();
        assert_eq!(err.to_string(), "the following errors occurred:\nboom");
    }

    #[tokio::test]
    async fn calls_from_wrong_state_fail() {
        let keeper = ServiceKeeper::new(vec![Arc::new(Stub::named("a"))], fast());

        assert_eq!(keeper.watch(Scope::background()).await, Err(AppError::WrongState));
        assert_eq!(keeper.release().await, Err(AppError::WrongState));

        keeper.init(Scope::background()).await.unwrap();
        assert_eq!(keeper.init(Scope::background()).await, Err(AppError::WrongState));
        assert_eq!(keeper.release().await, Err(AppError::WrongState));
    }

    #[tokio::test]
    async fn ping_failure_ends_watch() {
        let svc = Arc::new(Stub {
            ping_err: Some("lost connection"),
            ..Stub::named("db")
        });
        let keeper = ServiceKeeper::new(vec![svc.clone()], fast());
        keeper.init(Scope::background()).await.unwrap();

        let started = Instant::now();
        let err = keeper.watch(Scope::background()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(
            err.to_string(),
            "the following errors occurred:\nlost connection"
        );
        assert_eq!(svc.pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hanging_ping_is_bounded_by_ping_timeout() {
        let keeper = ServiceKeeper::new(
            vec![Arc::new(Stub {
                ping_hangs: true,
                ..Stub::named("stuck")
            })],
            fast(),
        );
        keeper.init(Scope::background()).await.unwrap();

        let started = Instant::now();
        let err = keeper.watch(Scope::background()).await.unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
        assert_eq!(
            err,
            AppError::DeadlineExceeded {
                timeout: Duration::from_millis(30)
            }
        );
    }

    #[tokio::test]
    async fn failing_ping_is_kept_when_a_sibling_hits_the_deadline() {
        let keeper = ServiceKeeper::new(
            vec![
                Arc::new(Stub {
                    ping_err: Some("db down"),
                    ..Stub::named("broken")
                }),
                Arc::new(Stub {
                    ping_hangs: true,
                    ..Stub::named("slow")
                }),
            ],
            fast(),
        );
        keeper.init(Scope::background()).await.unwrap();

        let err = keeper.watch(Scope::background()).await.unwrap_err();
        let AppError::Aggregate(agg) = err else {
            panic!("expected aggregate, got {err:?}");
        };
        assert_eq!(
            agg.into_inner(),
            vec![
                AppError::fail("db down"),
                AppError::DeadlineExceeded {
                    timeout: Duration::from_millis(30)
                },
            ]
        );
    }

    #[tokio::test]
    async fn ping_failures_are_published_with_the_ping_timeout() {
        let keeper = ServiceKeeper::new(
            vec![Arc::new(Stub {
                ping_err: Some("lost connection"),
                ..Stub::named("db")
            })],
            fast(),
        );
        let app = Application::builder(AppConfig::default())
            .with_main(MainFn::arc("idle", |_scope: Scope, hold_on: HoldOn| async move {
                hold_on.wait().await;
                Ok::<_, AppError>(())
            }))
            .with_resources(Arc::new(keeper))
            .build();
        let mut rx = app.subscribe();

        assert!(app.run().await.is_err());

        let mut failed = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ServicePingFailed {
                failed.push((ev.component.as_deref().map(str::to_owned), ev.timeout_ms));
            }
        }
        assert_eq!(failed, vec![(Some("db".to_owned()), Some(30))]);
    }

    #[tokio::test]
    async fn concurrent_stop_ends_watch_and_release_closes_all() {
        let services: Vec<Arc<Stub>> = (0..3).map(|_| Arc::new(Stub::named("svc"))).collect();
        let keeper = Arc::new(ServiceKeeper::new(
            services.iter().map(|s| s.clone() as ServiceRef).collect(),
            fast(),
        ));
        keeper.init(Scope::background()).await.unwrap();

        let watcher = {
            let keeper = keeper.clone();
            tokio::spawn(async move { keeper.watch(Scope::background()).await })
        };
        time::sleep(Duration::from_millis(70)).await;

        let mut stoppers = Vec::new();
        for _ in 0..8 {
            let keeper = keeper.clone();
            stoppers.push(tokio::spawn(async move { keeper.stop() }));
        }
        for s in stoppers {
            s.await.unwrap();
        }

        assert_eq!(watcher.await.unwrap(), Ok(()));
        assert_eq!(keeper.state(), KeeperState::Shutdown);
        assert!(services.iter().all(|s| s.pings.load(Ordering::SeqCst) >= 1));

        assert_eq!(keeper.release().await, Ok(()));
        assert_eq!(keeper.state(), KeeperState::Off);
        assert!(services.iter().all(|s| s.closed.load(Ordering::SeqCst)));
    }

    #[tokio::test]
    async fn stop_before_watch_never_pings() {
        let svc = Arc::new(Stub::named("idle"));
        let keeper = ServiceKeeper::new(vec![svc.clone()], fast());
        keeper.init(Scope::background()).await.unwrap();

        keeper.stop();
        assert_eq!(keeper.watch(Scope::background()).await, Ok(()));
        assert_eq!(svc.pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn release_is_bounded_by_shutdown_timeout() {
        let keeper = ServiceKeeper::new(
            vec![Arc::new(Stub {
                close_hangs: true,
                ..Stub::named("sticky")
            })],
            fast(),
        );
        keeper.init(Scope::background()).await.unwrap();
        keeper.stop();

        let started = Instant::now();
        assert_eq!(
            keeper.release().await,
            Err(AppError::DeadlineExceeded {
                timeout: Duration::from_millis(30)
            })
        );
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancelled_caller_scope_ends_watch() {
        let keeper = ServiceKeeper::new(vec![Arc::new(Stub::named("a"))], fast());
        keeper.init(Scope::background()).await.unwrap();

        let (scope, guard) = Scope::background().with_cancel();
        drop(guard);
        assert_eq!(keeper.watch(scope).await, Err(AppError::Canceled));
    }

    #[tokio::test]
    async fn service_failures_are_published_on_the_application_bus() {
        let keeper = ServiceKeeper::new(
            vec![
                Arc::new(Stub {
                    init_err: Some("refused"),
                    ..Stub::named("postgres")
                }),
                Arc::new(Stub::named("cache")),
            ],
            fast(),
        );
        let app = Application::builder(AppConfig::default())
            .with_main(MainFn::arc("idle", |_scope: Scope, hold_on: HoldOn| async move {
                hold_on.wait().await;
                Ok::<_, AppError>(())
            }))
            .with_resources(Arc::new(keeper))
            .build();
        let mut rx = app.subscribe();

        assert!(app.run().await.is_err());

        let mut failed = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ServiceInitFailed {
                failed.push((ev.component.as_deref().map(str::to_owned), ev.timeout_ms));
            }
        }
        assert_eq!(failed, vec![(Some("postgres".to_owned()), None)]);
    }
}
