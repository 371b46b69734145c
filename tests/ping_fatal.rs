//! A service that starts failing its pings takes the whole application down
//! with the ping error, after closing every service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use appvisor::{
    AppConfig, AppError, AppState, Application, HoldOn, KeeperConfig, MainFn, Scope, Service,
    ServiceKeeper, ServiceRef,
};
use async_trait::async_trait;

struct Flaky {
    healthy_pings: usize,
    pings: AtomicUsize,
    closed: AtomicBool,
}

#[async_trait]
impl Service for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn init(&self, _scope: Scope) -> Result<(), AppError> {
        Ok(())
    }

    async fn ping(&self, _scope: Scope) -> Result<(), AppError> {
        if self.pings.fetch_add(1, Ordering::SeqCst) >= self.healthy_pings {
            return Err(AppError::fail("connection reset"));
        }
        Ok(())
    }

    async fn close(&self, _scope: Scope) -> Result<(), AppError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn failing_ping_shuts_the_application_down() {
    let flaky = Arc::new(Flaky {
        healthy_pings: 2,
        pings: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    });
    let services: Vec<ServiceRef> = vec![flaky.clone()];
    let keeper = ServiceKeeper::new(
        services,
        KeeperConfig {
            ping_period: Duration::from_millis(15),
            ping_timeout: Duration::from_millis(50),
            shutdown_timeout: Duration::from_millis(200),
        },
    );

    let app = Application::builder(AppConfig::default())
        .with_main(MainFn::arc("server", |_scope: Scope, hold_on: HoldOn| async move {
            hold_on.wait().await;
            Ok::<_, AppError>(())
        }))
        .with_resources(Arc::new(keeper))
        .build();

    let res = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run finished");
    assert_eq!(
        res.map_err(|e| e.to_string()),
        Err("the following errors occurred:\nconnection reset".to_string())
    );
    assert_eq!(flaky.pings.load(Ordering::SeqCst), 3);
    assert!(flaky.closed.load(Ordering::SeqCst));
    assert_eq!(app.state(), AppState::Shutdown);
}
