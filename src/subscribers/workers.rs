//! One worker task per subscriber, each reading the event ring on its own.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::fanout::panic_message;
use crate::subscribers::Subscribe;

/// Running subscriber workers of one application.
pub(crate) struct SubscriberWorkers {
    stop: CancellationToken,
    tasks: JoinSet<()>,
}

impl SubscriberWorkers {
    /// Subscribes every worker to `bus` before returning, so nothing published
    /// afterwards is missed.
    pub(crate) fn spawn(subs: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Self {
        let stop = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for sub in subs {
            let rx = bus.subscribe();
            tasks.spawn(work(sub, rx, bus.clone(), stop.clone()));
        }
        Self { stop, tasks }
    }

    /// Lets workers finish what is already published, then aborts whatever is
    /// still running after `timeout`.
    pub(crate) async fn shutdown(mut self, timeout: Duration) {
        self.stop.cancel();
        let drained = time::timeout(timeout, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            self.tasks.abort_all();
        }
    }
}

async fn work(
    sub: Arc<dyn Subscribe>,
    mut rx: broadcast::Receiver<Event>,
    bus: Bus,
    stop: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = stop.cancelled() => break,
        };
        match msg {
            Ok(ev) => deliver(sub.as_ref(), &ev, &bus).await,
            Err(RecvError::Lagged(skipped)) => {
                let ev = Event::subscriber_overflow(sub.name(), skipped);
                deliver(sub.as_ref(), &ev, &bus).await;
            }
            Err(RecvError::Closed) => return,
        }
    }
    loop {
        match rx.try_recv() {
            Ok(ev) => deliver(sub.as_ref(), &ev, &bus).await,
            Err(TryRecvError::Lagged(skipped)) => {
                let ev = Event::subscriber_overflow(sub.name(), skipped);
                deliver(sub.as_ref(), &ev, &bus).await;
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

async fn deliver(sub: &dyn Subscribe, ev: &Event, bus: &Bus) {
    let Err(panic) = AssertUnwindSafe(sub.on_event(ev)).catch_unwind().await else {
        return;
    };
    // a subscriber that also panics on its own panic report must not loop
    if ev.kind != EventKind::SubscriberPanicked {
        bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*panic)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(EventKind, Option<String>)>>>;

    struct Recorder(Seen);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            let reason = event.reason.as_deref().map(str::to_owned);
            self.0.lock().unwrap().push((event.kind, reason));
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    fn kinds(seen: &Seen) -> Vec<EventKind> {
        seen.lock().unwrap().iter().map(|(kind, _)| *kind).collect()
    }

    #[tokio::test]
    async fn shutdown_delivers_published_events_in_order() {
        let bus = Bus::new(16);
        let seen = Seen::default();
        let workers = SubscriberWorkers::spawn(vec![Arc::new(Recorder(seen.clone()))], &bus);

        bus.publish(Event::new(EventKind::HaltRequested));
        bus.publish(Event::new(EventKind::ShutdownRequested));
        workers.shutdown(Duration::from_secs(1)).await;

        assert_eq!(
            kinds(&seen),
            vec![EventKind::HaltRequested, EventKind::ShutdownRequested]
        );
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported_and_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let seen = Seen::default();
        let workers = SubscriberWorkers::spawn(
            vec![Arc::new(Exploding), Arc::new(Recorder(seen.clone()))],
            &bus,
        );

        bus.publish(Event::new(EventKind::MainStarted));
        time::sleep(Duration::from_millis(20)).await;
        workers.shutdown(Duration::from_secs(1)).await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::MainStarted);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.component.as_deref(), Some("exploding"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            kinds(&seen),
            vec![EventKind::MainStarted, EventKind::SubscriberPanicked]
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_how_much_it_missed() {
        let bus = Bus::new(2);
        let seen = Seen::default();
        let workers = SubscriberWorkers::spawn(vec![Arc::new(Recorder(seen.clone()))], &bus);

        // the current-thread runtime does not run the worker until we yield
        for _ in 0..3 {
            bus.publish(Event::new(EventKind::ErrorDropped));
        }
        bus.publish(Event::new(EventKind::HaltRequested));
        bus.publish(Event::new(EventKind::ShutdownRequested));
        workers.shutdown(Duration::from_secs(1)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (
                    EventKind::SubscriberOverflow,
                    Some("lagged by 3 events".to_owned())
                ),
                (EventKind::HaltRequested, None),
                (EventKind::ShutdownRequested, None),
            ]
        );
    }

    #[tokio::test]
    async fn stuck_subscriber_is_abandoned_after_timeout() {
        struct Stuck;

        #[async_trait]
        impl Subscribe for Stuck {
            async fn on_event(&self, _event: &Event) {
                std::future::pending::<()>().await;
            }
        }

        let bus = Bus::new(4);
        let workers = SubscriberWorkers::spawn(vec![Arc::new(Stuck)], &bus);
        bus.publish(Event::new(EventKind::MainStarted));

        let started = time::Instant::now();
        workers.shutdown(Duration::from_millis(30)).await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
