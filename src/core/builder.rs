use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use super::orchestrator::Orchestrator;
use crate::{
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for an [`Orchestrator`] with optional subscribers.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive admission, drain and executor events through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the orchestrator.
    ///
    /// Creates the event bus and, when subscribers were given, spawns their
    /// workers plus one listener forwarding bus events to them. Must be called
    /// inside a tokio runtime.
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let stop = CancellationToken::new();
        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs, stop.clone());
        }
        Orchestrator::new_internal(self.cfg, bus, stop)
    }
}

/// Forwards bus events to `subs` until `stop` fires. Lagged events are skipped.
///
/// On stop, events already buffered for the listener are still delivered,
/// then the subscriber queues are closed and their workers awaited.
fn subscriber_listener(bus: &Bus, subs: SubscriberSet, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                res = rx.recv() => match res {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        subs.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    #[tokio::test]
    async fn dropping_the_orchestrator_releases_subscribers() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let orch = Orchestrator::builder(Config::default())
            .with_subscribers(vec![Arc::clone(&counter) as Arc<dyn Subscribe>])
            .build();
        orch.bus().publish(Event::new(EventKind::UnitAdmitted));
        drop(orch);

        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&counter) > 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("listener and subscriber workers exit");
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
