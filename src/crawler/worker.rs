//! Crawl worker - consumes crawl work from the bus
//!
//! Fetch concurrency is bounded by a semaphore: a permit is taken before a
//! message is received, so the worker never leases more messages than it
//! can work on. A stop signal is checked before every receive; crawls that
//! are already running are always joined before a drain returns.

use crate::crawler::{lock_store, CrawlCoordinator};
use crate::messaging::{Delivery, MessageBus};
use crate::storage::CrawlRecordStore;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Outcome of one drain of a topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Messages received from the bus
    pub received: usize,
    /// Messages handled and acked
    pub acked: usize,
    /// Messages left unacked for redelivery
    pub failed: usize,
}

/// Runs [`CrawlCoordinator::ensure_url_is_crawled`] for each message
pub struct CrawlWorker<S> {
    coordinator: CrawlCoordinator<S>,
    bus: Arc<dyn MessageBus>,
    semaphore: Arc<Semaphore>,
}

impl<S: CrawlRecordStore + Send + 'static> CrawlWorker<S> {
    /// Creates a worker
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Performs the crawls
    /// * `bus` - Where work is received from
    /// * `max_concurrent_fetches` - Upper bound on in-flight crawls (at least 1)
    pub fn new(
        coordinator: CrawlCoordinator<S>,
        bus: Arc<dyn MessageBus>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            coordinator,
            bus,
            semaphore: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Handles messages until the topic has nothing visible left
    ///
    /// Errors while handling one message are logged and leave that message
    /// for redelivery. A bus error while receiving ends the drain and is
    /// returned once the crawls already started have finished.
    pub async fn run_until_idle(&self, topic: &str) -> Result<WorkerSummary> {
        self.drain(topic, None).await
    }

    async fn drain(
        &self,
        topic: &str,
        stop: Option<&watch::Receiver<bool>>,
    ) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();
        let mut tasks = JoinSet::new();
        let mut receive_error = None;

        loop {
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                break;
            };

            if stop.is_some_and(|stop| *stop.borrow()) {
                break;
            }

            let delivery = match self.bus.receive(topic) {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(e) => {
                    receive_error = Some(e);
                    break;
                }
            };
            summary.received += 1;

            let coordinator = self.coordinator.clone();
            let bus = Arc::clone(&self.bus);
            tasks.spawn(async move {
                let _permit = permit;
                let result = handle_delivery(&coordinator, bus.as_ref(), &delivery).await;
                (delivery, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.acked += 1,
                Ok((delivery, Err(e))) => {
                    tracing::error!(
                        "Failed to handle message {} (attempt {}): {}",
                        delivery.message.event_id,
                        delivery.attempt,
                        e
                    );
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Crawl task did not complete: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if summary.received > 0 {
            tracing::info!(
                "Drained {}: {} received, {} acked, {} failed",
                topic,
                summary.received,
                summary.acked,
                summary.failed
            );
        }

        match receive_error {
            Some(e) => Err(e.into()),
            None => Ok(summary),
        }
    }

    /// Drains the topic over and over until Ctrl-C
    ///
    /// On Ctrl-C no further messages are received; crawls in flight are
    /// finished first.
    pub async fn run(&self, topic: &str, poll_interval: Duration) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Interrupted, stopping worker");
                    let _ = stop_tx.send(true);
                }
                Err(e) => {
                    tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                    // Keep the sender alive so the worker is not stopped
                    std::future::pending::<()>().await;
                }
            }
        });

        let result = self.run_until_stopped(topic, poll_interval, stop_rx).await;
        signal.abort();
        result
    }

    /// Drains the topic over and over, sleeping while it is empty, until
    /// `stop` turns true or its sender is dropped
    ///
    /// Bus errors are logged and retried after `poll_interval`.
    pub async fn run_until_stopped(
        &self,
        topic: &str,
        poll_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!("Worker consuming {}", topic);

        loop {
            if *stop.borrow() {
                return Ok(());
            }

            match self.drain(topic, Some(&stop)).await {
                Ok(summary) if summary.received > 0 => continue,
                Ok(_) => {}
                Err(e) => tracing::error!("Receiving from {} failed: {}", topic, e),
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

async fn handle_delivery<S: CrawlRecordStore>(
    coordinator: &CrawlCoordinator<S>,
    bus: &dyn MessageBus,
    delivery: &Delivery,
) -> Result<()> {
    let url_uuid = delivery.message.event.url_uuid();
    let url = {
        let storage = lock_store(coordinator.storage())?;
        storage.get_url_by_uuid(url_uuid)?
    };

    match url {
        Some(url) => coordinator.ensure_url_is_crawled(&url).await?,
        None => tracing::warn!(
            "Dropping message {}: no url with uuid {}",
            delivery.message.event_id,
            url_uuid
        ),
    }

    bus.ack(delivery)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_store::{BodyStore, MemoryBodyStore};
    use crate::config::UserAgentConfig;
    use crate::crawler::build_http_client;
    use crate::messaging::{BusError, BusResult, Event, MemoryBus, Message};
    use crate::storage::SqliteStorage;
    use crate::MarksyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Fails the receive call with the given index, delegating otherwise
    struct FlakyBus {
        inner: Arc<MemoryBus>,
        receives: AtomicUsize,
        fail_on: usize,
    }

    impl MessageBus for FlakyBus {
        fn publish(&self, event: &Event, topic: &str) -> BusResult<Message> {
            self.inner.publish(event, topic)
        }

        fn receive(&self, topic: &str) -> BusResult<Option<Delivery>> {
            if self.receives.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(BusError::LockPoisoned);
            }
            self.inner.receive(topic)
        }

        fn ack(&self, delivery: &Delivery) -> BusResult<()> {
            self.inner.ack(delivery)
        }

        fn pending(&self, topic: &str) -> BusResult<u64> {
            self.inner.pending(topic)
        }
    }

    fn publish_unknown(bus: &dyn MessageBus) {
        bus.publish(
            &Event::CrawlRequested {
                url_uuid: Uuid::new_v4(),
            },
            "crawls",
        )
        .unwrap();
    }

    fn create_worker(bus: Arc<dyn MessageBus>) -> CrawlWorker<SqliteStorage> {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let body_store: Arc<dyn BodyStore> = Arc::new(MemoryBodyStore::new());
        let client = build_http_client(
            &UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        let coordinator = CrawlCoordinator::new(storage, body_store, client, "bodies");
        CrawlWorker::new(coordinator, bus, 2)
    }

    #[tokio::test]
    async fn test_unknown_url_is_acked() {
        let bus = Arc::new(MemoryBus::default());
        let worker = create_worker(bus.clone());
        bus.publish(
            &Event::CrawlRequested {
                url_uuid: Uuid::new_v4(),
            },
            "crawls",
        )
        .unwrap();

        let summary = worker.run_until_idle("crawls").await.unwrap();

        assert_eq!(summary.received, 1);
        assert_eq!(summary.acked, 1);
        assert_eq!(bus.pending("crawls").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_topic() {
        let bus = Arc::new(MemoryBus::default());
        let worker = create_worker(bus.clone());

        let summary = worker.run_until_idle("crawls").await.unwrap();
        assert_eq!(summary, WorkerSummary::default());
    }

    #[tokio::test]
    async fn test_receive_error_joins_started_crawls() {
        let inner = Arc::new(MemoryBus::default());
        publish_unknown(inner.as_ref());
        publish_unknown(inner.as_ref());
        let worker = create_worker(Arc::new(FlakyBus {
            inner: inner.clone(),
            receives: AtomicUsize::new(0),
            fail_on: 1,
        }));

        let result = worker.run_until_idle("crawls").await;

        assert!(matches!(
            result,
            Err(MarksyncError::Bus(BusError::LockPoisoned))
        ));
        // The message received before the failure was still handled
        assert_eq!(inner.pending("crawls").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stopped_worker_receives_nothing() {
        let bus = Arc::new(MemoryBus::default());
        let worker = create_worker(bus.clone());
        publish_unknown(bus.as_ref());

        let (_stop_tx, stop_rx) = watch::channel(true);
        worker
            .run_until_stopped("crawls", Duration::from_millis(10), stop_rx)
            .await
            .unwrap();

        assert_eq!(bus.pending("crawls").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stop_wakes_idle_worker() {
        let bus = Arc::new(MemoryBus::default());
        let worker = create_worker(bus.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop_tx.send(true).unwrap();
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            worker.run_until_stopped("crawls", Duration::from_secs(3600), stop_rx),
        )
        .await
        .expect("worker kept sleeping after stop")
        .unwrap();
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_survives_bus_error() {
        let inner = Arc::new(MemoryBus::default());
        publish_unknown(inner.as_ref());
        let worker = create_worker(Arc::new(FlakyBus {
            inner: inner.clone(),
            receives: AtomicUsize::new(0),
            fail_on: 0,
        }));

        let (stop_tx, stop_rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop_tx.send(true).unwrap();
        });

        worker
            .run_until_stopped("crawls", Duration::from_millis(10), stop_rx)
            .await
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(inner.pending("crawls").unwrap(), 0);
    }
}
