//! Event type informer: an initial list followed by periodic resyncs into a
//! lock-free snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::capability::acquirer::AcquireError;
use crate::capability::source::{EventType, EventTypeSource};
use crate::lifecycle::resource::{CloseError, ResourceHandle};

#[derive(Debug, Default)]
struct Index {
    by_key: HashMap<String, EventType>,
}

impl Index {
    fn build(items: Vec<EventType>) -> Self {
        Self {
            by_key: items.into_iter().map(|et| (et.key(), et)).collect(),
        }
    }
}

/// Read side of the informer cache.
#[derive(Clone, Default)]
pub struct Lister {
    index: Arc<ArcSwap<Index>>,
}

impl Lister {
    pub fn get(&self, namespace: &str, name: &str) -> Option<EventType> {
        self.index.load().by_key.get(&format!("{namespace}/{name}")).cloned()
    }

    /// First event type in `namespace` describing `ce_type`.
    pub fn find_type(&self, namespace: &str, ce_type: &str) -> Option<EventType> {
        self.index
            .load()
            .by_key
            .values()
            .find(|et| et.namespace == namespace && et.event_type == ce_type)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.index.load().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn replace(&self, items: Vec<EventType>) {
        self.index.store(Arc::new(Index::build(items)));
    }
}

pub struct EventTypeInformer {
    source: Arc<dyn EventTypeSource>,
    resync: Duration,
}

/// A synced informer: its cache and its teardown handle.
pub struct StartedInformer {
    pub lister: Lister,
    pub handle: InformerHandle,
}

impl EventTypeInformer {
    pub fn new(source: Arc<dyn EventTypeSource>, resync: Duration) -> Self {
        Self { source, resync }
    }

    /// List once, then keep the cache fresh in the background.
    ///
    /// Returns only after the initial list has populated the cache.
    pub async fn start(self) -> Result<StartedInformer, AcquireError> {
        let items = self.source.list().await?;
        let lister = Lister::default();
        lister.replace(items);
        tracing::info!(event_types = lister.len(), "Event type informer synced");
        if lister.is_empty() {
            tracing::warn!("Control plane lists no event types; every ce-type is unregistered");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(resync_loop(self.source, self.resync, lister.clone(), stop_rx));

        Ok(StartedInformer {
            lister,
            handle: InformerHandle {
                stop: Some(stop_tx),
                task,
            },
        })
    }
}

async fn resync_loop(
    source: Arc<dyn EventTypeSource>,
    resync: Duration,
    lister: Lister,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval(resync);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the initial list already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        match source.list().await {
            Ok(items) => {
                lister.replace(items);
                tracing::debug!(event_types = lister.len(), "Event type cache resynced");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Event type resync failed, keeping previous snapshot");
            }
        }
    }
}

/// Running informer; closing it stops the resync loop.
pub struct InformerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ResourceHandle for InformerHandle {
    fn name(&self) -> &str {
        "event-type-informer"
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            (&mut self.task)
                .await
                .map_err(|e| CloseError::new(format!("informer task failed: {e}")))
        })
    }
}
