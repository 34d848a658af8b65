use crate::error::EngineError;
use crate::{AttributionReport, AttributionService};
use core_types::Filter;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
struct InFlight {
    generation: u64,
    handle: Option<AbortHandle>,
}

/// The latest attribution batch for an interactive consumer.
///
/// Each `apply_filter` supersedes the previous one: the older batch is aborted, and a batch
/// that still finishes late is discarded rather than published. Subscribers only ever see
/// whole batches, always for the most recently applied filter.
pub struct AttributionView {
    service: Arc<AttributionService>,
    in_flight: Mutex<InFlight>,
    published: watch::Sender<Option<Arc<AttributionReport>>>,
}

impl AttributionView {
    pub fn new(service: Arc<AttributionService>) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            service,
            in_flight: Mutex::new(InFlight::default()),
            published,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AttributionReport>>> {
        self.published.subscribe()
    }

    /// The most recently published batch.
    pub fn current(&self) -> Option<Arc<AttributionReport>> {
        self.published.borrow().clone()
    }

    pub async fn apply_filter(&self, filter: Filter) -> Result<Arc<AttributionReport>, EngineError> {
        let (generation, task) = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(previous) = in_flight.handle.take() {
                previous.abort();
                tracing::debug!(generation = in_flight.generation, "Aborted superseded attribution load");
            }
            in_flight.generation += 1;

            let service = Arc::clone(&self.service);
            let task = tokio::spawn(async move { service.load_attribution(filter).await });
            in_flight.handle = Some(task.abort_handle());
            (in_flight.generation, task)
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => return Err(EngineError::Superseded),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.generation != generation {
            tracing::debug!(generation, latest = in_flight.generation, "Discarded late attribution batch");
            return Err(EngineError::Superseded);
        }
        in_flight.handle = None;

        let report = Arc::new(result?);
        self.published.send_replace(Some(Arc::clone(&report)));
        Ok(report)
    }
}
