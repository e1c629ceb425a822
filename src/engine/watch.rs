use futures::stream::select_all;
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::aggregator::{StatusAggregator, StatusSummary};
use crate::models::appointment::APPOINTMENTS;
use crate::models::offer::OFFERS;
use crate::store::{Query, StoreError, SubscriptionEvent};

/// Live status summary for one user.
///
/// Dropping the handle (or calling [`SummaryWatch::unsubscribe`]) stops the
/// background task and releases the store subscriptions.
pub struct SummaryWatch {
    rx: watch::Receiver<StatusSummary>,
    task: JoinHandle<()>,
    aggregator: StatusAggregator,
}

impl SummaryWatch {
    pub fn latest(&self) -> StatusSummary {
        self.rx.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<StatusSummary> {
        self.rx.clone()
    }

    /// Waits for the next published summary. Returns `None` once the
    /// background task has stopped.
    pub async fn changed(&mut self) -> Option<StatusSummary> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stops the watch. Dropping the handle has the same effect.
    pub fn unsubscribe(self) {}
}

impl Drop for SummaryWatch {
    fn drop(&mut self) {
        self.task.abort();
        self.aggregator.metrics().active_watchers.dec();
    }
}

/// Recomputes the summary whenever one of the user's offers or appointments
/// changes. Identical consecutive summaries are not re-published.
pub async fn watch_summary(
    aggregator: StatusAggregator,
    user_id: String,
) -> Result<SummaryWatch, StoreError> {
    let store = aggregator.store().clone();
    let subscriptions = vec![
        store.subscribe(Query::collection(OFFERS).where_eq("authorId", user_id.as_str()))?,
        store.subscribe(Query::collection(OFFERS).where_eq("userId", user_id.as_str()))?,
        store.subscribe(Query::collection(APPOINTMENTS).where_eq("clientId", user_id.as_str()))?,
        store.subscribe(
            Query::collection(APPOINTMENTS).where_eq("couturierId", user_id.as_str()),
        )?,
    ];
    let mut changes = select_all(subscriptions);

    let initial = aggregator.summarize(Some(&user_id)).await;
    let (tx, rx) = watch::channel(initial);

    let task_aggregator = aggregator.clone();
    let task = tokio::spawn(async move {
        info!(user_id = %user_id, "status watch started");

        while let Some(event) = changes.next().await {
            if let SubscriptionEvent::Lagged(skipped) = event {
                debug!(user_id = %user_id, skipped, "status watch lagged; recomputing");
            }
            // Coalesce a burst of writes into one recomputation.
            while let Some(Some(_)) = changes.next().now_or_never() {}

            let summary = task_aggregator.summarize(Some(&user_id)).await;
            tx.send_if_modified(|current| {
                if *current == summary {
                    false
                } else {
                    *current = summary;
                    true
                }
            });

            if tx.is_closed() {
                break;
            }
        }

        info!(user_id = %user_id, "status watch stopped");
    });

    aggregator.metrics().active_watchers.inc();

    Ok(SummaryWatch {
        rx,
        task,
        aggregator,
    })
}
