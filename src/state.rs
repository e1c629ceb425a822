use std::sync::Arc;

use crate::engine::aggregator::StatusAggregator;
use crate::observability::metrics::Metrics;
use crate::store::{DocumentStore, InMemoryStore};

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub aggregator: StatusAggregator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, in_query_limit: usize) -> Self {
        let metrics = Metrics::new();
        let aggregator = StatusAggregator::new(store.clone(), metrics.clone())
            .with_in_query_limit(in_query_limit);

        Self {
            store,
            aggregator,
            metrics,
        }
    }

    pub fn in_memory(event_buffer_size: usize, in_query_limit: usize) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new(event_buffer_size)),
            in_query_limit,
        )
    }
}
