//! HTTP surface of the aggregator

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::protocol::{HEALTH_PATH, RECORD_EVENTS_PATH};
use crate::record::{EventsRecordBatch, RecordReply};

use super::state::{BatchCounter, RecordStore};

#[derive(Clone)]
pub(crate) struct ServiceState {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) counter: Arc<BatchCounter>,
}

pub(crate) fn router(state: ServiceState, max_message_bytes: usize) -> Router {
    Router::new()
        .route(RECORD_EVENTS_PATH, post(record_events))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::max(max_message_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Merge every record of the batch, then count the call once
async fn record_events(
    State(state): State<ServiceState>,
    Json(batch): Json<EventsRecordBatch>,
) -> Json<RecordReply> {
    let count = batch.items.len();
    let events = batch.event_count();

    for record in batch.items {
        let class = record.class;
        let offered = record.events.len();

        match state.store.merge(&class, record.events) {
            Some(outcome) => {
                for event_id in &outcome.duplicates {
                    tracing::warn!(%class, %event_id, "Duplicate event, keeping first timestamp");
                }
                tracing::debug!(%class, offered, inserted = outcome.inserted, "Merged events record");
            }
            None => {
                tracing::warn!(%class, offered, "Ignoring events record of unknown class");
            }
        }
    }

    let received = state.counter.signal();
    tracing::info!(records = count, events, batches = received, "Events records batch merged");

    Json(RecordReply {
        count: u32::try_from(count).unwrap_or(u32::MAX),
    })
}
