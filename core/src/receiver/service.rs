//! HTTP surface of the receiver

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{EventKind, CE_ID, CE_TYPE};
use crate::record::EventTimestamp;

#[derive(Clone)]
pub(crate) struct ServiceState {
    pub(crate) received: mpsc::Sender<EventTimestamp>,
    pub(crate) end: CancellationToken,
}

pub(crate) fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .with_state(state)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn receive_event(State(state): State<ServiceState>, headers: HeaderMap) -> StatusCode {
    // Stamp before anything else can delay us
    let at = Utc::now();

    let Some(event_id) = header(&headers, CE_ID).filter(|id| !id.is_empty()) else {
        tracing::debug!("Rejecting event without ce-id");
        return StatusCode::BAD_REQUEST;
    };
    let event_type = header(&headers, CE_TYPE).unwrap_or_default();

    match EventKind::from_type(event_type) {
        EventKind::Measured => {
            let timestamp = EventTimestamp::new(event_id, at);
            if state.received.send(timestamp).await.is_err() {
                tracing::warn!(%event_id, "Received events stream closed, dropping event");
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }
        EventKind::Gc => {
            // Nothing to reclaim explicitly; the marker only delimits phases
            tracing::info!(%event_id, "GC boundary reached");
        }
        EventKind::End => {
            tracing::info!(%event_id, "End marker received, stopping receiver");
            state.end.cancel();
        }
    }

    StatusCode::ACCEPTED
}
