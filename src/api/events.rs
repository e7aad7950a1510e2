use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::{convert::Infallible, time::Duration};
use tokio_stream::StreamExt;

use super::state::{AppState, LiveEvent};

fn to_sse(event: &LiveEvent) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
        Err(e) => {
            tracing::error!("Failed to serialize SSE event: {}", e);
            None
        }
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(30))
        .text("ping")
}

/// Server-Sent Events endpoint for real-time updates
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| match result {
            Ok(event) => to_sse(&event),
            Err(e) => {
                tracing::warn!("SSE broadcast lag: {}", e);
                None
            }
        });

    Sse::new(stream).keep_alive(keep_alive())
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct SseFilter {
    /// Comma-separated event types, e.g. `status_changed,npdi_initiated`
    #[serde(default)]
    pub types: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
}

pub async fn sse_filtered(
    State(state): State<AppState>,
    Query(filter): Query<SseFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let type_filter: Option<Vec<String>> = filter.types.map(|t| {
        t.split(',').map(|s| s.trim().to_string()).collect()
    });
    let ticket_filter = filter.ticket_id;

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(move |result| match result {
            Ok(event) if event_matches_filter(&event, &type_filter, &ticket_filter) => to_sse(&event),
            _ => None,
        });

    Sse::new(stream).keep_alive(keep_alive())
}

fn event_matches_filter(
    event: &LiveEvent,
    type_filter: &Option<Vec<String>>,
    ticket_filter: &Option<String>,
) -> bool {
    if let Some(ref types) = type_filter {
        if !types.iter().any(|t| t == event.event_type()) {
            return false;
        }
    }

    if let Some(ref ticket_id) = ticket_filter {
        if event.ticket_id() != ticket_id {
            return false;
        }
    }

    true
}
