use std::sync::Arc;
use tokio::sync::broadcast;

use crate::db::Database;
use crate::lifecycle::TicketStatus;

/// Event sent to connected clients via SSE
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    TicketCreated {
        ticket_id: String,
        ticket_number: String,
    },
    TicketUpdated {
        ticket_id: String,
        version: i64,
    },
    StatusChanged {
        ticket_id: String,
        from_status: TicketStatus,
        to_status: TicketStatus,
    },
    /// The ticket number changed; clients holding the old number must re-fetch by id.
    NpdiInitiated {
        ticket_id: String,
        previous_ticket_number: String,
        new_ticket_number: String,
    },
    CommentAdded {
        ticket_id: String,
        comment_id: String,
    },
}

impl LiveEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LiveEvent::TicketCreated { .. } => "ticket_created",
            LiveEvent::TicketUpdated { .. } => "ticket_updated",
            LiveEvent::StatusChanged { .. } => "status_changed",
            LiveEvent::NpdiInitiated { .. } => "npdi_initiated",
            LiveEvent::CommentAdded { .. } => "comment_added",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            LiveEvent::TicketCreated { ticket_id, .. }
            | LiveEvent::TicketUpdated { ticket_id, .. }
            | LiveEvent::StatusChanged { ticket_id, .. }
            | LiveEvent::NpdiInitiated { ticket_id, .. }
            | LiveEvent::CommentAdded { ticket_id, .. } => ticket_id,
        }
    }
}

/// Shared application state for the API server
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub api_token: String,
    pub event_tx: broadcast::Sender<LiveEvent>,
}

impl AppState {
    pub fn new(db: Arc<Database>, api_token: String) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { db, api_token, event_tx }
    }

    pub fn broadcast(&self, event: LiveEvent) {
        tracing::debug!("Broadcasting event: {:?}", event);
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.event_tx.subscribe()
    }
}
