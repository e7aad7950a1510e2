//! HTTP handlers.
//!
//! Each mutating handler loads a fresh snapshot, runs the same lifecycle guard
//! the form uses, and persists the computed ticket with one `commit_ticket`.
//! The stored version is the guard against concurrent writers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::auth::ActingUser;
use super::error::{ApiResult, AppError};
use super::state::{AppState, LiveEvent};
use super::types::*;
use crate::db::{Comment, CreateComment, CreateTicket, StatusHistoryEntry, Ticket};
use crate::lifecycle::{self, EditMode, TicketStatus, RULES_VERSION};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn health_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.db.count_tickets() {
        Ok(ticket_count) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "rulesVersion": RULES_VERSION,
                "database": "connected",
                "ticketCount": ticket_count
            })),
        ),
        Err(e) => {
            tracing::error!("Health check could not reach the database: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rulesVersion": RULES_VERSION,
                    "database": "error",
                    "error": e.to_string()
                })),
            )
        }
    }
}

fn check_version(expected: Option<i64>, ticket: &Ticket) -> ApiResult<()> {
    match expected {
        Some(v) if v != ticket.version => {
            tracing::debug!(
                "Stale write to ticket {}: client has version {}, stored is {}",
                ticket.id,
                v,
                ticket.version
            );
            Err(AppError::stale(v, ticket.version))
        }
        _ => Ok(()),
    }
}

/// Persists `next` over `current` and announces the change.
fn commit(state: &AppState, current: &Ticket, next: Ticket) -> ApiResult<Ticket> {
    let saved = state.db.commit_ticket(&next, current.version)?;

    if saved.status != current.status {
        state.broadcast(LiveEvent::StatusChanged {
            ticket_id: saved.id.clone(),
            from_status: current.status,
            to_status: saved.status,
        });
    }
    state.broadcast(LiveEvent::TicketUpdated {
        ticket_id: saved.id.clone(),
        version: saved.version,
    });

    Ok(saved)
}

// ===== Tickets =====

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketListQuery>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            TicketStatus::parse(s).ok_or_else(|| AppError::bad_request(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };
    let tickets = state.db.list_tickets(status)?;
    Ok(Json(tickets))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Json(req): Json<CreateTicket>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    if req.product_name.trim().is_empty() {
        return Err(AppError::validation("Product name cannot be empty"));
    }
    lifecycle::validate_sku_variants(&req.sku_variants)?;

    let ticket = state.db.create_ticket(&req, &actor)?;

    state.broadcast(LiveEvent::TicketCreated {
        ticket_id: ticket.id.clone(),
        ticket_number: ticket.ticket_number.clone(),
    });

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.db.get_ticket(&ticket_id)?;
    Ok(Json(ticket))
}

pub async fn get_ticket_by_number(
    State(state): State<AppState>,
    Path(ticket_number): Path<String>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.db.get_ticket_by_number(&ticket_number)?;
    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(req): Json<UpdateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::apply_update(&ticket, &actor, &req.patch, Utc::now())?;
    Ok(Json(commit(&state, &ticket, next)?))
}

pub async fn get_permissions(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Query(query): Query<PermissionsQuery>,
) -> ApiResult<Json<PermissionsResponse>> {
    let mode = match query.mode.as_deref() {
        Some(m) => EditMode::parse(m).ok_or_else(|| AppError::bad_request(format!("Unknown mode: {}", m)))?,
        None => EditMode::default(),
    };
    let ticket = state.db.get_ticket(&ticket_id)?;

    Ok(Json(PermissionsResponse {
        ticket_id: ticket.id.clone(),
        ticket_number: ticket.ticket_number.clone(),
        status: ticket.status,
        role: actor.role,
        mode,
        rules_version: RULES_VERSION,
        permissions: lifecycle::resolve(actor.role, ticket.status, mode),
        can_submit: lifecycle::can_submit(actor.role, ticket.status),
        sections: lifecycle::section_map(actor.role, ticket.status, mode),
        valid_targets: lifecycle::status_targets(&ticket, actor.role),
        reminders: lifecycle::reminders(&ticket, actor.role),
    }))
}

// ===== Lifecycle =====

pub async fn submit_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    req: Option<Json<SubmitRequest>>,
) -> ApiResult<Json<Ticket>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::submit(&ticket, &actor, Utc::now())?;
    Ok(Json(commit(&state, &ticket, next)?))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(req): Json<StatusChangeRequest>,
) -> ApiResult<Json<Ticket>> {
    let target = TicketStatus::parse(&req.status)
        .ok_or_else(|| AppError::bad_request(format!("Unknown status: {}", req.status)))?;
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::override_status(&ticket, &actor, target, req.reason, Utc::now())?;
    Ok(Json(commit(&state, &ticket, next)?))
}

pub async fn assign_part_number(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(req): Json<AssignPartNumberRequest>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::assign_part_number(&ticket, &actor, &req.base_number, req.sku_variants, Utc::now())?;
    Ok(Json(commit(&state, &ticket, next)?))
}

pub async fn initiate_npdi(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(req): Json<InitiateNpdiRequest>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::initiate_npdi(&ticket, &actor, &req.tracking_number, Utc::now())?;
    let saved = commit(&state, &ticket, next)?;

    state.broadcast(LiveEvent::NpdiInitiated {
        ticket_id: saved.id.clone(),
        previous_ticket_number: ticket.ticket_number.clone(),
        new_ticket_number: saved.ticket_number.clone(),
    });

    Ok(Json(saved))
}

pub async fn complete_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    req: Option<Json<CompleteRequest>>,
) -> ApiResult<Json<Ticket>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let ticket = state.db.get_ticket(&ticket_id)?;
    check_version(req.version, &ticket)?;

    let next = lifecycle::mark_completed(&ticket, &actor, req.confirmed, Utc::now())?;
    Ok(Json(commit(&state, &ticket, next)?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<Vec<StatusHistoryEntry>>> {
    let history = state.db.get_status_history(&ticket_id)?;
    Ok(Json(history))
}

// ===== Comments =====

pub async fn list_comments(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    state.db.get_ticket(&ticket_id)?;
    let comments = state.db.get_comments(&ticket_id)?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    state.db.get_ticket(&ticket_id)?;

    let comment = state.db.add_comment(&CreateComment {
        ticket_id: ticket_id.clone(),
        author_email: actor.email,
        author_role: actor.role,
        body: req.body,
    })?;

    state.broadcast(LiveEvent::CommentAdded {
        ticket_id,
        comment_id: comment.id.clone(),
    });

    Ok((StatusCode::CREATED, Json(comment)))
}
