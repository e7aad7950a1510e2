//! Guarded ticket mutations.
//!
//! Every operation takes the current snapshot and returns the complete new
//! record; nothing here touches storage. Callers persist the result with a
//! single `Database::commit_ticket`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::rules::{can_edit, can_edit_pricing, can_submit, check_transition, TransitionPermission};
use super::{Actor, TicketStatus};
use crate::db::{
    HistoryAction, HistoryDetails, PartNumber, SkuPricing, SkuType, SkuVariant, StatusChangeDetails,
    StatusHistoryEntry, Ticket, UpdateTicket,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Well-formed request that the current ticket state or role forbids.
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    /// Malformed input, rejected before any mutation.
    #[error("Validation failure: {0}")]
    ValidationFailure(String),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

pub(crate) fn history_entry(
    actor: &Actor,
    action: HistoryAction,
    status: TicketStatus,
    reason: Option<String>,
    details: Option<HistoryDetails>,
    now: DateTime<Utc>,
) -> StatusHistoryEntry {
    StatusHistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        action,
        status,
        changed_at: now,
        changed_by: actor.email.clone(),
        changed_by_role: actor.role,
        reason,
        details,
    }
}

pub(crate) fn require_privileged(actor: &Actor, action: &str) -> LifecycleResult<()> {
    if actor.is_privileged() {
        Ok(())
    } else {
        tracing::warn!("{} ({}) attempted to {}", actor.email, actor.role, action);
        Err(LifecycleError::PreconditionViolation(format!(
            "{} cannot {}",
            actor.role, action
        )))
    }
}

fn require_editable(ticket: &Ticket, actor: &Actor) -> LifecycleResult<()> {
    if can_edit(actor.role, ticket.status) && !ticket.is_npdi_handed_off() {
        Ok(())
    } else {
        tracing::warn!(
            "Refused edit of ticket {} in {} by {} ({})",
            ticket.ticket_number,
            ticket.status,
            actor.email,
            actor.role
        );
        Err(LifecycleError::PreconditionViolation(format!(
            "Ticket {} is not editable by {} while {}",
            ticket.ticket_number,
            actor.role,
            ticket.status.display_name()
        )))
    }
}

/// At most one BULK variant per ticket.
pub fn validate_sku_variants(variants: &[SkuVariant]) -> LifecycleResult<()> {
    let bulk_count = variants.iter().filter(|v| v.sku_type == SkuType::Bulk).count();
    if bulk_count > 1 {
        return Err(LifecycleError::ValidationFailure(format!(
            "Only one BULK SKU is allowed per ticket, found {}",
            bulk_count
        )));
    }
    Ok(())
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// DRAFT -> SUBMITTED.
pub fn submit(ticket: &Ticket, actor: &Actor, now: DateTime<Utc>) -> LifecycleResult<Ticket> {
    if !can_submit(actor.role, ticket.status) {
        return Err(LifecycleError::PreconditionViolation(format!(
            "Only draft tickets can be submitted; ticket {} is {}",
            ticket.ticket_number,
            ticket.status.display_name()
        )));
    }

    let mut next = ticket.clone();
    next.status = TicketStatus::Submitted;
    next.updated_at = now;
    next.status_history.push(history_entry(
        actor,
        HistoryAction::Submitted,
        TicketStatus::Submitted,
        None,
        None,
        now,
    ));

    tracing::info!("Ticket {} submitted by {}", ticket.ticket_number, actor.email);
    Ok(next)
}

/// Free-form status change from the PM-Ops/Admin dropdown.
pub fn override_status(
    ticket: &Ticket,
    actor: &Actor,
    target: TicketStatus,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> LifecycleResult<Ticket> {
    require_privileged(actor, "change ticket status")?;

    if ticket.status == TicketStatus::NpdiInitiated {
        return Err(LifecycleError::PreconditionViolation(
            "NPDI initiated tickets can only be marked completed".to_string(),
        ));
    }
    if ticket.is_npdi_handed_off() && target != TicketStatus::Completed {
        tracing::warn!(
            "Refused move of handed-off ticket {} to {} by {}",
            ticket.ticket_number,
            target,
            actor.email
        );
        return Err(LifecycleError::PreconditionViolation(format!(
            "Ticket {} was handed off to NPDI and cannot be reopened",
            ticket.ticket_number
        )));
    }
    if target == TicketStatus::NpdiInitiated {
        return Err(LifecycleError::PreconditionViolation(
            "NPDI_INITIATED can only be reached by initiating NPDI".to_string(),
        ));
    }

    if let TransitionPermission::Denied(reason) = check_transition(actor.role, ticket.status, target) {
        return Err(LifecycleError::PreconditionViolation(reason));
    }

    if ticket.status == target {
        return Ok(ticket.clone());
    }

    let mut next = ticket.clone();
    next.status = target;
    next.updated_at = now;
    next.status_history.push(history_entry(
        actor,
        HistoryAction::StatusChanged,
        target,
        clean_reason(reason),
        Some(HistoryDetails::StatusChange(StatusChangeDetails {
            previous_status: ticket.status,
        })),
        now,
    ));

    tracing::info!(
        "Ticket {} moved from {} to {} by {}",
        ticket.ticket_number,
        ticket.status,
        target,
        actor.email
    );
    Ok(next)
}

/// PM-Ops part number / SKU assignment.
pub fn assign_part_number(
    ticket: &Ticket,
    actor: &Actor,
    base_number: &str,
    sku_variants: Option<Vec<SkuVariant>>,
    now: DateTime<Utc>,
) -> LifecycleResult<Ticket> {
    require_privileged(actor, "assign part numbers")?;
    require_editable(ticket, actor)?;

    if !matches!(ticket.status, TicketStatus::Submitted | TicketStatus::InProcess) {
        return Err(LifecycleError::PreconditionViolation(format!(
            "Part numbers are assigned to submitted or in-process tickets; ticket {} is {}",
            ticket.ticket_number,
            ticket.status.display_name()
        )));
    }

    let base_number = base_number.trim();
    if base_number.is_empty() {
        return Err(LifecycleError::ValidationFailure(
            "Base part number cannot be empty".to_string(),
        ));
    }

    if let Some(ref variants) = sku_variants {
        validate_sku_variants(variants)?;
        // Pricing is never editable as part of SKU assignment.
        if sku_pricing_changed(&ticket.sku_variants, variants) {
            return Err(LifecycleError::PreconditionViolation(
                "SKU assignment cannot change pricing".to_string(),
            ));
        }
    }

    let mut next = ticket.clone();
    next.part_number = Some(PartNumber {
        base_number: Some(base_number.to_string()),
    });
    if let Some(variants) = sku_variants {
        next.sku_variants = variants;
    }
    next.updated_at = now;
    next.status_history.push(history_entry(
        actor,
        HistoryAction::PartNumberAssigned,
        ticket.status,
        Some(format!("Base part number {}", base_number)),
        None,
        now,
    ));

    tracing::info!(
        "Part number {} assigned to ticket {} by {}",
        base_number,
        ticket.ticket_number,
        actor.email
    );
    Ok(next)
}

/// Pricing counts as changed when a priced variant disappears, its price
/// differs, or a new variant arrives already priced. Unpriced additions and
/// SKU code edits are not pricing edits.
fn sku_pricing_changed(current: &[SkuVariant], proposed: &[SkuVariant]) -> bool {
    let mut unmatched: Vec<(SkuType, &SkuPricing)> = current
        .iter()
        .filter_map(|v| v.pricing.as_ref().map(|p| (v.sku_type, p)))
        .collect();

    for variant in proposed {
        let Some(pricing) = variant.pricing.as_ref() else {
            continue;
        };
        match unmatched
            .iter()
            .position(|(sku_type, existing)| *sku_type == variant.sku_type && *existing == pricing)
        {
            Some(index) => {
                unmatched.swap_remove(index);
            }
            None => return true,
        }
    }

    !unmatched.is_empty()
}

/// Server-side field patch. The request implies the actor is in edit mode.
pub fn apply_update(
    ticket: &Ticket,
    actor: &Actor,
    patch: &UpdateTicket,
    now: DateTime<Utc>,
) -> LifecycleResult<Ticket> {
    require_editable(ticket, actor)?;

    let pricing_changed = patch
        .pricing_data
        .as_ref()
        .is_some_and(|p| *p != ticket.pricing_data)
        || patch
            .sku_variants
            .as_ref()
            .is_some_and(|skus| sku_pricing_changed(&ticket.sku_variants, skus));
    if pricing_changed && !can_edit_pricing(actor.role, ticket.status, true) {
        return Err(LifecycleError::PreconditionViolation(format!(
            "Pricing is not editable by {} while {}",
            actor.role,
            ticket.status.display_name()
        )));
    }

    if let Some(ref quality) = patch.quality {
        if quality
            .attributes
            .as_ref()
            .is_some_and(|attrs| *attrs != ticket.quality.attributes)
        {
            return Err(LifecycleError::PreconditionViolation(
                "Quality attributes are fixed once the ticket is created".to_string(),
            ));
        }
    }

    if let Some(ref name) = patch.product_name {
        if name.trim().is_empty() {
            return Err(LifecycleError::ValidationFailure(
                "Product name cannot be empty".to_string(),
            ));
        }
    }

    if let Some(ref variants) = patch.sku_variants {
        validate_sku_variants(variants)?;
    }

    let mut next = ticket.clone();
    if let Some(ref name) = patch.product_name {
        next.product_name = name.trim().to_string();
    }
    if let Some(priority) = patch.priority {
        next.priority = priority;
    }
    if let Some(ref variants) = patch.sku_variants {
        next.sku_variants = variants.clone();
    }
    if let Some(ref pricing) = patch.pricing_data {
        next.pricing_data = pricing.clone();
    }
    if let Some(ref chemical) = patch.chemical_properties {
        next.chemical_properties = chemical.clone();
    }
    if let Some(ref quality) = patch.quality {
        if quality.mq_quality_level.is_some() {
            next.quality.mq_quality_level = quality.mq_quality_level.clone();
        }
    }
    if let Some(ref composition) = patch.composition {
        next.composition = composition.clone();
    }
    if let Some(ref corpbase) = patch.corpbase_data {
        next.corpbase_data = corpbase.clone();
    }
    if let Some(ref hazard) = patch.hazard_classification {
        next.hazard_classification = hazard.clone();
    }
    next.updated_at = now;

    tracing::debug!("Ticket {} updated by {}", ticket.ticket_number, actor.email);
    Ok(next)
}
