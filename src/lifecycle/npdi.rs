//! NPDI initiation and completion.
//!
//! Initiating NPDI hands the ticket over to the external NPDI system: the
//! ticket number is replaced by the tracking number, the old number is kept
//! only in the history entry, and content stays locked from then on.

use chrono::{DateTime, Utc};

use super::transitions::{history_entry, require_privileged, LifecycleError, LifecycleResult};
use super::{Actor, TicketStatus};
use crate::db::{HistoryAction, HistoryDetails, NpdiRenameDetails, NpdiTracking, Ticket};

pub fn initiate_npdi(
    ticket: &Ticket,
    actor: &Actor,
    tracking_number: &str,
    now: DateTime<Utc>,
) -> LifecycleResult<Ticket> {
    require_privileged(actor, "initiate NPDI")?;

    if ticket.status != TicketStatus::InProcess {
        tracing::warn!(
            "NPDI initiation refused for ticket {}: status is {}",
            ticket.ticket_number,
            ticket.status
        );
        return Err(LifecycleError::PreconditionViolation(format!(
            "NPDI can only be initiated for in-process tickets; ticket {} is {}",
            ticket.ticket_number,
            ticket.status.display_name()
        )));
    }

    if ticket.is_npdi_handed_off() {
        return Err(LifecycleError::PreconditionViolation(format!(
            "NPDI was already initiated for ticket {}",
            ticket.ticket_number
        )));
    }

    if ticket.base_number().is_none() {
        return Err(LifecycleError::PreconditionViolation(format!(
            "Ticket {} needs a base part number before NPDI initiation",
            ticket.ticket_number
        )));
    }

    let tracking_number = tracking_number.trim();
    if tracking_number.is_empty() {
        return Err(LifecycleError::ValidationFailure(
            "NPDI tracking number cannot be empty".to_string(),
        ));
    }

    let previous_ticket_number = ticket.ticket_number.clone();

    let mut next = ticket.clone();
    next.npdi_tracking = Some(NpdiTracking {
        tracking_number: tracking_number.to_string(),
        initiated_by: actor.email.clone(),
        initiated_at: now,
    });
    next.ticket_number = tracking_number.to_string();
    next.status = TicketStatus::NpdiInitiated;
    next.updated_at = now;
    next.status_history.push(history_entry(
        actor,
        HistoryAction::NpdiInitiated,
        TicketStatus::NpdiInitiated,
        None,
        Some(HistoryDetails::NpdiRename(NpdiRenameDetails {
            previous_ticket_number: previous_ticket_number.clone(),
            new_ticket_number: tracking_number.to_string(),
            initiated_at: now,
        })),
        now,
    ));

    tracing::info!(
        "NPDI initiated by {}: ticket {} renamed to {}",
        actor.email,
        previous_ticket_number,
        tracking_number
    );
    Ok(next)
}

/// NPDI_INITIATED -> COMPLETED. The caller must pass `confirmed = true`
/// after asking the user.
pub fn mark_completed(
    ticket: &Ticket,
    actor: &Actor,
    confirmed: bool,
    now: DateTime<Utc>,
) -> LifecycleResult<Ticket> {
    require_privileged(actor, "mark tickets completed")?;

    if ticket.status != TicketStatus::NpdiInitiated {
        return Err(LifecycleError::PreconditionViolation(format!(
            "Only NPDI initiated tickets can be marked completed; ticket {} is {}",
            ticket.ticket_number,
            ticket.status.display_name()
        )));
    }

    if !confirmed {
        return Err(LifecycleError::ValidationFailure(
            "Marking a ticket completed requires explicit confirmation".to_string(),
        ));
    }

    let mut next = ticket.clone();
    next.status = TicketStatus::Completed;
    next.updated_at = now;
    next.status_history.push(history_entry(
        actor,
        HistoryAction::Completed,
        TicketStatus::Completed,
        None,
        None,
        now,
    ));

    tracing::info!("Ticket {} marked completed by {}", ticket.ticket_number, actor.email);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PartNumber;
    use crate::lifecycle::test_support::{t0, ticket_in};
    use crate::lifecycle::{can_edit, Role};

    fn ops() -> Actor {
        Actor::new("ops@example.com", Role::PmOps)
    }

    fn ready_ticket() -> Ticket {
        let mut ticket = ticket_in(TicketStatus::InProcess);
        ticket.part_number = Some(PartNumber {
            base_number: Some("775-0001".to_string()),
        });
        ticket
    }

    #[test]
    fn initiation_renames_and_locks() {
        let ticket = ready_ticket();
        let original_number = ticket.ticket_number.clone();

        let next = initiate_npdi(&ticket, &ops(), "NPDI-2025-0054", t0()).unwrap();

        assert_eq!(next.status, TicketStatus::NpdiInitiated);
        assert_eq!(next.ticket_number, "NPDI-2025-0054");
        assert_eq!(
            next.npdi_tracking,
            Some(NpdiTracking {
                tracking_number: "NPDI-2025-0054".to_string(),
                initiated_by: "ops@example.com".to_string(),
                initiated_at: t0(),
            })
        );
        for role in Role::ALL {
            assert!(!can_edit(role, next.status));
        }

        let renames: Vec<_> = next
            .status_history
            .iter()
            .filter_map(|e| e.npdi_rename())
            .collect();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].previous_ticket_number, original_number);
        assert_eq!(renames[0].new_ticket_number, "NPDI-2025-0054");
        assert_eq!(next.status_history.last().unwrap().action, HistoryAction::NpdiInitiated);
    }

    #[test]
    fn tracking_number_is_trimmed() {
        let next = initiate_npdi(&ready_ticket(), &ops(), "  100000000000000778902025\n", t0()).unwrap();
        assert_eq!(next.ticket_number, "100000000000000778902025");
    }

    #[test]
    fn second_initiation_is_a_precondition_violation() {
        let once = initiate_npdi(&ready_ticket(), &ops(), "NPDI-2025-0054", t0()).unwrap();
        assert!(matches!(
            initiate_npdi(&once, &ops(), "NPDI-2025-0055", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn submitted_ticket_is_rejected() {
        let ticket = ticket_in(TicketStatus::Submitted);
        assert!(matches!(
            initiate_npdi(&ticket, &ops(), "100000000000000778902025", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn whitespace_tracking_number_leaves_ticket_unchanged() {
        let ticket = ready_ticket();
        let before = ticket.clone();
        assert!(matches!(
            initiate_npdi(&ticket, &ops(), "  ", t0()),
            Err(LifecycleError::ValidationFailure(_))
        ));
        assert_eq!(ticket, before);
    }

    #[test]
    fn missing_part_number_is_a_precondition_violation() {
        let ticket = ticket_in(TicketStatus::InProcess);
        assert!(matches!(
            initiate_npdi(&ticket, &ops(), "NPDI-2025-0054", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn product_manager_cannot_initiate() {
        let pm = Actor::new("pm@example.com", Role::ProductManager);
        assert!(matches!(
            initiate_npdi(&ready_ticket(), &pm, "NPDI-2025-0054", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn mark_completed_requires_confirmation() {
        let initiated = initiate_npdi(&ready_ticket(), &ops(), "NPDI-2025-0054", t0()).unwrap();

        assert!(matches!(
            mark_completed(&initiated, &ops(), false, t0()),
            Err(LifecycleError::ValidationFailure(_))
        ));

        let done = mark_completed(&initiated, &ops(), true, t0()).unwrap();
        assert_eq!(done.status, TicketStatus::Completed);
        assert_eq!(done.ticket_number, "NPDI-2025-0054");
        assert_eq!(done.npdi_tracking, initiated.npdi_tracking);
        assert_eq!(done.status_history.last().unwrap().action, HistoryAction::Completed);
    }

    #[test]
    fn mark_completed_only_from_npdi_initiated() {
        let ticket = ready_ticket();
        assert!(matches!(
            mark_completed(&ticket, &ops(), true, t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));

        let initiated = initiate_npdi(&ticket, &ops(), "NPDI-2025-0054", t0()).unwrap();
        let pm = Actor::new("pm@example.com", Role::ProductManager);
        assert!(mark_completed(&initiated, &pm, true, t0()).is_err());
    }

    #[test]
    fn completed_ticket_cannot_be_reopened_or_renamed_again() {
        let initiated = initiate_npdi(&ready_ticket(), &ops(), "NPDI-2025-0054", t0()).unwrap();
        let done = mark_completed(&initiated, &ops(), true, t0()).unwrap();

        for target in [TicketStatus::InProcess, TicketStatus::Submitted, TicketStatus::Canceled] {
            assert!(matches!(
                crate::lifecycle::override_status(&done, &ops(), target, None, t0()),
                Err(LifecycleError::PreconditionViolation(_))
            ));
        }
        assert!(matches!(
            initiate_npdi(&done, &ops(), "NPDI-2025-0099", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
        assert_eq!(done.ticket_number, "NPDI-2025-0054");
    }

    #[test]
    fn tracked_ticket_is_never_renamed_twice() {
        // Even if the status was moved back by hand, the tracking record wins
        let initiated = initiate_npdi(&ready_ticket(), &ops(), "NPDI-2025-0054", t0()).unwrap();
        let mut reopened = initiated.clone();
        reopened.status = TicketStatus::InProcess;

        assert!(matches!(
            initiate_npdi(&reopened, &ops(), "NPDI-2025-0099", t0()),
            Err(LifecycleError::PreconditionViolation(_))
        ));
        let renames = reopened
            .status_history
            .iter()
            .filter(|e| e.npdi_rename().is_some())
            .count();
        assert_eq!(renames, 1);
    }
}
