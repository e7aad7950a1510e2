use serde::Serialize;

use super::rules::{can_edit, valid_targets};
use super::{Role, TicketStatus};
use crate::db::Ticket;

/// Banners and reminders shown alongside a ticket. Always derived from the
/// ticket snapshot, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReminders {
    pub part_number_required: bool,
    pub missing_bulk_sku: bool,
    pub npdi_form_available: bool,
    pub locked: bool,
}

pub fn reminders(ticket: &Ticket, role: Role) -> TicketReminders {
    let has_base_number = ticket.base_number().is_some();
    let in_process = ticket.status == TicketStatus::InProcess;

    TicketReminders {
        part_number_required: in_process && !has_base_number,
        missing_bulk_sku: matches!(ticket.status, TicketStatus::Submitted | TicketStatus::InProcess)
            && !ticket.has_bulk_sku(),
        npdi_form_available: role.is_privileged()
            && in_process
            && has_base_number
            && !ticket.is_npdi_handed_off(),
        locked: !can_edit(role, ticket.status) || ticket.is_npdi_handed_off(),
    }
}

/// Options for the status dropdown on this ticket. Empty once the ticket has
/// been handed off to NPDI, whatever its current status.
pub fn status_targets(ticket: &Ticket, role: Role) -> Vec<TicketStatus> {
    if ticket.is_npdi_handed_off() {
        return Vec::new();
    }
    valid_targets(role, ticket.status)
}
