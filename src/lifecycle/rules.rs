use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{Role, TicketStatus};

/// Bumped whenever a row of `PERMISSION_TABLE` changes.
///
/// v1 locked content only at NPDI_INITIATED. v2 also locks COMPLETED and
/// CANCELED for every role.
pub const RULES_VERSION: u32 = 2;

/// When pricing fields may be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingGrant {
    Never,
    Always,
    /// Only while the actor has deliberately entered edit mode.
    InEditMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRule {
    pub role: Role,
    pub status: TicketStatus,
    pub edit_content: bool,
    pub pricing: PricingGrant,
}

const fn rule(role: Role, status: TicketStatus, edit_content: bool, pricing: PricingGrant) -> PermissionRule {
    PermissionRule { role, status, edit_content, pricing }
}

use PricingGrant::{Always, InEditMode, Never};
use Role::{Admin, PmOps, ProductManager};
use TicketStatus::{Canceled, Completed, Draft, InProcess, NpdiInitiated, Submitted};

/// Role × status → permission. Every pair must appear exactly once.
pub const PERMISSION_TABLE: &[PermissionRule] = &[
    rule(ProductManager, Draft, true, Always),
    rule(ProductManager, Submitted, true, Always),
    rule(ProductManager, InProcess, false, Never),
    rule(ProductManager, NpdiInitiated, false, Never),
    rule(ProductManager, Completed, false, Never),
    rule(ProductManager, Canceled, false, Never),
    rule(PmOps, Draft, true, Never),
    rule(PmOps, Submitted, true, Never),
    rule(PmOps, InProcess, true, InEditMode),
    rule(PmOps, NpdiInitiated, false, Never),
    rule(PmOps, Completed, false, Never),
    rule(PmOps, Canceled, false, Never),
    rule(Admin, Draft, true, Never),
    rule(Admin, Submitted, true, Never),
    rule(Admin, InProcess, true, InEditMode),
    rule(Admin, NpdiInitiated, false, Never),
    rule(Admin, Completed, false, Never),
    rule(Admin, Canceled, false, Never),
];

static RULE_INDEX: Lazy<HashMap<(Role, TicketStatus), &'static PermissionRule>> = Lazy::new(|| {
    PERMISSION_TABLE
        .iter()
        .map(|r| ((r.role, r.status), r))
        .collect()
});

pub fn rule_for(role: Role, status: TicketStatus) -> Option<&'static PermissionRule> {
    RULE_INDEX.get(&(role, status)).copied()
}

/// Whether `role` may edit ticket content while the ticket is in `status`.
pub fn can_edit(role: Role, status: TicketStatus) -> bool {
    // NPDI_INITIATED is locked for everyone regardless of what the table says
    if status == NpdiInitiated {
        return false;
    }
    rule_for(role, status).is_some_and(|r| r.edit_content)
}

/// Whether pricing fields are mutable for `role` in `status`.
pub fn can_edit_pricing(role: Role, status: TicketStatus, edit_mode_active: bool) -> bool {
    match rule_for(role, status).map(|r| r.pricing) {
        Some(Always) => true,
        Some(InEditMode) => edit_mode_active,
        Some(Never) | None => false,
    }
}

/// DRAFT -> SUBMITTED is open to every role.
pub fn can_submit(_role: Role, status: TicketStatus) -> bool {
    status == Draft
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPermission {
    Allowed,
    Denied(String),
}

impl TransitionPermission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TransitionPermission::Allowed)
    }
}

pub fn check_transition(role: Role, from: TicketStatus, to: TicketStatus) -> TransitionPermission {
    if !role.is_privileged() {
        return TransitionPermission::Denied(format!(
            "{} cannot change ticket status directly",
            role
        ));
    }

    if from == to {
        return TransitionPermission::Allowed;
    }

    if from == NpdiInitiated && to != Completed {
        return TransitionPermission::Denied(format!(
            "Cannot move ticket from {} to {}; NPDI initiated tickets can only be marked completed",
            from.display_name(),
            to.display_name()
        ));
    }

    TransitionPermission::Allowed
}

pub fn can_transition(role: Role, from: TicketStatus, to: TicketStatus) -> bool {
    check_transition(role, from, to).is_allowed()
}

/// Targets offered by the free-form status dropdown.
///
/// The dropdown is hidden once NPDI is initiated, and never offers
/// NPDI_INITIATED itself since only the NPDI transaction may enter it.
pub fn valid_targets(role: Role, from: TicketStatus) -> Vec<TicketStatus> {
    if !role.is_privileged() || from == NpdiInitiated {
        return Vec::new();
    }

    TicketStatus::ALL
        .into_iter()
        .filter(|&to| to != NpdiInitiated && can_transition(role, from, to))
        .collect()
}
