use serde::{Deserialize, Serialize};

/// Lifecycle status of a product ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Draft,
    Submitted,
    InProcess,
    NpdiInitiated,
    Completed,
    Canceled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Draft,
        TicketStatus::Submitted,
        TicketStatus::InProcess,
        TicketStatus::NpdiInitiated,
        TicketStatus::Completed,
        TicketStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::InProcess => "IN_PROCESS",
            Self::NpdiInitiated => "NPDI_INITIATED",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Accepts the wire form as well as the loose spellings the UI sends
    /// ("in process", "npdi-initiated", "cancelled").
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" => Some(Self::Submitted),
            "IN_PROCESS" | "INPROCESS" => Some(Self::InProcess),
            "NPDI_INITIATED" => Some(Self::NpdiInitiated),
            "COMPLETED" => Some(Self::Completed),
            "CANCELED" | "CANCELLED" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::InProcess => "In Process",
            Self::NpdiInitiated => "NPDI Initiated",
            Self::Completed => "Completed",
            Self::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    ProductManager,
    PmOps,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::ProductManager, Role::PmOps, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductManager => "PRODUCT_MANAGER",
            Self::PmOps => "PM_OPS",
            Self::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "PRODUCT_MANAGER" | "PM" => Some(Self::ProductManager),
            "PM_OPS" | "PMOPS" => Some(Self::PmOps),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// PM-Ops and Admin share every privilege in the lifecycle.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::PmOps | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: None,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_pm_ops(&self) -> bool {
        self.role == Role::PmOps
    }

    pub fn is_product_manager(&self) -> bool {
        self.role == Role::ProductManager
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}
