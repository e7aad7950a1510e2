use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::{SkuVariant, UpdateTicket};
use crate::lifecycle::{EditMode, EditPermissions, Role, Section, TicketReminders, TicketStatus};

// ===== Ticket Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    /// Version of the snapshot the client edited; stale values are rejected.
    pub version: Option<i64>,
    #[serde(flatten)]
    pub patch: UpdateTicket,
}

// ===== Lifecycle Types =====

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPartNumberRequest {
    pub base_number: String,
    #[serde(default)]
    pub sku_variants: Option<Vec<SkuVariant>>,
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateNpdiRequest {
    pub tracking_number: String,
    pub version: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(default)]
    pub confirmed: bool,
    pub version: Option<i64>,
}

// ===== Permission Types =====

#[derive(Debug, Deserialize)]
pub struct PermissionsQuery {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsResponse {
    pub ticket_id: String,
    pub ticket_number: String,
    pub status: TicketStatus,
    pub role: Role,
    pub mode: EditMode,
    pub rules_version: u32,
    #[serde(flatten)]
    pub permissions: EditPermissions,
    pub can_submit: bool,
    pub sections: BTreeMap<Section, bool>,
    pub valid_targets: Vec<TicketStatus>,
    pub reminders: TicketReminders,
}

// ===== Comment Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub body: String,
}
