use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{Role, TicketStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            "URGENT" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartNumber {
    pub base_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NpdiTracking {
    pub tracking_number: String,
    pub initiated_by: String,
    pub initiated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkuType {
    Bulk,
    Conf,
    Spec,
    Var,
    Prepack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSize {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkuPricing {
    pub list_price: Option<f64>,
    pub standard_cost: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkuVariant {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(rename = "type")]
    pub sku_type: SkuType,
    #[serde(default)]
    pub package_size: Option<PackageSize>,
    #[serde(default)]
    pub pricing: Option<SkuPricing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quality {
    pub mq_quality_level: Option<String>,
    #[serde(default)]
    pub attributes: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Submitted,
    StatusChanged,
    PartNumberAssigned,
    NpdiInitiated,
    Completed,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "CREATED",
            HistoryAction::Submitted => "SUBMITTED",
            HistoryAction::StatusChanged => "STATUS_CHANGED",
            HistoryAction::PartNumberAssigned => "PART_NUMBER_ASSIGNED",
            HistoryAction::NpdiInitiated => "NPDI_INITIATED",
            HistoryAction::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(HistoryAction::Created),
            "SUBMITTED" => Some(HistoryAction::Submitted),
            "STATUS_CHANGED" => Some(HistoryAction::StatusChanged),
            "PART_NUMBER_ASSIGNED" => Some(HistoryAction::PartNumberAssigned),
            "NPDI_INITIATED" => Some(HistoryAction::NpdiInitiated),
            "COMPLETED" => Some(HistoryAction::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NpdiRenameDetails {
    pub previous_ticket_number: String,
    pub new_ticket_number: String,
    pub initiated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeDetails {
    pub previous_status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HistoryDetails {
    NpdiRename(NpdiRenameDetails),
    StatusChange(StatusChangeDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: String,
    pub action: HistoryAction,
    pub status: TicketStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub changed_by_role: Role,
    pub reason: Option<String>,
    pub details: Option<HistoryDetails>,
}

impl StatusHistoryEntry {
    pub fn npdi_rename(&self) -> Option<&NpdiRenameDetails> {
        match &self.details {
            Some(HistoryDetails::NpdiRename(details)) => Some(details),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub ticket_number: String,
    pub product_name: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub part_number: Option<PartNumber>,
    pub npdi_tracking: Option<NpdiTracking>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub sku_variants: Vec<SkuVariant>,
    pub pricing_data: serde_json::Value,
    pub chemical_properties: serde_json::Value,
    pub quality: Quality,
    pub composition: serde_json::Value,
    pub corpbase_data: serde_json::Value,
    pub hazard_classification: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Ticket {
    /// The assigned base part number, ignoring blank values.
    pub fn base_number(&self) -> Option<&str> {
        self.part_number
            .as_ref()
            .and_then(|p| p.base_number.as_deref())
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// Set once NPDI is initiated and never cleared, whatever the status.
    pub fn is_npdi_handed_off(&self) -> bool {
        self.npdi_tracking.is_some()
    }

    pub fn has_bulk_sku(&self) -> bool {
        self.sku_variants.iter().any(|v| v.sku_type == SkuType::Bulk)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicket {
    pub product_name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub sku_variants: Vec<SkuVariant>,
    #[serde(default)]
    pub pricing_data: serde_json::Value,
    #[serde(default)]
    pub chemical_properties: serde_json::Value,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub composition: serde_json::Value,
    #[serde(default)]
    pub corpbase_data: serde_json::Value,
    #[serde(default)]
    pub hazard_classification: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityPatch {
    pub mq_quality_level: Option<String>,
    pub attributes: Option<Vec<serde_json::Value>>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicket {
    pub product_name: Option<String>,
    pub priority: Option<Priority>,
    pub sku_variants: Option<Vec<SkuVariant>>,
    pub pricing_data: Option<serde_json::Value>,
    pub chemical_properties: Option<serde_json::Value>,
    pub quality: Option<QualityPatch>,
    pub composition: Option<serde_json::Value>,
    pub corpbase_data: Option<serde_json::Value>,
    pub hazard_classification: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub ticket_id: String,
    pub author_email: String,
    pub author_role: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComment {
    pub ticket_id: String,
    pub author_email: String,
    pub author_role: Role,
    pub body: String,
}
