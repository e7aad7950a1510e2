//! Edit-permission resolver.
//!
//! Turns {role, status, mode} into the editable/read-only decision for each
//! form section. Nothing here is stored; it is recomputed for every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rules::{can_edit, can_edit_pricing};
use super::{Role, TicketStatus};

/// How the ticket form is currently being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    View,
    Edit,
    /// PM-Ops assigning part numbers and SKUs; pricing stays read-only.
    SkuAssignment,
}

impl EditMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "view" => Some(Self::View),
            "edit" => Some(Self::Edit),
            "sku_assignment" | "sku" => Some(Self::SkuAssignment),
            _ => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Edit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    BasicInfo,
    ChemicalProperties,
    QualityLevel,
    QualityAttributes,
    Composition,
    Pricing,
    CorpBase,
    SkuVariants,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::BasicInfo,
        Section::ChemicalProperties,
        Section::QualityLevel,
        Section::QualityAttributes,
        Section::Composition,
        Section::Pricing,
        Section::CorpBase,
        Section::SkuVariants,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPermissions {
    pub can_edit_ticket: bool,
    pub can_edit_pricing: bool,
    pub can_edit_quality: bool,
}

pub fn resolve(role: Role, status: TicketStatus, mode: EditMode) -> EditPermissions {
    EditPermissions {
        can_edit_ticket: can_edit(role, status),
        can_edit_pricing: section_editable(role, status, mode, Section::Pricing),
        can_edit_quality: section_editable(role, status, mode, Section::QualityLevel),
    }
}

/// Whether `section` renders as editable for an existing ticket.
pub fn section_editable(role: Role, status: TicketStatus, mode: EditMode, section: Section) -> bool {
    if !can_edit(role, status) {
        return false;
    }

    match section {
        // Attribute rows are fixed once the ticket exists.
        Section::QualityAttributes => false,
        Section::SkuVariants => {
            mode.is_editing() || (mode == EditMode::SkuAssignment && role.is_privileged())
        }
        Section::Pricing => mode.is_editing() && can_edit_pricing(role, status, mode.is_editing()),
        Section::BasicInfo
        | Section::ChemicalProperties
        | Section::QualityLevel
        | Section::Composition
        | Section::CorpBase => mode.is_editing(),
    }
}

pub fn section_map(role: Role, status: TicketStatus, mode: EditMode) -> BTreeMap<Section, bool> {
    Section::ALL
        .into_iter()
        .map(|section| (section, section_editable(role, status, mode, section)))
        .collect()
}
