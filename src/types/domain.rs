//! Enumerations shared by the database rows and the HTTP payloads.
//!
//! Every enum is stored as snake_case TEXT (languages as ISO 639 codes) and
//! serialized the same way.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AssetStatus {
    #[default]
    Operational,
    Degraded,
    Down,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DocumentStatus {
    Processing,
    Extracted,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DocumentCategory {
    #[default]
    Manual,
    Datasheet,
    MaintenanceProcedure,
    SparePartsCatalog,
    SafetySheet,
    Schematic,
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 7] = [
        DocumentCategory::Manual,
        DocumentCategory::Datasheet,
        DocumentCategory::MaintenanceProcedure,
        DocumentCategory::SparePartsCatalog,
        DocumentCategory::SafetySheet,
        DocumentCategory::Schematic,
        DocumentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Manual => "manual",
            DocumentCategory::Datasheet => "datasheet",
            DocumentCategory::MaintenanceProcedure => "maintenance_procedure",
            DocumentCategory::SparePartsCatalog => "spare_parts_catalog",
            DocumentCategory::SafetySheet => "safety_sheet",
            DocumentCategory::Schematic => "schematic",
            DocumentCategory::Other => "other",
        }
    }

    /// Lenient label parsing for model output (`"Spare parts catalog"` works too).
    pub fn from_label(label: &str) -> Option<Self> {
        let key = label.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum IntervalUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
    OperatingHours,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Months => "months",
            IntervalUnit::Years => "years",
            IntervalUnit::OperatingHours => "operating hours",
        }
    }

    /// Maps the free-form units a manual uses (`"h"`, `"mois"`, `"hrs of operation"`).
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase();
        if l.contains("operat") || l.contains("fonctionnement") || l.contains("service") {
            return Some(IntervalUnit::OperatingHours);
        }
        let unit = match l.trim_end_matches('s') {
            "h" | "hr" | "hour" | "heure" => IntervalUnit::Hours,
            "d" | "day" | "jour" | "daily" | "quotidien" => IntervalUnit::Days,
            "w" | "wk" | "week" | "semaine" | "weekly" | "hebdomadaire" => IntervalUnit::Weeks,
            "m" | "mo" | "month" | "moi" | "monthly" | "mensuel" => IntervalUnit::Months,
            "y" | "yr" | "year" | "an" | "année" | "annee" | "yearly" | "annuel" => {
                IntervalUnit::Years
            }
            _ => return None,
        };
        Some(unit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
}

impl Criticality {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "faible" | "basse" => Criticality::Low,
            "high" | "critical" | "élevée" | "elevee" | "haute" | "critique" => {
                Criticality::High
            }
            _ => Criticality::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::OnHold => "on_hold",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: WorkOrderStatus) -> bool {
        use WorkOrderStatus::*;
        if *self == next {
            return !self.is_terminal();
        }
        match (self, next) {
            (Completed | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Open, InProgress) => true,
            (InProgress, OnHold) | (OnHold, InProgress) => true,
            (InProgress, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DependencyKind {
    Power,
    Fluid,
    Control,
    Mechanical,
    Thermal,
    Data,
    Other,
}

impl DependencyKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "power" | "electrical" | "electric" | "energy" => DependencyKind::Power,
            "fluid" | "hydraulic" | "pneumatic" | "air" | "water" | "steam" => {
                DependencyKind::Fluid
            }
            "control" | "command" | "signal" => DependencyKind::Control,
            "mechanical" | "drive" | "transmission" => DependencyKind::Mechanical,
            "thermal" | "cooling" | "heating" => DependencyKind::Thermal,
            "data" | "network" | "communication" => DependencyKind::Data,
            _ => DependencyKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Language of a user query or a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Language {
    #[serde(rename = "ar")]
    #[sqlx(rename = "ar")]
    Arabic,
    /// Moroccan Arabic, written in Arabic script or Latin "Arabizi".
    #[serde(rename = "ary")]
    #[sqlx(rename = "ary")]
    Darija,
    #[serde(rename = "fr")]
    #[sqlx(rename = "fr")]
    French,
    #[serde(rename = "en")]
    #[sqlx(rename = "en")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::Darija => "ary",
            Language::French => "fr",
            Language::English => "en",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Arabic => "Modern Standard Arabic",
            Language::Darija => "Moroccan Darija",
            Language::French => "French",
            Language::English => "English",
        }
    }
}

/// What a chat query is after; drives which records feed the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Intent {
    Troubleshooting,
    MaintenanceProcedure,
    SpareParts,
    Specifications,
    Safety,
    WorkOrder,
    General,
}
