use crate::types::domain::{
    AssetStatus, Criticality, DependencyKind, DocumentCategory, DocumentStatus, Intent,
    IntervalUnit, Language, MessageRole, Priority, SuggestionStatus, WorkOrderStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAsset {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: AssetStatus,
    pub parent_id: Option<String>,
    pub qr_code: String,
    pub source_document_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAlias {
    pub id: i64,
    pub asset_id: String,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbComponent {
    pub id: String,
    pub asset_id: String,
    pub name: String,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbSparePart {
    pub id: String,
    pub asset_id: String,
    pub component_id: Option<String>,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: Option<i64>,
    pub supplier: Option<String>,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbMaintenancePlan {
    pub id: String,
    pub asset_id: String,
    pub task: String,
    pub interval_value: Option<f64>,
    pub interval_unit: Option<IntervalUnit>,
    pub procedure: Option<String>,
    pub criticality: Criticality,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbWorkOrder {
    pub id: String,
    pub asset_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: WorkOrderStatus,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub file_name: String,
    pub content_hash: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub size_bytes: i64,
    pub category: Option<DocumentCategory>,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub asset_id: Option<String>,
    pub assets_found: i64,
    pub components_found: i64,
    pub spare_parts_found: i64,
    pub tasks_found: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbChunk {
    pub id: i64,
    pub document_id: String,
    pub ordinal: i64,
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbDependencySuggestion {
    pub id: String,
    pub source_asset_id: String,
    pub target_asset_id: String,
    pub kind: DependencyKind,
    pub confidence: f64,
    pub rationale: Option<String>,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbMessage {
    pub id: i64,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub intent: Option<Intent>,
    pub language: Option<Language>,
    pub created_at: DateTime<Utc>,
}

/// Extraction counts written back onto the document row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionCounts {
    pub assets: i64,
    pub components: i64,
    pub spare_parts: i64,
    pub tasks: i64,
}
