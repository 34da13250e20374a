//! Insert and partial-update payloads accepted by the storage layer.
//!
//! `Option<Option<T>>` fields distinguish "leave unchanged" (`None`) from
//! "clear the column" (`Some(None)`).

use crate::types::domain::{AssetStatus, Criticality, IntervalUnit, Priority, WorkOrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetCreate {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: AssetStatus,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(skip)]
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub manufacturer: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub model: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<AssetStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct ComponentCreate {
    pub asset_id: String,
    pub name: String,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SparePartCreate {
    pub asset_id: String,
    pub component_id: Option<String>,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: Option<i64>,
    pub supplier: Option<String>,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MaintenancePlanCreate {
    pub asset_id: String,
    pub task: String,
    pub interval_value: Option<f64>,
    pub interval_unit: Option<IntervalUnit>,
    pub procedure: Option<String>,
    pub criticality: Criticality,
    pub source_document_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkOrderCreate {
    pub title: String,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkOrderPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<WorkOrderStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}
