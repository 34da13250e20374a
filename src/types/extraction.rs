//! Shapes the extraction passes ask the model to produce, plus the response
//! schemas sent alongside each prompt.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

/// Parse an array leniently: items that fail to deserialize are skipped.
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

/// Pass 1. Cached by document hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub document_type: Option<String>,
    pub language: Option<String>,
    pub revision: Option<String>,
    pub page_count: Option<u32>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassificationOutput {
    pub category: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedSection {
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionsOutput {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub sections: Vec<ExtractedSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedAsset {
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsOutput {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub assets: Vec<ExtractedAsset>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedComponent {
    pub asset: String,
    pub name: String,
    pub part_number: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedSparePart {
    pub asset: String,
    pub component: Option<String>,
    pub name: String,
    pub part_number: Option<String>,
    pub quantity: Option<u32>,
    pub supplier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartsOutput {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub components: Vec<ExtractedComponent>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub spare_parts: Vec<ExtractedSparePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedTask {
    pub asset: String,
    pub task: String,
    pub interval_value: Option<f64>,
    pub interval_unit: Option<String>,
    pub procedure: Option<String>,
    pub criticality: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceOutput {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tasks: Vec<ExtractedTask>,
}

fn nullable_string() -> Value {
    json!({ "type": "STRING", "nullable": true })
}

pub fn metadata_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": nullable_string(),
            "manufacturer": nullable_string(),
            "model": nullable_string(),
            "document_type": nullable_string(),
            "language": nullable_string(),
            "revision": nullable_string(),
            "page_count": { "type": "INTEGER", "nullable": true },
            "summary": nullable_string()
        }
    })
}

pub fn classification_schema(labels: &[&str]) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "category": { "type": "STRING", "enum": labels },
            "confidence": { "type": "NUMBER" }
        },
        "required": ["category"]
    })
}

pub fn sections_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "sections": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "heading": { "type": "STRING" },
                        "content": { "type": "STRING" }
                    },
                    "required": ["heading", "content"]
                }
            }
        },
        "required": ["sections"]
    })
}

pub fn assets_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "assets": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "category": nullable_string(),
                        "manufacturer": nullable_string(),
                        "model": nullable_string(),
                        "serial_number": nullable_string(),
                        "location": nullable_string(),
                        "description": nullable_string()
                    },
                    "required": ["name"]
                }
            }
        },
        "required": ["assets"]
    })
}

pub fn parts_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "components": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "asset": { "type": "STRING" },
                        "name": { "type": "STRING" },
                        "part_number": nullable_string(),
                        "description": nullable_string()
                    },
                    "required": ["asset", "name"]
                }
            },
            "spare_parts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "asset": { "type": "STRING" },
                        "component": nullable_string(),
                        "name": { "type": "STRING" },
                        "part_number": nullable_string(),
                        "quantity": { "type": "INTEGER", "nullable": true },
                        "supplier": nullable_string()
                    },
                    "required": ["asset", "name"]
                }
            }
        },
        "required": ["components", "spare_parts"]
    })
}

pub fn maintenance_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "tasks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "asset": { "type": "STRING" },
                        "task": { "type": "STRING" },
                        "interval_value": { "type": "NUMBER", "nullable": true },
                        "interval_unit": nullable_string(),
                        "procedure": nullable_string(),
                        "criticality": { "type": "STRING", "enum": ["low", "medium", "high"] }
                    },
                    "required": ["asset", "task"]
                }
            }
        },
        "required": ["tasks"]
    })
}
