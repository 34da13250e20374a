use crate::service::llm::{LanguageModel, LlmRequest, ModelRole, generate_json};
use crate::types::domain::DocumentCategory;
use crate::types::extraction::{ClassificationOutput, DocumentMetadata, classification_schema};
use tracing::{debug, warn};

const SYSTEM: &str = "You classify industrial equipment documents. \
Answer with exactly one category label from the allowed list.";

/// Classify a document from its bytes and already extracted metadata.
///
/// Never fails: model errors and labels outside the allowed set fall back
/// to [`DocumentCategory::Manual`].
pub async fn classify_document(
    model: &dyn LanguageModel,
    pdf: &[u8],
    metadata: &DocumentMetadata,
) -> DocumentCategory {
    let labels: Vec<&str> = DocumentCategory::ALL.iter().map(|c| c.as_str()).collect();
    let mut hints = String::new();
    if let Some(title) = metadata.title.as_deref() {
        hints.push_str(&format!("Title: {title}\n"));
    }
    if let Some(kind) = metadata.document_type.as_deref() {
        hints.push_str(&format!("Declared type: {kind}\n"));
    }

    let request = LlmRequest::new(ModelRole::Extraction, "classify")
        .system(SYSTEM)
        .blob("application/pdf", pdf)
        .text(format!(
            "{hints}Allowed categories: {}.\nReturn JSON {{\"category\": <label>, \"confidence\": <0..1>}}.",
            labels.join(", ")
        ))
        .json(classification_schema(&labels));

    match generate_json::<ClassificationOutput>(model, request).await {
        Ok(out) => match DocumentCategory::from_label(&out.category) {
            Some(category) => {
                debug!(category = category.as_str(), confidence = ?out.confidence, "document classified");
                category
            }
            None => {
                warn!(label = %out.category, "unknown document category, using manual");
                DocumentCategory::Manual
            }
        },
        Err(e) => {
            warn!(error = %e, "classification failed, using manual");
            DocumentCategory::Manual
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[tokio::test]
    async fn maps_model_label() {
        let model = ScriptedModel::new().on("classify", r#"{"category": "Spare parts catalog"}"#);
        let category = classify_document(&model, b"%PDF", &DocumentMetadata::default()).await;
        assert_eq!(category, DocumentCategory::SparePartsCatalog);
    }

    #[tokio::test]
    async fn falls_back_to_manual() {
        let unknown = ScriptedModel::new().on("classify", r#"{"category": "brochure"}"#);
        assert_eq!(
            classify_document(&unknown, b"%PDF", &DocumentMetadata::default()).await,
            DocumentCategory::Manual
        );
        let failing = ScriptedModel::new().fail("classify");
        assert_eq!(
            classify_document(&failing, b"%PDF", &DocumentMetadata::default()).await,
            DocumentCategory::Manual
        );
    }
}
