//! Language-model seam.
//!
//! Everything that talks to the hosted model goes through [`LanguageModel`],
//! so the extraction pipeline, the assistant and the transcriber can run
//! against [`GeminiModel`] in production and a scripted model in tests.

use crate::api::GeminiApi;
use crate::config::LlmConfig;
use crate::error::GmaoError;
use crate::types::gemini::{
    Content, FinishReason, GenerateContentRequest, GenerationConfig, Part,
};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which configured model a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Chat,
    Extraction,
    Transcription,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub role: ModelRole,
    /// Short label used in logs and by scripted test models.
    pub task: &'static str,
    pub system: Option<String>,
    pub history: Vec<Content>,
    pub parts: Vec<Part>,
    pub response_schema: Option<Value>,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(role: ModelRole, task: &'static str) -> Self {
        Self {
            role,
            task,
            system: None,
            history: Vec::new(),
            parts: Vec::new(),
            response_schema: None,
            temperature: 0.2,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::text(text));
        self
    }

    pub fn blob(mut self, mime_type: &str, bytes: &[u8]) -> Self {
        self.parts.push(Part::blob(mime_type, bytes));
        self
    }

    pub fn history(mut self, history: Vec<Content>) -> Self {
        self.history = history;
        self
    }

    /// Ask for JSON matching `schema`.
    pub fn json(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self.temperature = 0.0;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Concatenated text parts; what a scripted model matches on.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait LanguageModel: Send + Sync {
    /// Run one request and return the model's text output.
    fn generate<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<String, GmaoError>>;
}

pub type SharedModel = Arc<dyn LanguageModel>;

/// Run `request` and decode the output as JSON.
pub async fn generate_json<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: LlmRequest,
) -> Result<T, GmaoError> {
    let task = request.task;
    let raw = model.generate(request).await?;
    parse_model_json(&raw).map_err(|e| {
        warn!(task, error = %e, "model returned malformed JSON");
        GmaoError::ModelOutput(format!("{task}: {e}"))
    })
}

/// Parse JSON that may be wrapped in a Markdown fence or surrounded by prose.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }
    let unfenced = strip_fence(trimmed);
    if let Ok(v) = serde_json::from_str(unfenced) {
        return Ok(v);
    }
    // Fall back to the outermost object in the text.
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&unfenced[start..=end]),
        _ => serde_json::from_str(unfenced),
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // skip the info string (`json`, `JSON`, ...)
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Production model backed by a Gemini-compatible endpoint.
pub struct GeminiModel {
    client: reqwest::Client,
    cfg: LlmConfig,
}

impl GeminiModel {
    pub fn new(cfg: LlmConfig) -> Result<Self, GmaoError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("opengmao/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(cfg.timeout());
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let client = builder.build()?;
        Ok(Self { client, cfg })
    }

    fn model_name(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Chat => &self.cfg.chat_model,
            ModelRole::Extraction => &self.cfg.extraction_model,
            ModelRole::Transcription => &self.cfg.transcription_model,
        }
    }

    fn build_body(request: LlmRequest) -> GenerateContentRequest {
        let mut contents = request.history;
        contents.push(Content {
            role: Some("user".to_string()),
            parts: request.parts,
        });
        let json = request.response_schema.is_some();
        GenerateContentRequest {
            contents,
            system_instruction: request.system.map(|s| Content {
                role: None,
                parts: vec![Part::text(s)],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                max_output_tokens: None,
                response_mime_type: json.then(|| "application/json".to_string()),
                response_schema: request.response_schema,
            }),
        }
    }
}

impl LanguageModel for GeminiModel {
    fn generate<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<String, GmaoError>> {
        Box::pin(async move {
            let task = request.task;
            let model = self.model_name(request.role).to_string();
            let url = GeminiApi::generate_url(&self.cfg.base_url, &model)?;
            let body = Self::build_body(request);

            let resp = GeminiApi::try_generate(
                &self.client,
                url,
                &self.cfg.api_key,
                GeminiApi::retry_policy(self.cfg.max_retries),
                &body,
            )
            .await?;

            if let Some(reason) = resp.finish_reason()
                && *reason != FinishReason::STOP
            {
                warn!(task, model = %model, ?reason, "model stopped early");
            }
            let text = resp.text().ok_or_else(|| {
                GmaoError::ModelOutput(format!("{task}: empty response from {model}"))
            })?;
            debug!(task, model = %model, chars = text.len(), "model call completed");
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Out {
        ok: bool,
    }

    #[test]
    fn parses_plain_fenced_and_wrapped_json() {
        assert_eq!(parse_model_json::<Out>(r#"{"ok": true}"#).unwrap(), Out { ok: true });
        assert_eq!(
            parse_model_json::<Out>("```json\n{\"ok\": true}\n```").unwrap(),
            Out { ok: true }
        );
        assert_eq!(
            parse_model_json::<Out>("Voici le résultat :\n{\"ok\": false}\nMerci.").unwrap(),
            Out { ok: false }
        );
        assert!(parse_model_json::<Out>("no json here").is_err());
    }

    #[test]
    fn body_appends_user_turn_after_history_and_requests_json() {
        let request = LlmRequest::new(ModelRole::Chat, "test")
            .system("be brief")
            .history(vec![Content {
                role: Some("model".into()),
                parts: vec![Part::text("earlier")],
            }])
            .text("question")
            .json(serde_json::json!({"type": "OBJECT"}));
        let body = GeminiModel::build_body(request);
        assert_eq!(body.contents.len(), 2);
        assert_eq!(body.contents[1].role.as_deref(), Some("user"));
        let cfg = body.generation_config.unwrap();
        assert_eq!(cfg.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(cfg.temperature, Some(0.0));
        assert!(body.system_instruction.is_some());
    }
}
