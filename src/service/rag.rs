//! Retrieval-augmented maintenance assistant.

use crate::db::{DbAsset, DbChunk, GmaoStorage};
use crate::error::GmaoError;
use crate::service::cache::TtlCache;
use crate::service::intent::{RetrievalPlan, detect_intent, retrieval_plan};
use crate::service::language::detect_language;
use crate::service::llm::{LlmRequest, ModelRole, SharedModel};
use crate::text::{normalize, terms};
use crate::types::domain::{Intent, Language, MessageRole};
use crate::types::gemini::{Content, Part};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Overrides detection when the client already knows the language.
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSource {
    pub document_id: String,
    pub heading: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub answer: String,
    pub intent: Intent,
    pub intent_confidence: f32,
    pub language: Language,
    pub sources: Vec<ChatSource>,
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct CachedAnswer {
    answer: String,
    sources: Vec<ChatSource>,
}

pub type AnswerCache = TtlCache<String, CachedAnswer>;

const WORK_ORDER_CONTEXT: u32 = 5;

#[derive(Clone)]
pub struct Assistant {
    storage: GmaoStorage,
    model: SharedModel,
    answers: Arc<AnswerCache>,
    history_messages: u32,
    top_k: usize,
}

impl Assistant {
    pub fn new(
        storage: GmaoStorage,
        model: SharedModel,
        answers: Arc<AnswerCache>,
        history_messages: u32,
        top_k: usize,
    ) -> Self {
        Self {
            storage,
            model,
            answers,
            history_messages,
            top_k,
        }
    }

    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse, GmaoError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(GmaoError::InvalidInput("message is empty".to_string()));
        }
        let asset = match request.asset_id.as_deref() {
            Some(id) => Some(self.storage.get_asset(id).await?),
            None => None,
        };

        let language = request.language.unwrap_or_else(|| detect_language(message));
        let intent = detect_intent(message);
        let conversation_id = request
            .conversation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        debug!(
            conversation_id = %conversation_id,
            intent = ?intent.intent,
            language = language.code(),
            "chat query"
        );

        let history = self
            .storage
            .recent_messages(&conversation_id, self.history_messages)
            .await?;

        // Answers depend on history, so only opening questions are cached.
        let cache_key = history.is_empty().then(|| {
            format!(
                "{}|{}|{}",
                asset.as_ref().map(|a| a.id.as_str()).unwrap_or(""),
                language.code(),
                normalize(message)
            )
        });
        let cached = cache_key.as_ref().and_then(|k| self.answers.get(k));

        let (answer, sources, from_cache) = match cached {
            Some(hit) => (hit.answer, hit.sources, true),
            None => {
                let plan = retrieval_plan(intent.intent, self.top_k);
                let chunks = self
                    .storage
                    .list_chunks(asset.as_ref().map(|a| a.id.as_str()))
                    .await?;
                let ranked = rank_chunks(&terms(message), chunks, plan.chunk_limit);
                let context = self.build_context(asset.as_ref(), &plan, &ranked).await?;

                let contents = history
                    .iter()
                    .map(|m| Content {
                        role: Some(
                            match m.role {
                                MessageRole::User => "user",
                                MessageRole::Assistant => "model",
                            }
                            .to_string(),
                        ),
                        parts: vec![Part::text(m.content.clone())],
                    })
                    .collect();
                let llm_request = LlmRequest::new(ModelRole::Chat, "chat")
                    .system(system_prompt(language, intent.intent))
                    .history(contents)
                    .text(format!("{context}\n\nQuestion: {message}"));
                let answer = self.model.generate(llm_request).await?.trim().to_string();

                let sources: Vec<ChatSource> = ranked
                    .iter()
                    .map(|(chunk, score)| ChatSource {
                        document_id: chunk.document_id.clone(),
                        heading: chunk.heading.clone(),
                        score: *score,
                    })
                    .collect();
                if let Some(key) = cache_key {
                    self.answers.insert(
                        key,
                        CachedAnswer {
                            answer: answer.clone(),
                            sources: sources.clone(),
                        },
                    );
                }
                (answer, sources, false)
            }
        };

        self.storage
            .append_message(
                &conversation_id,
                MessageRole::User,
                message,
                Some(intent.intent),
                Some(language),
            )
            .await?;
        self.storage
            .append_message(
                &conversation_id,
                MessageRole::Assistant,
                &answer,
                Some(intent.intent),
                Some(language),
            )
            .await?;
        info!(
            conversation_id = %conversation_id,
            sources = sources.len(),
            cached = from_cache,
            "chat answered"
        );

        Ok(ChatResponse {
            conversation_id,
            answer,
            intent: intent.intent,
            intent_confidence: intent.confidence,
            language,
            sources,
            cached: from_cache,
        })
    }

    async fn build_context(
        &self,
        asset: Option<&DbAsset>,
        plan: &RetrievalPlan,
        chunks: &[(DbChunk, u32)],
    ) -> Result<String, GmaoError> {
        let mut out = String::new();
        if let Some(asset) = asset {
            if plan.asset_details {
                let _ = writeln!(out, "## Equipment\nName: {}", asset.name);
                for (label, value) in [
                    ("Manufacturer", &asset.manufacturer),
                    ("Model", &asset.model),
                    ("Serial number", &asset.serial_number),
                    ("Location", &asset.location),
                ] {
                    if let Some(v) = value {
                        let _ = writeln!(out, "{label}: {v}");
                    }
                }
                let _ = writeln!(out, "Status: {:?}", asset.status);
            }
            if plan.components {
                let rows = self.storage.list_components(&asset.id).await?;
                if !rows.is_empty() {
                    out.push_str("\n## Components\n");
                    for c in rows {
                        let _ = writeln!(out, "- {}{}", c.name, reference(c.part_number.as_deref()));
                    }
                }
            }
            if plan.spare_parts {
                let rows = self.storage.list_spare_parts(&asset.id).await?;
                if !rows.is_empty() {
                    out.push_str("\n## Spare parts\n");
                    for p in rows {
                        let qty = p.quantity.map(|q| format!(", qty {q}")).unwrap_or_default();
                        let _ = writeln!(out, "- {}{}{qty}", p.name, reference(p.part_number.as_deref()));
                    }
                }
            }
            if plan.maintenance_plans {
                let rows = self.storage.list_maintenance_plans(&asset.id).await?;
                if !rows.is_empty() {
                    out.push_str("\n## Maintenance plan\n");
                    for m in rows {
                        let every = match (m.interval_value, m.interval_unit) {
                            (Some(v), Some(u)) => format!(" every {v} {}", u.as_str()),
                            _ => String::new(),
                        };
                        let _ = writeln!(out, "- {}{every} ({:?} criticality)", m.task, m.criticality);
                    }
                }
            }
            if plan.work_orders {
                let rows = self
                    .storage
                    .recent_work_orders(&asset.id, WORK_ORDER_CONTEXT)
                    .await?;
                if !rows.is_empty() {
                    out.push_str("\n## Recent work orders\n");
                    for w in rows {
                        let _ = writeln!(
                            out,
                            "- [{}] {} ({})",
                            w.status.as_str(),
                            w.title,
                            w.created_at.format("%Y-%m-%d")
                        );
                    }
                }
            }
        }

        if chunks.is_empty() {
            out.push_str("\n## Documentation excerpts\n(none found)\n");
        } else {
            out.push_str("\n## Documentation excerpts\n");
            for (i, (chunk, _)) in chunks.iter().enumerate() {
                let _ = writeln!(out, "[{}] {}\n{}\n", i + 1, chunk.heading, chunk.content);
            }
        }
        Ok(out)
    }
}

fn reference(part_number: Option<&str>) -> String {
    part_number.map(|p| format!(" (ref. {p})")).unwrap_or_default()
}

fn system_prompt(language: Language, intent: Intent) -> String {
    let mut prompt = format!(
        "You are the maintenance assistant of OpenGMAO, helping technicians on the shop floor. \
         Always answer in {} ({}), whatever the language of the context. \
         Base your answer on the context provided; when it does not cover the question, say so \
         and mark any general guidance as such. Be concise and use numbered steps for procedures. \
         Cite excerpts as [n].",
        language.display_name(),
        language.code()
    );
    match intent {
        Intent::Safety => prompt.push_str(
            " Start with the safety precautions: lockout/tagout, required PPE, residual energy.",
        ),
        Intent::Troubleshooting => prompt.push_str(
            " List likely causes from most to least probable, each with the check that confirms it.",
        ),
        Intent::SpareParts => {
            prompt.push_str(" Give exact part references and quantities when the context has them.")
        }
        _ => {}
    }
    prompt
}

/// Score chunks by query-term overlap: a term in the heading counts 2,
/// in the content 1. Zero-score chunks are dropped; ties keep input order.
pub fn rank_chunks(query_terms: &[String], chunks: Vec<DbChunk>, limit: usize) -> Vec<(DbChunk, u32)> {
    if query_terms.is_empty() || limit == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(DbChunk, u32)> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let heading = normalize(&chunk.heading);
            let content = normalize(&chunk.content);
            let score = query_terms
                .iter()
                .map(|t| {
                    let mut s = 0;
                    if heading.contains(t.as_str()) {
                        s += 2;
                    }
                    if content.contains(t.as_str()) {
                        s += 1;
                    }
                    s
                })
                .sum();
            (score > 0).then_some((chunk, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patch::AssetCreate;
    use crate::testing::ScriptedModel;
    use crate::types::domain::DocumentCategory;
    use std::time::Duration;

    fn chunk(id: i64, heading: &str, content: &str) -> DbChunk {
        DbChunk {
            id,
            document_id: "doc".into(),
            ordinal: id,
            heading: heading.into(),
            content: content.into(),
        }
    }

    #[test]
    fn heading_hits_weigh_double() {
        let chunks = vec![
            chunk(1, "Introduction", "This manual covers the oil filter and the belt."),
            chunk(2, "Oil filter", "Unscrew the cartridge."),
            chunk(3, "Electrical", "Wiring diagram."),
        ];
        let ranked = rank_chunks(&terms("oil filter"), chunks, 4);
        let ids: Vec<_> = ranked.iter().map(|(c, s)| (c.id, *s)).collect();
        assert_eq!(ids, [(2, 4), (1, 2)]);
    }

    #[test]
    fn limit_and_empty_query() {
        let chunks = vec![chunk(1, "Oil", "oil"), chunk(2, "Oil", "oil")];
        assert_eq!(rank_chunks(&terms("oil"), chunks.clone(), 1).len(), 1);
        assert!(rank_chunks(&[], chunks, 4).is_empty());
    }

    async fn assistant(model: ScriptedModel) -> (Assistant, GmaoStorage) {
        let storage = GmaoStorage::connect("sqlite::memory:").await.unwrap();
        let assistant = Assistant::new(
            storage.clone(),
            Arc::new(model),
            Arc::new(AnswerCache::new(Duration::from_secs(60))),
            10,
            4,
        );
        (assistant, storage)
    }

    fn ask(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            conversation_id: None,
            asset_id: None,
            language: None,
        }
    }

    #[tokio::test]
    async fn answers_with_sources_and_persists_both_messages() {
        let model = ScriptedModel::new().on("chat", "1. Arrêtez le compresseur [1]");
        let requests = model.requests_handle();
        let (assistant, storage) = assistant(model).await;

        let doc = storage.insert_document("m.pdf", "h", "/tmp/m", 1, None).await.unwrap();
        storage
            .replace_chunks(&doc.id, &[("Filtre à huile".into(), "Remplacer le filtre toutes les 4000 h".into())])
            .await
            .unwrap();
        storage
            .mark_document_extracted(&doc.id, DocumentCategory::Manual, Default::default())
            .await
            .unwrap();

        let resp = assistant
            .answer(ask("Comment remplacer le filtre à huile ?"))
            .await
            .unwrap();
        assert_eq!(resp.language, Language::French);
        assert_eq!(resp.intent, Intent::MaintenanceProcedure);
        assert_eq!(resp.sources.len(), 1);
        assert!(!resp.cached);

        let sent = requests.lock().unwrap();
        assert!(sent[0].system.as_deref().unwrap().contains("French (fr)"));
        assert!(sent[0].prompt_text().contains("Remplacer le filtre"));

        let messages = storage.conversation(&resp.conversation_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn opening_questions_are_cached_follow_ups_are_not() {
        let model = ScriptedModel::new().on("chat", "ok");
        let calls = model.calls_handle();
        let (assistant, _storage) = assistant(model).await;

        let first = assistant.answer(ask("What is the oil capacity?")).await.unwrap();
        let second = assistant.answer(ask("what is the OIL capacity")).await.unwrap();
        assert!(second.cached);
        assert_eq!(calls.lock().unwrap().len(), 1);

        let follow_up = ChatRequest {
            conversation_id: Some(first.conversation_id.clone()),
            ..ask("What is the oil capacity?")
        };
        assert!(!assistant.answer(follow_up).await.unwrap().cached);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_is_sent_oldest_first() {
        let model = ScriptedModel::new().on("chat", "answer");
        let requests = model.requests_handle();
        let (assistant, _storage) = assistant(model).await;
        let first = assistant.answer(ask("Hello")).await.unwrap();
        let follow_up = ChatRequest {
            conversation_id: Some(first.conversation_id),
            ..ask("And the belt?")
        };
        assistant.answer(follow_up).await.unwrap();

        let sent = requests.lock().unwrap();
        let history = &sent[1].history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role.as_deref(), Some("user"));
        assert_eq!(history[1].role.as_deref(), Some("model"));
    }

    #[tokio::test]
    async fn asset_context_follows_the_plan() {
        let model = ScriptedModel::new().on("chat", "ok");
        let requests = model.requests_handle();
        let (assistant, storage) = assistant(model).await;
        let asset = storage
            .insert_asset(AssetCreate {
                name: "Chiller CH-2".into(),
                manufacturer: Some("Carrier".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .insert_spare_part(crate::db::patch::SparePartCreate {
                asset_id: asset.id.clone(),
                component_id: None,
                name: "Compressor belt".into(),
                part_number: Some("B-77".into()),
                quantity: Some(2),
                supplier: None,
                source_document_id: None,
            })
            .await
            .unwrap();

        let request = ChatRequest {
            asset_id: Some(asset.id.clone()),
            ..ask("What is the part number of the belt?")
        };
        assistant.answer(request).await.unwrap();
        let prompt = requests.lock().unwrap()[0].prompt_text();
        assert!(prompt.contains("Manufacturer: Carrier"));
        assert!(prompt.contains("Compressor belt (ref. B-77), qty 2"));
    }

    #[tokio::test]
    async fn rejects_blank_and_unknown_asset() {
        let (assistant, _storage) = assistant(ScriptedModel::new()).await;
        assert!(matches!(
            assistant.answer(ask("   ")).await,
            Err(GmaoError::InvalidInput(_))
        ));
        let request = ChatRequest {
            asset_id: Some("missing".into()),
            ..ask("hello")
        };
        assert!(matches!(
            assistant.answer(request).await,
            Err(GmaoError::NotFound("asset"))
        ));
    }
}
