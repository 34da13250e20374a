//! Equipment dependency suggestions from free text.

use crate::db::{AssetWithAliases, DbDependencySuggestion, GmaoStorage, SuggestionCreate};
use crate::error::GmaoError;
use crate::service::cache::{TtlCache, content_hash};
use crate::service::llm::{LlmRequest, ModelRole, SharedModel, parse_model_json};
use crate::text::{name_key, normalize};
use crate::types::domain::DependencyKind;
use crate::types::extraction::lenient_vec;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct DependenciesOutput {
    #[serde(default, deserialize_with = "lenient_vec")]
    dependencies: Vec<RawDependency>,
}

/// An edge as the model wrote it, before names are resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDependency {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub rationale: Option<String>,
}

pub type SuggestionCache = TtlCache<String, Vec<SuggestionCreate>>;

const DEFAULT_CONFIDENCE: f64 = 0.5;

fn dependencies_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "dependencies": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "source": { "type": "STRING" },
                        "target": { "type": "STRING" },
                        "kind": {
                            "type": "STRING",
                            "enum": ["power", "fluid", "control", "mechanical", "thermal", "data", "other"]
                        },
                        "confidence": { "type": "NUMBER" },
                        "rationale": { "type": "STRING", "nullable": true }
                    },
                    "required": ["source", "target", "kind"]
                }
            }
        }
    })
}

#[derive(Clone)]
pub struct DependencySuggester {
    storage: GmaoStorage,
    model: SharedModel,
    cache: Arc<SuggestionCache>,
    max_chars: usize,
}

impl DependencySuggester {
    pub fn new(
        storage: GmaoStorage,
        model: SharedModel,
        cache: Arc<SuggestionCache>,
        max_chars: usize,
    ) -> Self {
        Self {
            storage,
            model,
            cache,
            max_chars,
        }
    }

    /// Suggest edges described by `text` and store them as pending.
    pub async fn suggest(&self, text: &str) -> Result<Vec<DbDependencySuggestion>, GmaoError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GmaoError::InvalidInput("text is empty".to_string()));
        }
        let chars = text.chars().count();
        if chars > self.max_chars {
            return Err(GmaoError::InvalidInput(format!(
                "text is {chars} characters, the limit is {}",
                self.max_chars
            )));
        }

        let assets = self.storage.list_assets_with_aliases().await?;
        if assets.len() < 2 {
            debug!(assets = assets.len(), "not enough assets to link");
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = assets.iter().map(|a| a.asset.id.as_str()).collect();
        let key = format!("{}|{}", content_hash(ids.join(",").as_bytes()), normalize(text));
        let edges = match self.cache.get(&key) {
            Some(hit) => hit,
            None => {
                let edges = self.ask_model(text, &assets).await?;
                self.cache.insert(key, edges.clone());
                edges
            }
        };

        let stored = self.storage.insert_suggestions(edges).await?;
        info!(suggestions = stored.len(), "dependency suggestions stored");
        Ok(stored)
    }

    async fn ask_model(
        &self,
        text: &str,
        assets: &[AssetWithAliases],
    ) -> Result<Vec<SuggestionCreate>, GmaoError> {
        let mut listing = String::new();
        for a in assets {
            listing.push_str(&format!("- id: {}, name: {}", a.asset.id, a.asset.name));
            if !a.aliases.is_empty() {
                listing.push_str(&format!(", aliases: {}", a.aliases.join(", ")));
            }
            listing.push('\n');
        }
        let request = LlmRequest::new(ModelRole::Chat, "dependencies")
            .system(
                "You map dependencies between industrial equipment. An edge source -> target \
                 means the source needs the target to operate. Use only the listed equipment.",
            )
            .text(format!(
                "Equipment:\n{listing}\nDescription:\n{text}\n\nReturn JSON \
                 {{\"dependencies\": [{{\"source\", \"target\", \"kind\", \"confidence\", \"rationale\"}}]}}."
            ))
            .json(dependencies_schema());

        let raw = self.model.generate(request).await?;
        let parsed = match parse_model_json::<DependenciesOutput>(&raw) {
            Ok(out) => out.dependencies,
            Err(e) => {
                warn!(error = %e, "dependency output unreadable, no suggestions");
                Vec::new()
            }
        };
        Ok(resolve_dependencies(parsed, assets))
    }
}

/// Resolve model names to asset ids by id, name or alias. Unknown names,
/// self-loops and repeated edges are dropped; confidence is clamped to
/// `[0, 1]`.
pub fn resolve_dependencies(
    raw: Vec<RawDependency>,
    assets: &[AssetWithAliases],
) -> Vec<SuggestionCreate> {
    let mut lookup: HashMap<String, String> = HashMap::new();
    for a in assets {
        lookup.insert(a.asset.id.clone(), a.asset.id.clone());
        lookup
            .entry(name_key(&a.asset.name))
            .or_insert_with(|| a.asset.id.clone());
        for alias in &a.aliases {
            lookup
                .entry(name_key(alias))
                .or_insert_with(|| a.asset.id.clone());
        }
    }
    let find = |name: &str| {
        lookup
            .get(name.trim())
            .or_else(|| lookup.get(&name_key(name)))
            .cloned()
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for dep in raw {
        let (Some(source), Some(target)) = (find(&dep.source), find(&dep.target)) else {
            debug!(source = %dep.source, target = %dep.target, "dependency on unknown asset dropped");
            continue;
        };
        if source == target {
            continue;
        }
        let kind = dep
            .kind
            .as_deref()
            .map(DependencyKind::from_label)
            .unwrap_or(DependencyKind::Other);
        if !seen.insert((source.clone(), target.clone(), kind)) {
            continue;
        }
        let confidence = dep
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);
        out.push(SuggestionCreate {
            source_asset_id: source,
            target_asset_id: target,
            kind,
            confidence,
            rationale: dep.rationale.filter(|r| !r.trim().is_empty()),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patch::AssetCreate;
    use crate::testing::ScriptedModel;
    use crate::types::domain::SuggestionStatus;
    use std::time::Duration;

    fn raw(source: &str, target: &str, kind: &str, confidence: f64) -> RawDependency {
        RawDependency {
            source: source.into(),
            target: target.into(),
            kind: Some(kind.into()),
            confidence: Some(confidence),
            rationale: None,
        }
    }

    async fn seeded() -> (GmaoStorage, Vec<AssetWithAliases>) {
        let storage = GmaoStorage::connect("sqlite::memory:").await.unwrap();
        let t1 = storage
            .insert_asset(AssetCreate {
                name: "Transformer T1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        storage.add_alias(&t1.id, "TR-1").await.unwrap();
        storage
            .insert_asset(AssetCreate {
                name: "Compressor C1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let assets = storage.list_assets_with_aliases().await.unwrap();
        (storage, assets)
    }

    #[tokio::test]
    async fn resolves_names_and_filters_noise() {
        let (_storage, assets) = seeded().await;
        let t1 = assets.iter().find(|a| a.asset.name == "Transformer T1").unwrap();
        let c1 = assets.iter().find(|a| a.asset.name == "Compressor C1").unwrap();

        let edges = resolve_dependencies(
            vec![
                raw("compressor c1", "tr 1", "Electrical", 1.7),
                raw("Compressor C1", &t1.asset.id, "power", 0.9),
                raw("Compressor C1", "Compressor C1", "power", 0.9),
                raw("Compressor C1", "Boiler B9", "thermal", 0.9),
                raw("Transformer T1", "Compressor C1", "vibes", -0.3),
            ],
            &assets,
        );
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].source_asset_id, c1.asset.id);
        assert_eq!(edges[0].target_asset_id, t1.asset.id);
        assert_eq!(edges[0].kind, DependencyKind::Power);
        assert_eq!(edges[0].confidence, 1.0);
        assert_eq!(edges[1].kind, DependencyKind::Other);
        assert_eq!(edges[1].confidence, 0.0);
    }

    fn suggester(storage: GmaoStorage, model: ScriptedModel) -> DependencySuggester {
        DependencySuggester::new(
            storage,
            Arc::new(model),
            Arc::new(SuggestionCache::new(Duration::from_secs(60))),
            4000,
        )
    }

    #[tokio::test]
    async fn stores_pending_and_caches_by_text() {
        let (storage, _) = seeded().await;
        let model = ScriptedModel::new().on(
            "dependencies",
            r#"{"dependencies": [{"source": "Compressor C1", "target": "TR-1", "kind": "power",
                "confidence": 0.8, "rationale": "C1 is fed from T1"}]}"#,
        );
        let calls = model.calls_handle();
        let s = suggester(storage.clone(), model);

        let stored = s.suggest("Le compresseur C1 est alimenté par le transfo T1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, SuggestionStatus::Pending);

        let again = s.suggest("le compresseur C1 est alimenté par le transfo T1.").await.unwrap();
        assert_eq!(again[0].id, stored[0].id, "same edge is not inserted twice");
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(storage.list_suggestions(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_output_is_empty() {
        let (storage, _) = seeded().await;
        let s = suggester(storage, ScriptedModel::new().on("dependencies", "I cannot help"));
        assert!(s.suggest("C1 depends on T1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn validates_text() {
        let (storage, _) = seeded().await;
        let s = suggester(storage, ScriptedModel::new());
        assert!(matches!(s.suggest("  ").await, Err(GmaoError::InvalidInput(_))));
        let long = "x".repeat(4001);
        assert!(matches!(s.suggest(&long).await, Err(GmaoError::InvalidInput(_))));
    }
}
