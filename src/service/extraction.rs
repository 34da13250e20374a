//! Multi-pass extraction of an uploaded equipment manual.
//!
//! Passes run one after another against the same PDF:
//! metadata, classification, sections, assets, components and spare parts,
//! maintenance plans. Only the metadata pass is fatal; every later pass
//! degrades to an empty result so a partial manual still yields records.

use crate::db::patch::{AssetCreate, ComponentCreate, MaintenancePlanCreate, SparePartCreate};
use crate::db::{DbDocument, ExtractionCounts, GmaoStorage};
use crate::error::GmaoError;
use crate::service::blobs::BlobStore;
use crate::service::cache::DocumentHashCache;
use crate::service::classifier::classify_document;
use crate::service::llm::{LlmRequest, ModelRole, SharedModel, generate_json};
use crate::text::{name_key, non_blank};
use crate::types::domain::{Criticality, IntervalUnit};
use crate::types::extraction::{
    AssetsOutput, DocumentMetadata, ExtractedSection, MaintenanceOutput, PartsOutput,
    SectionsOutput, assets_schema, maintenance_schema, metadata_schema, parts_schema,
    sections_schema,
};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

const SYSTEM: &str = "You extract structured maintenance data from industrial equipment \
manuals. Report only what the document states; leave unknown fields null. \
Keep the document's language for free text.";

/// Chunks longer than this are split, paragraph boundaries first.
const MAX_CHUNK_CHARS: usize = 2000;

#[derive(Clone)]
pub struct ExtractionPipeline {
    storage: GmaoStorage,
    blobs: BlobStore,
    model: SharedModel,
    metadata_cache: Arc<DocumentHashCache>,
}

impl ExtractionPipeline {
    pub fn new(
        storage: GmaoStorage,
        blobs: BlobStore,
        model: SharedModel,
        metadata_cache: Arc<DocumentHashCache>,
    ) -> Self {
        Self {
            storage,
            blobs,
            model,
            metadata_cache,
        }
    }

    /// Run [`run`](Self::run) on the runtime without waiting for it.
    pub fn spawn(&self, document_id: String) -> JoinHandle<()> {
        let pipeline = self.clone();
        let span = info_span!("extraction", document_id = %document_id);
        tokio::spawn(
            async move {
                let _ = pipeline.run(&document_id).await;
            }
            .instrument(span),
        )
    }

    /// Extract `document_id` and record the outcome on the document row.
    pub async fn run(&self, document_id: &str) -> Result<ExtractionCounts, GmaoError> {
        match self.extract(document_id).await {
            Ok(counts) => {
                info!(
                    document_id,
                    assets = counts.assets,
                    components = counts.components,
                    spare_parts = counts.spare_parts,
                    tasks = counts.tasks,
                    "extraction finished"
                );
                Ok(counts)
            }
            Err(e) => {
                error!(document_id, error = %e, "extraction failed");
                if let Err(mark_err) = self
                    .storage
                    .mark_document_failed(document_id, &e.to_string())
                    .await
                {
                    error!(document_id, error = %mark_err, "could not record extraction failure");
                }
                Err(e)
            }
        }
    }

    async fn extract(&self, document_id: &str) -> Result<ExtractionCounts, GmaoError> {
        let doc = self.storage.get_document(document_id).await?;
        self.storage.mark_document_processing(&doc.id).await?;
        let pdf = self.blobs.get(&doc.storage_path).await?;

        let metadata = self.metadata_pass(&doc.content_hash, &pdf).await?;
        let category = classify_document(self.model.as_ref(), &pdf, &metadata).await;

        self.storage.clear_extracted_rows(&doc.id).await?;

        let sections: SectionsOutput = self
            .soft_pass(
                self.request("sections", &pdf, &metadata)
                    .text(
                        "Split the document into its sections. For each, return the heading \
                         and the full text content.",
                    )
                    .json(sections_schema()),
            )
            .await;
        let chunks = sections_to_chunks(sections.sections);
        self.storage.replace_chunks(&doc.id, &chunks).await?;
        debug!(document_id = %doc.id, chunks = chunks.len(), "sections stored");

        let index = self.assets_pass(&doc, &pdf, &metadata).await?;
        let mut counts = ExtractionCounts {
            assets: index.ids.len() as i64,
            ..Default::default()
        };
        if index.ids.is_empty() {
            warn!(document_id = %doc.id, "no asset found, skipping parts and maintenance");
            self.storage
                .mark_document_extracted(&doc.id, category, counts)
                .await?;
            return Ok(counts);
        }

        let (components, spare_parts) = self.parts_pass(&doc, &pdf, &metadata, &index).await?;
        counts.components = components;
        counts.spare_parts = spare_parts;
        counts.tasks = self.maintenance_pass(&doc, &pdf, &metadata, &index).await?;

        self.storage
            .mark_document_extracted(&doc.id, category, counts)
            .await?;
        Ok(counts)
    }

    fn request(&self, task: &'static str, pdf: &[u8], metadata: &DocumentMetadata) -> LlmRequest {
        let mut context = String::new();
        if let Some(title) = metadata.title.as_deref() {
            context.push_str(&format!("Document: {title}\n"));
        }
        if let Some(manufacturer) = metadata.manufacturer.as_deref() {
            context.push_str(&format!("Manufacturer: {manufacturer}\n"));
        }
        let request = LlmRequest::new(ModelRole::Extraction, task)
            .system(SYSTEM)
            .blob("application/pdf", pdf);
        if context.is_empty() {
            request
        } else {
            request.text(context)
        }
    }

    /// Model failures and malformed output become an empty result.
    async fn soft_pass<T: DeserializeOwned + Default>(&self, request: LlmRequest) -> T {
        let task = request.task;
        match generate_json(self.model.as_ref(), request).await {
            Ok(out) => out,
            Err(e) => {
                warn!(task, error = %e, "extraction pass degraded to empty result");
                T::default()
            }
        }
    }

    async fn metadata_pass(
        &self,
        content_hash: &str,
        pdf: &[u8],
    ) -> Result<DocumentMetadata, GmaoError> {
        if let Some(hit) = self.metadata_cache.get(&self.storage, content_hash).await? {
            return Ok(hit);
        }
        let request = LlmRequest::new(ModelRole::Extraction, "metadata")
            .system(SYSTEM)
            .blob("application/pdf", pdf)
            .text(
                "Return the document's title, manufacturer, equipment model, document type, \
                 language (ISO 639-1), revision, page count and a two-sentence summary.",
            )
            .json(metadata_schema());
        let metadata: DocumentMetadata = generate_json(self.model.as_ref(), request).await?;
        self.metadata_cache
            .put(&self.storage, content_hash, &metadata)
            .await?;
        Ok(metadata)
    }

    async fn assets_pass(
        &self,
        doc: &DbDocument,
        pdf: &[u8],
        metadata: &DocumentMetadata,
    ) -> Result<AssetIndex, GmaoError> {
        let out: AssetsOutput = self
            .soft_pass(
                self.request("assets", pdf, metadata)
                    .text(
                        "List every piece of equipment this document covers: name, category, \
                         manufacturer, model, serial number, location and a short description.",
                    )
                    .json(assets_schema()),
            )
            .await;

        let mut index = AssetIndex::default();
        let mut seen = HashSet::new();
        for extracted in out.assets {
            let Some(name) = non_blank(Some(&extracted.name)) else {
                continue;
            };
            if !seen.insert(name_key(&name)) {
                continue;
            }
            let serial = non_blank(extracted.serial_number.as_deref());
            let new = AssetCreate {
                name: name.clone(),
                category: non_blank(extracted.category.as_deref()),
                manufacturer: non_blank(extracted.manufacturer.as_deref())
                    .or_else(|| non_blank(metadata.manufacturer.as_deref())),
                model: non_blank(extracted.model.as_deref()),
                serial_number: serial.clone(),
                location: non_blank(extracted.location.as_deref()),
                description: non_blank(extracted.description.as_deref()),
                source_document_id: Some(doc.id.clone()),
                ..Default::default()
            };

            let asset = match self
                .storage
                .find_matching_asset(&name, serial.as_deref())
                .await?
            {
                Some(existing) => {
                    self.storage.fill_asset_gaps(&existing.id, &new).await?;
                    if name_key(&existing.name) != name_key(&name) {
                        self.storage.add_alias(&existing.id, &name).await?;
                    }
                    debug!(asset_id = %existing.id, name = %name, "matched existing asset");
                    existing
                }
                None => {
                    let created = self.storage.insert_asset(new.clone()).await?;
                    debug!(asset_id = %created.id, name = %name, "created asset");
                    created
                }
            };
            index.add(&name, &asset.id);
            index.add(&asset.name, &asset.id);
            if let Some(model) = new.model.as_deref()
                && name_key(model) != name_key(&asset.name)
            {
                self.storage.add_alias(&asset.id, model).await?;
                index.add(model, &asset.id);
            }
        }

        if index.ids.is_empty()
            && let Some(asset_id) = doc.asset_id.as_deref()
        {
            let asset = self.storage.get_asset(asset_id).await?;
            index.add(&asset.name, &asset.id);
        }
        for asset_id in &index.ids {
            self.storage.link_document_asset(&doc.id, asset_id).await?;
        }
        Ok(index)
    }

    async fn parts_pass(
        &self,
        doc: &DbDocument,
        pdf: &[u8],
        metadata: &DocumentMetadata,
        index: &AssetIndex,
    ) -> Result<(i64, i64), GmaoError> {
        let out: PartsOutput = self
            .soft_pass(
                self.request("parts", pdf, metadata)
                    .text(format!(
                        "Known equipment:\n{}\nList the components (sub-assemblies) and the \
                         spare parts of each. Use the equipment name above in `asset`.",
                        index.prompt_list()
                    ))
                    .json(parts_schema()),
            )
            .await;

        let mut component_ids: HashMap<(String, String), String> = HashMap::new();
        for component in out.components {
            let Some(name) = non_blank(Some(&component.name)) else {
                continue;
            };
            let Some(asset_id) = index.resolve(&component.asset) else {
                debug!(asset = %component.asset, "component for unknown asset dropped");
                continue;
            };
            let key = (asset_id.to_string(), name_key(&name));
            if component_ids.contains_key(&key) {
                continue;
            }
            let row = self
                .storage
                .insert_component(ComponentCreate {
                    asset_id: asset_id.to_string(),
                    name,
                    part_number: non_blank(component.part_number.as_deref()),
                    description: non_blank(component.description.as_deref()),
                    source_document_id: Some(doc.id.clone()),
                })
                .await?;
            component_ids.insert(key, row.id);
        }

        let mut seen = HashSet::new();
        let mut spare_parts = 0;
        for part in out.spare_parts {
            let Some(name) = non_blank(Some(&part.name)) else {
                continue;
            };
            let Some(asset_id) = index.resolve(&part.asset) else {
                debug!(asset = %part.asset, "spare part for unknown asset dropped");
                continue;
            };
            let part_number = non_blank(part.part_number.as_deref());
            let identity = part_number.as_deref().map(name_key).unwrap_or_else(|| name_key(&name));
            if !seen.insert((asset_id.to_string(), identity)) {
                continue;
            }
            let component_id = part
                .component
                .as_deref()
                .and_then(|c| component_ids.get(&(asset_id.to_string(), name_key(c))))
                .cloned();
            self.storage
                .insert_spare_part(SparePartCreate {
                    asset_id: asset_id.to_string(),
                    component_id,
                    name,
                    part_number,
                    quantity: part.quantity.map(i64::from),
                    supplier: non_blank(part.supplier.as_deref()),
                    source_document_id: Some(doc.id.clone()),
                })
                .await?;
            spare_parts += 1;
        }
        Ok((component_ids.len() as i64, spare_parts))
    }

    async fn maintenance_pass(
        &self,
        doc: &DbDocument,
        pdf: &[u8],
        metadata: &DocumentMetadata,
        index: &AssetIndex,
    ) -> Result<i64, GmaoError> {
        let out: MaintenanceOutput = self
            .soft_pass(
                self.request("maintenance", pdf, metadata)
                    .text(format!(
                        "Known equipment:\n{}\nList the recurring maintenance tasks: task, \
                         interval value and unit, procedure, criticality (low, medium, high). \
                         Use the equipment name above in `asset`.",
                        index.prompt_list()
                    ))
                    .json(maintenance_schema()),
            )
            .await;

        let mut seen = HashSet::new();
        let mut tasks = 0;
        for task in out.tasks {
            let Some(name) = non_blank(Some(&task.task)) else {
                continue;
            };
            let Some(asset_id) = index.resolve(&task.asset) else {
                debug!(asset = %task.asset, "maintenance task for unknown asset dropped");
                continue;
            };
            if !seen.insert((asset_id.to_string(), name_key(&name))) {
                continue;
            }
            let interval_unit = task.interval_unit.as_deref().and_then(IntervalUnit::from_label);
            self.storage
                .insert_maintenance_plan(MaintenancePlanCreate {
                    asset_id: asset_id.to_string(),
                    task: name,
                    interval_value: task.interval_value.filter(|v| *v > 0.0),
                    interval_unit,
                    procedure: non_blank(task.procedure.as_deref()),
                    criticality: task
                        .criticality
                        .as_deref()
                        .map(Criticality::from_label)
                        .unwrap_or_default(),
                    source_document_id: Some(doc.id.clone()),
                })
                .await?;
            tasks += 1;
        }
        Ok(tasks)
    }
}

/// Names the model may use for an asset, resolved to asset ids.
#[derive(Debug, Default)]
struct AssetIndex {
    by_key: HashMap<String, String>,
    names: Vec<String>,
    ids: Vec<String>,
}

impl AssetIndex {
    fn add(&mut self, name: &str, asset_id: &str) {
        let key = name_key(name);
        if key.is_empty() {
            return;
        }
        if !self.ids.iter().any(|id| id == asset_id) {
            self.ids.push(asset_id.to_string());
            self.names.push(name.to_string());
        }
        self.by_key.entry(key).or_insert_with(|| asset_id.to_string());
    }

    /// Match by name key; a blank name means the only asset, if there is one.
    fn resolve(&self, name: &str) -> Option<&str> {
        let key = name_key(name);
        if key.is_empty() {
            return match self.ids.as_slice() {
                [only] => Some(only),
                _ => None,
            };
        }
        self.by_key.get(&key).map(String::as_str)
    }

    fn prompt_list(&self) -> String {
        self.names
            .iter()
            .map(|n| format!("- {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Drop empty sections and split oversized ones.
fn sections_to_chunks(sections: Vec<ExtractedSection>) -> Vec<(String, String)> {
    let mut chunks = Vec::new();
    for section in sections {
        let content = section.content.trim();
        if content.is_empty() {
            continue;
        }
        let heading = section.heading.trim().to_string();
        for piece in split_long(content, MAX_CHUNK_CHARS) {
            chunks.push((heading.clone(), piece));
        }
    }
    chunks
}

/// Boundaries tried in order, each with the text that rejoins its parts.
const SPLIT_BOUNDARIES: &[(&str, &str)] = &[("\n\n", "\n\n"), ("\n", "\n"), (". ", " ")];

/// Split `content` into pieces of at most `max_chars` characters, preferring
/// paragraph, then line, then sentence boundaries before cutting mid-text.
fn split_long(content: &str, max_chars: usize) -> Vec<String> {
    split_on(content, max_chars.max(1), SPLIT_BOUNDARIES)
}

fn split_on(content: &str, max_chars: usize, boundaries: &[(&str, &str)]) -> Vec<String> {
    if content.chars().count() <= max_chars {
        return vec![content.to_string()];
    }
    let Some(((pattern, joiner), finer)) = boundaries.split_first() else {
        let chars: Vec<char> = content.chars().collect();
        return chars.chunks(max_chars).map(|c| c.iter().collect()).collect();
    };

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for part in content.split_inclusive(pattern).map(str::trim).filter(|p| !p.is_empty()) {
        let part_len = part.chars().count();
        if part_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            pieces.extend(split_on(part, max_chars, finer));
            continue;
        }
        if !current.is_empty() && current_len + joiner.len() + part_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str(joiner);
            current_len += joiner.len();
        }
        current.push_str(part);
        current_len += part_len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
