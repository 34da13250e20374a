//! SQL DDL for initializing the maintenance database.
//! SQLite-first design; tables mirror the hosted schema of the web client.

/// SQLite schema. Notes:
/// - ids are UUID v4 text, timestamps RFC3339 text
/// - enums are stored as snake_case text
/// - owned rows cascade on asset / document deletion
/// - `documents.content_hash` is UNIQUE so re-uploads resolve to the same row
/// - `document_assets` holds every asset a document describes; `documents.asset_id`
///   is only the primary one
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    storage_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    category TEXT NULL,
    status TEXT NOT NULL,
    error TEXT NULL,
    asset_id TEXT NULL REFERENCES assets(id) ON DELETE SET NULL,
    assets_found INTEGER NOT NULL DEFAULT 0,
    components_found INTEGER NOT NULL DEFAULT 0,
    spare_parts_found INTEGER NOT NULL DEFAULT 0,
    tasks_found INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NULL,
    manufacturer TEXT NULL,
    model TEXT NULL,
    serial_number TEXT NULL,
    location TEXT NULL,
    description TEXT NULL,
    status TEXT NOT NULL DEFAULT 'operational',
    parent_id TEXT NULL REFERENCES assets(id) ON DELETE SET NULL,
    qr_code TEXT NOT NULL UNIQUE,
    source_document_id TEXT NULL REFERENCES documents(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assets_serial ON assets(serial_number);

CREATE TABLE IF NOT EXISTS asset_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    alias TEXT NOT NULL,
    normalized TEXT NOT NULL,
    UNIQUE(asset_id, normalized)
);

CREATE INDEX IF NOT EXISTS idx_asset_aliases_normalized ON asset_aliases(normalized);

CREATE TABLE IF NOT EXISTS components (
    id TEXT PRIMARY KEY,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    part_number TEXT NULL,
    description TEXT NULL,
    source_document_id TEXT NULL REFERENCES documents(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS spare_parts (
    id TEXT PRIMARY KEY,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    component_id TEXT NULL REFERENCES components(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    part_number TEXT NULL,
    quantity INTEGER NULL,
    supplier TEXT NULL,
    source_document_id TEXT NULL REFERENCES documents(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS maintenance_plans (
    id TEXT PRIMARY KEY,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    task TEXT NOT NULL,
    interval_value REAL NULL,
    interval_unit TEXT NULL,
    procedure TEXT NULL,
    criticality TEXT NOT NULL DEFAULT 'medium',
    source_document_id TEXT NULL REFERENCES documents(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS work_orders (
    id TEXT PRIMARY KEY,
    asset_id TEXT NULL REFERENCES assets(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    description TEXT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'open',
    assignee TEXT NULL,
    due_date TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_work_orders_asset ON work_orders(asset_id);

CREATE TABLE IF NOT EXISTS document_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    heading TEXT NOT NULL,
    content TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_assets (
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    PRIMARY KEY (document_id, asset_id)
);

CREATE INDEX IF NOT EXISTS idx_document_assets_asset ON document_assets(asset_id);

CREATE INDEX IF NOT EXISTS idx_document_chunks_document ON document_chunks(document_id);

CREATE TABLE IF NOT EXISTS metadata_cache (
    content_hash TEXT PRIMARY KEY,
    metadata TEXT NOT NULL, -- JSON object
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dependency_suggestions (
    id TEXT PRIMARY KEY,
    source_asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    target_asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    confidence REAL NOT NULL,
    rationale TEXT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dependency_suggestions_edge
    ON dependency_suggestions(source_asset_id, target_asset_id, kind);

CREATE TABLE IF NOT EXISTS conversation_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    intent TEXT NULL,
    language TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversation_messages_conversation
    ON conversation_messages(conversation_id, id)
"#;
