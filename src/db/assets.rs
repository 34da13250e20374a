use crate::db::models::{DbAlias, DbAsset, DbComponent, DbMaintenancePlan, DbSparePart};
use crate::db::patch::{
    AssetCreate, AssetPatch, ComponentCreate, MaintenancePlanCreate, SparePartCreate,
};
use crate::db::sqlite::GmaoStorage;
use crate::error::GmaoError;
use crate::service::qr;
use crate::text::name_key;
use chrono::Utc;
use uuid::Uuid;

/// Asset plus its aliases, the unit most callers want.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AssetWithAliases {
    #[serde(flatten)]
    pub asset: DbAsset,
    pub aliases: Vec<String>,
}

impl GmaoStorage {
    pub async fn insert_asset(&self, new: AssetCreate) -> Result<DbAsset, GmaoError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO assets (
                id, name, category, manufacturer, model, serial_number, location,
                description, status, parent_id, qr_code, source_document_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(new.name.trim())
        .bind(new.category)
        .bind(new.manufacturer)
        .bind(new.model)
        .bind(new.serial_number)
        .bind(new.location)
        .bind(new.description)
        .bind(new.status)
        .bind(new.parent_id)
        .bind(qr::generate_code())
        .bind(new.source_document_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        self.get_asset(&id).await
    }

    pub async fn get_asset(&self, id: &str) -> Result<DbAsset, GmaoError> {
        sqlx::query_as::<_, DbAsset>("SELECT * FROM assets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GmaoError::NotFound("asset"))
    }

    pub async fn get_asset_by_qr(&self, code: &str) -> Result<DbAsset, GmaoError> {
        sqlx::query_as::<_, DbAsset>("SELECT * FROM assets WHERE qr_code = ?")
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GmaoError::NotFound("asset"))
    }

    pub async fn list_assets(&self) -> Result<Vec<DbAsset>, GmaoError> {
        let rows = sqlx::query_as::<_, DbAsset>("SELECT * FROM assets ORDER BY name COLLATE NOCASE")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_assets_with_aliases(&self) -> Result<Vec<AssetWithAliases>, GmaoError> {
        let assets = self.list_assets().await?;
        let aliases = sqlx::query_as::<_, DbAlias>(
            "SELECT id, asset_id, alias FROM asset_aliases ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(assets
            .into_iter()
            .map(|asset| {
                let names = aliases
                    .iter()
                    .filter(|a| a.asset_id == asset.id)
                    .map(|a| a.alias.clone())
                    .collect();
                AssetWithAliases {
                    asset,
                    aliases: names,
                }
            })
            .collect())
    }

    pub async fn update_asset(&self, id: &str, patch: AssetPatch) -> Result<DbAsset, GmaoError> {
        let mut current = self.get_asset(id).await?;
        if let Some(name) = patch.name {
            current.name = name.trim().to_string();
        }
        if let Some(v) = patch.category {
            current.category = v;
        }
        if let Some(v) = patch.manufacturer {
            current.manufacturer = v;
        }
        if let Some(v) = patch.model {
            current.model = v;
        }
        if let Some(v) = patch.serial_number {
            current.serial_number = v;
        }
        if let Some(v) = patch.location {
            current.location = v;
        }
        if let Some(v) = patch.description {
            current.description = v;
        }
        if let Some(v) = patch.status {
            current.status = v;
        }
        if let Some(v) = patch.parent_id {
            if v.as_deref() == Some(id) {
                return Err(GmaoError::InvalidInput(
                    "an asset cannot be its own parent".to_string(),
                ));
            }
            current.parent_id = v;
        }
        sqlx::query(
            r#"UPDATE assets SET
                name = ?, category = ?, manufacturer = ?, model = ?, serial_number = ?,
                location = ?, description = ?, status = ?, parent_id = ?, updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&current.name)
        .bind(&current.category)
        .bind(&current.manufacturer)
        .bind(&current.model)
        .bind(&current.serial_number)
        .bind(&current.location)
        .bind(&current.description)
        .bind(current.status)
        .bind(&current.parent_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_asset(id).await
    }

    /// Fill columns that are still empty; never overwrites user-entered values.
    pub async fn fill_asset_gaps(&self, id: &str, from: &AssetCreate) -> Result<(), GmaoError> {
        sqlx::query(
            r#"UPDATE assets SET
                category = COALESCE(category, ?),
                manufacturer = COALESCE(manufacturer, ?),
                model = COALESCE(model, ?),
                serial_number = COALESCE(serial_number, ?),
                location = COALESCE(location, ?),
                description = COALESCE(description, ?),
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&from.category)
        .bind(&from.manufacturer)
        .bind(&from.model)
        .bind(&from.serial_number)
        .bind(&from.location)
        .bind(&from.description)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_asset(&self, id: &str) -> Result<(), GmaoError> {
        let res = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(GmaoError::NotFound("asset"));
        }
        Ok(())
    }

    /// Add an alias; returns `false` when an equivalent alias already exists.
    pub async fn add_alias(&self, asset_id: &str, alias: &str) -> Result<bool, GmaoError> {
        let normalized = name_key(alias);
        if normalized.is_empty() {
            return Err(GmaoError::InvalidInput("alias is empty".to_string()));
        }
        let res = sqlx::query(
            r#"INSERT INTO asset_aliases (asset_id, alias, normalized) VALUES (?, ?, ?)
               ON CONFLICT(asset_id, normalized) DO NOTHING"#,
        )
        .bind(asset_id)
        .bind(alias.trim())
        .bind(normalized)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_aliases(&self, asset_id: &str) -> Result<Vec<String>, GmaoError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT alias FROM asset_aliases WHERE asset_id = ? ORDER BY id")
                .bind(asset_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    /// Resolve an extracted asset to an existing row: serial number first,
    /// then name or alias compared by [`name_key`].
    pub async fn find_matching_asset(
        &self,
        name: &str,
        serial_number: Option<&str>,
    ) -> Result<Option<DbAsset>, GmaoError> {
        if let Some(serial) = serial_number.map(str::trim).filter(|s| !s.is_empty()) {
            let by_serial = sqlx::query_as::<_, DbAsset>(
                "SELECT * FROM assets WHERE serial_number = ? COLLATE NOCASE LIMIT 1",
            )
            .bind(serial)
            .fetch_optional(&self.pool)
            .await?;
            if by_serial.is_some() {
                return Ok(by_serial);
            }
        }

        let key = name_key(name);
        if key.is_empty() {
            return Ok(None);
        }
        let by_alias = sqlx::query_as::<_, DbAsset>(
            r#"SELECT a.* FROM assets a
               JOIN asset_aliases al ON al.asset_id = a.id
               WHERE al.normalized = ?
               ORDER BY a.created_at LIMIT 1"#,
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;
        if by_alias.is_some() {
            return Ok(by_alias);
        }

        // Names are not stored normalized; compare in Rust.
        let assets = self.list_assets().await?;
        Ok(assets.into_iter().find(|a| name_key(&a.name) == key))
    }

    // ---- components / spare parts / maintenance plans ---------------------

    pub async fn insert_component(&self, new: ComponentCreate) -> Result<DbComponent, GmaoError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO components (id, asset_id, name, part_number, description, source_document_id)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.asset_id)
        .bind(&new.name)
        .bind(&new.part_number)
        .bind(&new.description)
        .bind(&new.source_document_id)
        .execute(&self.pool)
        .await?;
        Ok(DbComponent {
            id,
            asset_id: new.asset_id,
            name: new.name,
            part_number: new.part_number,
            description: new.description,
            source_document_id: new.source_document_id,
        })
    }

    pub async fn list_components(&self, asset_id: &str) -> Result<Vec<DbComponent>, GmaoError> {
        let rows = sqlx::query_as::<_, DbComponent>(
            "SELECT * FROM components WHERE asset_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_spare_part(&self, new: SparePartCreate) -> Result<DbSparePart, GmaoError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO spare_parts (
                id, asset_id, component_id, name, part_number, quantity, supplier, source_document_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.asset_id)
        .bind(&new.component_id)
        .bind(&new.name)
        .bind(&new.part_number)
        .bind(new.quantity)
        .bind(&new.supplier)
        .bind(&new.source_document_id)
        .execute(&self.pool)
        .await?;
        Ok(DbSparePart {
            id,
            asset_id: new.asset_id,
            component_id: new.component_id,
            name: new.name,
            part_number: new.part_number,
            quantity: new.quantity,
            supplier: new.supplier,
            source_document_id: new.source_document_id,
        })
    }

    pub async fn list_spare_parts(&self, asset_id: &str) -> Result<Vec<DbSparePart>, GmaoError> {
        let rows = sqlx::query_as::<_, DbSparePart>(
            "SELECT * FROM spare_parts WHERE asset_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_maintenance_plan(
        &self,
        new: MaintenancePlanCreate,
    ) -> Result<DbMaintenancePlan, GmaoError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO maintenance_plans (
                id, asset_id, task, interval_value, interval_unit, procedure, criticality,
                source_document_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.asset_id)
        .bind(&new.task)
        .bind(new.interval_value)
        .bind(new.interval_unit)
        .bind(&new.procedure)
        .bind(new.criticality)
        .bind(&new.source_document_id)
        .execute(&self.pool)
        .await?;
        Ok(DbMaintenancePlan {
            id,
            asset_id: new.asset_id,
            task: new.task,
            interval_value: new.interval_value,
            interval_unit: new.interval_unit,
            procedure: new.procedure,
            criticality: new.criticality,
            source_document_id: new.source_document_id,
        })
    }

    pub async fn list_maintenance_plans(
        &self,
        asset_id: &str,
    ) -> Result<Vec<DbMaintenancePlan>, GmaoError> {
        let rows = sqlx::query_as::<_, DbMaintenancePlan>(
            "SELECT * FROM maintenance_plans WHERE asset_id = ? ORDER BY task COLLATE NOCASE",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Drop rows a previous extraction of `document_id` produced, so a
    /// reprocess does not duplicate them. Assets themselves are kept.
    pub async fn clear_extracted_rows(&self, document_id: &str) -> Result<(), GmaoError> {
        let mut tx = self.pool.begin().await?;
        for table in ["spare_parts", "components", "maintenance_plans"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE source_document_id = ?"))
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM document_assets WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
