use crate::db::models::DbDependencySuggestion;
use crate::db::sqlite::GmaoStorage;
use crate::error::GmaoError;
use crate::types::domain::{DependencyKind, SuggestionStatus};
use chrono::Utc;
use uuid::Uuid;

/// A resolved edge ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCreate {
    pub source_asset_id: String,
    pub target_asset_id: String,
    pub kind: DependencyKind,
    pub confidence: f64,
    pub rationale: Option<String>,
}

impl GmaoStorage {
    /// Store suggestions, skipping edges already pending or accepted.
    /// Returns the stored rows (new and pre-existing) in input order.
    pub async fn insert_suggestions(
        &self,
        items: Vec<SuggestionCreate>,
    ) -> Result<Vec<DbDependencySuggestion>, GmaoError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(items.len());

        for item in items {
            let existing: Option<(String,)> = sqlx::query_as(
                r#"SELECT id FROM dependency_suggestions
                   WHERE source_asset_id = ? AND target_asset_id = ? AND kind = ?
                     AND status IN ('pending', 'accepted')
                   LIMIT 1"#,
            )
            .bind(&item.source_asset_id)
            .bind(&item.target_asset_id)
            .bind(item.kind)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some((id,)) = existing {
                ids.push(id);
                continue;
            }

            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"INSERT INTO dependency_suggestions (
                    id, source_asset_id, target_asset_id, kind, confidence, rationale,
                    status, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(&item.source_asset_id)
            .bind(&item.target_asset_id)
            .bind(item.kind)
            .bind(item.confidence)
            .bind(&item.rationale)
            .bind(SuggestionStatus::Pending)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            rows.push(self.get_suggestion(&id).await?);
        }
        Ok(rows)
    }

    pub async fn get_suggestion(&self, id: &str) -> Result<DbDependencySuggestion, GmaoError> {
        sqlx::query_as::<_, DbDependencySuggestion>(
            "SELECT * FROM dependency_suggestions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(GmaoError::NotFound("dependency suggestion"))
    }

    pub async fn list_suggestions(
        &self,
        asset_id: Option<&str>,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<DbDependencySuggestion>, GmaoError> {
        let rows = sqlx::query_as::<_, DbDependencySuggestion>(
            r#"SELECT * FROM dependency_suggestions
               WHERE (?1 IS NULL OR source_asset_id = ?1 OR target_asset_id = ?1)
                 AND (?2 IS NULL OR status = ?2)
               ORDER BY created_at DESC, confidence DESC"#,
        )
        .bind(asset_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Accept or reject a pending suggestion.
    pub async fn review_suggestion(
        &self,
        id: &str,
        status: SuggestionStatus,
    ) -> Result<DbDependencySuggestion, GmaoError> {
        let current = self.get_suggestion(id).await?;
        if current.status != SuggestionStatus::Pending {
            return Err(GmaoError::Conflict(format!(
                "suggestion already {:?}",
                current.status
            )));
        }
        sqlx::query("UPDATE dependency_suggestions SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get_suggestion(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patch::AssetCreate;

    async fn two_assets(db: &GmaoStorage) -> (String, String) {
        let a = db
            .insert_asset(AssetCreate {
                name: "Transformer T1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = db
            .insert_asset(AssetCreate {
                name: "Compressor C1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (a.id, b.id)
    }

    fn edge(source: &str, target: &str) -> SuggestionCreate {
        SuggestionCreate {
            source_asset_id: source.to_string(),
            target_asset_id: target.to_string(),
            kind: DependencyKind::Power,
            confidence: 0.8,
            rationale: Some("T1 feeds C1".into()),
        }
    }

    #[tokio::test]
    async fn pending_edges_are_not_duplicated() {
        let db = GmaoStorage::connect("sqlite::memory:").await.unwrap();
        let (t1, c1) = two_assets(&db).await;
        let first = db.insert_suggestions(vec![edge(&t1, &c1)]).await.unwrap();
        let second = db.insert_suggestions(vec![edge(&t1, &c1)]).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(db.list_suggestions(Some(&c1), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_edges_can_be_suggested_again() {
        let db = GmaoStorage::connect("sqlite::memory:").await.unwrap();
        let (t1, c1) = two_assets(&db).await;
        let first = db.insert_suggestions(vec![edge(&t1, &c1)]).await.unwrap();
        let rejected = db
            .review_suggestion(&first[0].id, SuggestionStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.status, SuggestionStatus::Rejected);
        assert!(matches!(
            db.review_suggestion(&first[0].id, SuggestionStatus::Accepted)
                .await,
            Err(GmaoError::Conflict(_))
        ));

        let again = db.insert_suggestions(vec![edge(&t1, &c1)]).await.unwrap();
        assert_ne!(again[0].id, first[0].id);
        let pending = db
            .list_suggestions(None, Some(SuggestionStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
