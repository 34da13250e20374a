use crate::db::models::DbWorkOrder;
use crate::db::patch::{WorkOrderCreate, WorkOrderPatch};
use crate::db::sqlite::GmaoStorage;
use crate::error::GmaoError;
use crate::types::domain::WorkOrderStatus;
use chrono::Utc;
use uuid::Uuid;

impl GmaoStorage {
    pub async fn insert_work_order(&self, new: WorkOrderCreate) -> Result<DbWorkOrder, GmaoError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(GmaoError::InvalidInput("title is required".to_string()));
        }
        if let Some(asset_id) = new.asset_id.as_deref() {
            self.get_asset(asset_id).await?;
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO work_orders (
                id, asset_id, title, description, priority, status, assignee, due_date,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.asset_id)
        .bind(title)
        .bind(&new.description)
        .bind(new.priority)
        .bind(WorkOrderStatus::Open)
        .bind(&new.assignee)
        .bind(new.due_date)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        self.get_work_order(&id).await
    }

    pub async fn get_work_order(&self, id: &str) -> Result<DbWorkOrder, GmaoError> {
        sqlx::query_as::<_, DbWorkOrder>("SELECT * FROM work_orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GmaoError::NotFound("work order"))
    }

    pub async fn list_work_orders(
        &self,
        asset_id: Option<&str>,
        status: Option<WorkOrderStatus>,
    ) -> Result<Vec<DbWorkOrder>, GmaoError> {
        let rows = sqlx::query_as::<_, DbWorkOrder>(
            r#"SELECT * FROM work_orders
               WHERE (?1 IS NULL OR asset_id = ?1)
                 AND (?2 IS NULL OR status = ?2)
               ORDER BY created_at DESC"#,
        )
        .bind(asset_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent work orders of an asset, newest first.
    pub async fn recent_work_orders(
        &self,
        asset_id: &str,
        limit: u32,
    ) -> Result<Vec<DbWorkOrder>, GmaoError> {
        let rows = sqlx::query_as::<_, DbWorkOrder>(
            "SELECT * FROM work_orders WHERE asset_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_work_order(
        &self,
        id: &str,
        patch: WorkOrderPatch,
    ) -> Result<DbWorkOrder, GmaoError> {
        let mut current = self.get_work_order(id).await?;
        if current.status.is_terminal() {
            return Err(GmaoError::Conflict(format!(
                "work order is {:?} and can no longer change",
                current.status
            )));
        }
        if let Some(next) = patch.status {
            if !current.status.can_transition_to(next) {
                return Err(GmaoError::Conflict(format!(
                    "cannot move work order from {:?} to {:?}",
                    current.status, next
                )));
            }
            if next == WorkOrderStatus::Completed {
                current.completed_at = Some(Utc::now());
            }
            current.status = next;
        }
        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(GmaoError::InvalidInput("title is required".to_string()));
            }
            current.title = title.to_string();
        }
        if let Some(v) = patch.description {
            current.description = v;
        }
        if let Some(v) = patch.priority {
            current.priority = v;
        }
        if let Some(v) = patch.assignee {
            current.assignee = v;
        }
        if let Some(v) = patch.due_date {
            current.due_date = v;
        }

        sqlx::query(
            r#"UPDATE work_orders SET
                title = ?, description = ?, priority = ?, status = ?, assignee = ?,
                due_date = ?, completed_at = ?, updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&current.title)
        .bind(&current.description)
        .bind(current.priority)
        .bind(current.status)
        .bind(&current.assignee)
        .bind(current.due_date)
        .bind(current.completed_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_work_order(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::domain::Priority;

    async fn storage() -> GmaoStorage {
        GmaoStorage::connect("sqlite::memory:").await.unwrap()
    }

    fn order(title: &str) -> WorkOrderCreate {
        WorkOrderCreate {
            title: title.to_string(),
            asset_id: None,
            description: None,
            priority: Priority::High,
            assignee: None,
            due_date: None,
        }
    }

    fn to(status: WorkOrderStatus) -> WorkOrderPatch {
        WorkOrderPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn completion_stamps_completed_at_and_freezes_the_order() {
        let db = storage().await;
        let wo = db.insert_work_order(order("Replace belt")).await.unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Open);

        let wo = db
            .update_work_order(&wo.id, to(WorkOrderStatus::InProgress))
            .await
            .unwrap();
        assert!(wo.completed_at.is_none());
        let wo = db
            .update_work_order(&wo.id, to(WorkOrderStatus::Completed))
            .await
            .unwrap();
        assert!(wo.completed_at.is_some());

        let again = db
            .update_work_order(
                &wo.id,
                WorkOrderPatch {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(again, Err(GmaoError::Conflict(_))));
    }

    #[tokio::test]
    async fn skipping_in_progress_is_a_conflict() {
        let db = storage().await;
        let wo = db.insert_work_order(order("Inspect pump")).await.unwrap();
        let res = db
            .update_work_order(&wo.id, to(WorkOrderStatus::Completed))
            .await;
        assert!(matches!(res, Err(GmaoError::Conflict(_))));
    }

    #[tokio::test]
    async fn unknown_asset_is_rejected() {
        let db = storage().await;
        let mut new = order("Inspect pump");
        new.asset_id = Some("missing".into());
        assert!(matches!(
            db.insert_work_order(new).await,
            Err(GmaoError::NotFound("asset"))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let db = storage().await;
        let a = db.insert_work_order(order("A")).await.unwrap();
        db.insert_work_order(order("B")).await.unwrap();
        db.update_work_order(&a.id, to(WorkOrderStatus::Cancelled))
            .await
            .unwrap();
        let open = db
            .list_work_orders(None, Some(WorkOrderStatus::Open))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "B");
    }
}
