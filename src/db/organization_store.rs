use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::Organization,
};

/// Organization store for database operations.
pub struct OrganizationStore {
    pool: DbPool,
}

impl OrganizationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get all organizations ordered by name.
    pub async fn list(&self) -> Result<Vec<Organization>> {
        let orgs =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(orgs)
    }

    /// True when any contract references the organization as customer or
    /// contractor.
    pub async fn is_referenced(&self, org_id: i64) -> Result<bool> {
        let (referenced,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM contracts WHERE customer_id = ? OR contractor_id = ?)",
        )
        .bind(org_id)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(referenced)
    }

    /// Delete an organization. Rejected with a conflict before the store
    /// call is attempted when contracts still reference it.
    pub async fn delete(&self, org_id: i64) -> Result<()> {
        if self.is_referenced(org_id).await? {
            return Err(AppError::Conflict(
                "the organization is used by a contract as customer or contractor".to_string(),
            ));
        }

        sqlx::query("DELETE FROM organizations WHERE org_id = ?")
            .bind(org_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::on_constraint(e, "the organization is used by related records")
            })?;

        Ok(())
    }

    /// Persist the whole list in one transaction: id-0 rows are inserted
    /// and adopt the generated identity, the rest are updated.
    pub async fn save_all(&self, orgs: &mut [Organization]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for org in orgs.iter_mut() {
            if org.is_new() {
                let result = sqlx::query(
                    r#"
                    INSERT INTO organizations (name, address, phone, inn, bank_account, bik)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&org.name)
                .bind(&org.address)
                .bind(&org.phone)
                .bind(&org.inn)
                .bind(&org.bank_account)
                .bind(&org.bik)
                .execute(&mut *tx)
                .await?;

                org.org_id = result.last_insert_rowid();
            } else {
                sqlx::query(
                    r#"
                    UPDATE organizations
                    SET name = ?, address = ?, phone = ?, inn = ?, bank_account = ?, bik = ?
                    WHERE org_id = ?
                    "#,
                )
                .bind(&org.name)
                .bind(&org.address)
                .bind(&org.phone)
                .bind(&org.inn)
                .bind(&org.bank_account)
                .bind(&org.bik)
                .bind(org.org_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }
}
