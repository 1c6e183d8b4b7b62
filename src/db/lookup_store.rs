use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::LookupItem,
};

/// Generic store for the two-column reference tables. One implementation
/// serves contract types, stages and payment types, parameterized by table
/// and id-column name at construction time.
pub struct LookupStore {
    pool: DbPool,
    table: &'static str,
    id_column: &'static str,
}

impl LookupStore {
    pub fn new(pool: DbPool, table: &'static str, id_column: &'static str) -> Self {
        Self {
            pool,
            table,
            id_column,
        }
    }

    pub fn contract_types(pool: DbPool) -> Self {
        Self::new(pool, "contract_types", "type_id")
    }

    pub fn stages(pool: DbPool) -> Self {
        Self::new(pool, "stages", "stage_id")
    }

    pub fn payment_types(pool: DbPool) -> Self {
        Self::new(pool, "payment_types", "payment_type_id")
    }

    /// Get all rows ordered by name.
    pub async fn list(&self) -> Result<Vec<LookupItem>> {
        let query = format!(
            "SELECT {} AS id, name FROM {} ORDER BY name",
            self.id_column, self.table
        );
        let items = sqlx::query_as::<_, LookupItem>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Insert a new row with the trimmed name and return it with the
    /// generated identity.
    pub async fn insert(&self, name: &str) -> Result<LookupItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("the name must not be empty".to_string()));
        }

        let query = format!("INSERT INTO {} (name) VALUES (?)", self.table);
        let result = sqlx::query(&query)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(LookupItem {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Update the name of every item by id.
    pub async fn save_names(&self, items: &[LookupItem]) -> Result<()> {
        let query = format!(
            "UPDATE {} SET name = ? WHERE {} = ?",
            self.table, self.id_column
        );

        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(&query)
                .bind(&item.name)
                .bind(item.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Delete a row by id. A foreign-key violation is reported as a
    /// conflict and leaves the row intact.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE {} = ?", self.table, self.id_column);
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::on_constraint(e, "the value is used in related records"))?;

        Ok(())
    }
}
