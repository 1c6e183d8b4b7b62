use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::VatRate,
};

/// VAT rate store. Same shape as the name lookups, but the value column is
/// a bounded numeric rate instead of free text.
pub struct VatRateStore {
    pool: DbPool,
}

impl VatRateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get all rates ordered by rate, placeholders (NULL) first.
    pub async fn list(&self) -> Result<Vec<VatRate>> {
        let rates = sqlx::query_as::<_, VatRate>("SELECT * FROM vat_rates ORDER BY rate")
            .fetch_all(&self.pool)
            .await?;

        Ok(rates)
    }

    /// Insert a new rate and return it with the generated identity.
    pub async fn insert(&self, rate: f64) -> Result<VatRate> {
        let result = sqlx::query("INSERT INTO vat_rates (rate) VALUES (?)")
            .bind(rate)
            .execute(&self.pool)
            .await?;

        Ok(VatRate {
            vat_id: result.last_insert_rowid(),
            rate: Some(rate),
        })
    }

    /// Persist the list: id-0 items with a rate are inserted and adopt the
    /// generated identity, items with a NULL rate are skipped, the rest are
    /// updated.
    pub async fn save_all(&self, rates: &mut [VatRate]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for item in rates.iter_mut() {
            let Some(rate) = item.rate else {
                continue;
            };

            if item.is_new() {
                let result = sqlx::query("INSERT INTO vat_rates (rate) VALUES (?)")
                    .bind(rate)
                    .execute(&mut *tx)
                    .await?;
                item.vat_id = result.last_insert_rowid();
            } else {
                sqlx::query("UPDATE vat_rates SET rate = ? WHERE vat_id = ?")
                    .bind(rate)
                    .bind(item.vat_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }

    /// Delete a rate by id; a foreign-key violation is a conflict.
    pub async fn delete(&self, vat_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM vat_rates WHERE vat_id = ?")
            .bind(vat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::on_constraint(e, "the VAT rate is used by contracts"))?;

        Ok(())
    }
}
