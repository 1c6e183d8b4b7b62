use std::collections::HashMap;

use crate::{
    db::DbPool,
    error::Result,
    models::{Contract, ContractPhase, Payment},
};

/// Store for the contract aggregate. Loads contracts eagerly with their
/// phases and payments and commits a whole working set as one unit of work.
pub struct ContractStore {
    pool: DbPool,
}

impl ContractStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get all contracts, newest signed first, with phases and payments
    /// attached.
    pub async fn load_all(&self) -> Result<Vec<Contract>> {
        let mut contracts = sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts ORDER BY date_signed DESC, contract_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let phases = sqlx::query_as::<_, ContractPhase>(
            "SELECT * FROM contract_phases ORDER BY contract_id, phase_num",
        )
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments ORDER BY contract_id, payment_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let index: HashMap<i64, usize> = contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.contract_id, i))
            .collect();

        for phase in phases {
            if let Some(&i) = index.get(&phase.contract_id) {
                contracts[i].phases.push(phase);
            }
        }
        for payment in payments {
            if let Some(&i) = index.get(&payment.contract_id) {
                contracts[i].payments.push(payment);
            }
        }

        Ok(contracts)
    }

    /// Commit every pending change in one transaction: queued deletions
    /// first, then inserts for id-0 rows (writing the generated identity
    /// back onto the in-memory object) and updates for the rest. Phases
    /// are upserted on their composite key.
    pub async fn save_workspace(
        &self,
        contracts: &mut [Contract],
        deleted_phases: &[(i64, i64)],
        deleted_payments: &[i64],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for payment_id in deleted_payments {
            sqlx::query("DELETE FROM payments WHERE payment_id = ?")
                .bind(payment_id)
                .execute(&mut *tx)
                .await?;
        }

        for (contract_id, phase_num) in deleted_phases {
            sqlx::query("DELETE FROM contract_phases WHERE contract_id = ? AND phase_num = ?")
                .bind(contract_id)
                .bind(phase_num)
                .execute(&mut *tx)
                .await?;
        }

        for contract in contracts.iter_mut() {
            if contract.is_new() {
                let result = sqlx::query(
                    r#"
                    INSERT INTO contracts
                        (date_signed, customer_id, contractor_id, type_id,
                         stage_id, vat_id, due_date, subject, note)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(contract.date_signed)
                .bind(contract.customer_id)
                .bind(contract.contractor_id)
                .bind(contract.type_id)
                .bind(contract.stage_id)
                .bind(contract.vat_id)
                .bind(contract.due_date)
                .bind(&contract.subject)
                .bind(&contract.note)
                .execute(&mut *tx)
                .await?;

                contract.contract_id = result.last_insert_rowid();
            } else {
                sqlx::query(
                    r#"
                    UPDATE contracts
                    SET date_signed = ?, customer_id = ?, contractor_id = ?, type_id = ?,
                        stage_id = ?, vat_id = ?, due_date = ?, subject = ?, note = ?
                    WHERE contract_id = ?
                    "#,
                )
                .bind(contract.date_signed)
                .bind(contract.customer_id)
                .bind(contract.contractor_id)
                .bind(contract.type_id)
                .bind(contract.stage_id)
                .bind(contract.vat_id)
                .bind(contract.due_date)
                .bind(&contract.subject)
                .bind(&contract.note)
                .bind(contract.contract_id)
                .execute(&mut *tx)
                .await?;
            }

            for phase in &mut contract.phases {
                phase.contract_id = contract.contract_id;
                sqlx::query(
                    r#"
                    INSERT INTO contract_phases
                        (contract_id, phase_num, due_date, stage_id, amount, advance, subject)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(contract_id, phase_num) DO UPDATE SET
                        due_date = excluded.due_date,
                        stage_id = excluded.stage_id,
                        amount = excluded.amount,
                        advance = excluded.advance,
                        subject = excluded.subject
                    "#,
                )
                .bind(phase.contract_id)
                .bind(phase.phase_num)
                .bind(phase.due_date)
                .bind(phase.stage_id)
                .bind(phase.amount)
                .bind(phase.advance)
                .bind(&phase.subject)
                .execute(&mut *tx)
                .await?;
            }

            for payment in &mut contract.payments {
                payment.contract_id = contract.contract_id;
                if payment.is_new() {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO payments
                            (contract_id, payment_date, amount, payment_type_id, document_number)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(payment.contract_id)
                    .bind(payment.payment_date)
                    .bind(payment.amount)
                    .bind(payment.payment_type_id)
                    .bind(&payment.document_number)
                    .execute(&mut *tx)
                    .await?;

                    payment.payment_id = result.last_insert_rowid();
                } else {
                    sqlx::query(
                        r#"
                        UPDATE payments
                        SET contract_id = ?, payment_date = ?, amount = ?,
                            payment_type_id = ?, document_number = ?
                        WHERE payment_id = ?
                        "#,
                    )
                    .bind(payment.contract_id)
                    .bind(payment.payment_date)
                    .bind(payment.amount)
                    .bind(payment.payment_type_id)
                    .bind(&payment.document_number)
                    .bind(payment.payment_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(())
    }

    /// Delete a contract; the store cascades to its phases and payments.
    pub async fn delete(&self, contract_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM contracts WHERE contract_id = ?")
            .bind(contract_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
