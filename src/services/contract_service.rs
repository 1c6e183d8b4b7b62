use chrono::Local;

use crate::{
    db::{ContractStore, DbPool, LookupStore, OrganizationStore, VatRateStore},
    error::Result,
    models::{Contract, ContractPhase, LookupItem, Organization, Payment, VatRate},
    notify::Notice,
};

/// Working set of contracts together with the reference lists needed to
/// populate their foreign keys. Every mutation happens against this
/// in-memory graph; `save_all` commits the lot and reloads the canonical
/// state from the store.
pub struct ContractService {
    store: ContractStore,
    org_store: OrganizationStore,
    type_store: LookupStore,
    stage_store: LookupStore,
    pay_type_store: LookupStore,
    vat_store: VatRateStore,

    pub orgs: Vec<Organization>,
    pub types: Vec<LookupItem>,
    pub stages: Vec<LookupItem>,
    pub vats: Vec<VatRate>,
    pub pay_types: Vec<LookupItem>,
    pub contracts: Vec<Contract>,
    /// Index of the active contract within `contracts`.
    pub selected: Option<usize>,
    pub search_text: String,

    // Deletions queued against persisted rows until the next save.
    deleted_phases: Vec<(i64, i64)>,
    deleted_payments: Vec<i64>,
}

impl ContractService {
    pub fn new(pool: &DbPool) -> Self {
        Self {
            store: ContractStore::new(pool.clone()),
            org_store: OrganizationStore::new(pool.clone()),
            type_store: LookupStore::contract_types(pool.clone()),
            stage_store: LookupStore::stages(pool.clone()),
            pay_type_store: LookupStore::payment_types(pool.clone()),
            vat_store: VatRateStore::new(pool.clone()),
            orgs: Vec::new(),
            types: Vec::new(),
            stages: Vec::new(),
            vats: Vec::new(),
            pay_types: Vec::new(),
            contracts: Vec::new(),
            selected: None,
            search_text: String::new(),
            deleted_phases: Vec::new(),
            deleted_payments: Vec::new(),
        }
    }

    /// Replace the whole working set from the store. Contracts whose
    /// customer or contractor no longer exists are remapped in memory to
    /// the first (customer) or second (contractor) available organization;
    /// the repair only reaches the store if the contract is saved later.
    pub async fn load(&mut self) -> Result<()> {
        self.orgs = self.org_store.list().await?;
        self.types = self.type_store.list().await?;
        self.stages = self.stage_store.list().await?;
        self.vats = self.vat_store.list().await?;
        self.pay_types = self.pay_type_store.list().await?;

        let mut contracts = self.store.load_all().await?;
        for contract in &mut contracts {
            if !self.orgs.iter().any(|o| o.org_id == contract.customer_id) {
                contract.customer_id = self.default_customer_id();
            }
            if !self.orgs.iter().any(|o| o.org_id == contract.contractor_id) {
                contract.contractor_id = self.default_contractor_id();
            }
        }
        self.contracts = contracts;

        self.deleted_phases.clear();
        self.deleted_payments.clear();
        self.selected = if self.contracts.is_empty() { None } else { Some(0) };

        Ok(())
    }

    fn default_customer_id(&self) -> i64 {
        self.orgs.first().map(|o| o.org_id).unwrap_or(0)
    }

    fn default_contractor_id(&self) -> i64 {
        self.orgs
            .get(1)
            .or_else(|| self.orgs.first())
            .map(|o| o.org_id)
            .unwrap_or(0)
    }

    /// Append a new contract with identity 0, signed today, defaulted to
    /// the first available reference rows, and make it the active one.
    pub fn add_contract(&mut self) {
        let contract = Contract {
            contract_id: 0,
            date_signed: Local::now().date_naive(),
            customer_id: self.default_customer_id(),
            contractor_id: self.default_contractor_id(),
            type_id: self.types.first().map(|t| t.id).unwrap_or(0),
            stage_id: self.stages.first().map(|s| s.id).unwrap_or(0),
            vat_id: self.vats.first().map(|v| v.vat_id).unwrap_or(0),
            due_date: None,
            subject: Some(String::new()),
            note: Some(String::new()),
            phases: Vec::new(),
            payments: Vec::new(),
        };
        self.contracts.insert(0, contract);
        self.selected = Some(0);
    }

    /// Delete the active contract. An unsaved contract is removed from
    /// memory only; a persisted one is deleted from the store after the
    /// caller confirms, and the selection moves to the first remaining
    /// contract.
    pub async fn delete_selected<F>(&mut self, confirm: F) -> Result<()>
    where
        F: FnOnce(&Notice) -> bool,
    {
        let Some(idx) = self.selected else {
            return Ok(());
        };
        // A stale index (the list shrank since the selection was set) is
        // cleared rather than acted on.
        let Some(contract) = self.contracts.get(idx) else {
            self.selected = None;
            return Ok(());
        };
        let (is_new, contract_id) = (contract.is_new(), contract.contract_id);

        if is_new {
            self.contracts.remove(idx);
            self.selected = None;
            return Ok(());
        }

        let prompt = Notice::ConfirmDelete(
            "Delete the contract together with its phases and payments?".to_string(),
        );
        if !confirm(&prompt) {
            return Ok(());
        }

        self.store.delete(contract_id).await?;
        self.contracts.remove(idx);
        self.selected = if self.contracts.is_empty() { None } else { Some(0) };

        Ok(())
    }

    /// Commit every pending change, then reload the canonical state.
    pub async fn save_all(&mut self) -> Result<Notice> {
        self.store
            .save_workspace(
                &mut self.contracts,
                &self.deleted_phases,
                &self.deleted_payments,
            )
            .await?;
        self.load().await?;

        Ok(Notice::Saved("Saved.".to_string()))
    }

    /// Append a payment to the active contract: today, zero amount, first
    /// payment type.
    pub fn add_payment(&mut self) {
        let payment_type_id = self.pay_types.first().map(|t| t.id).unwrap_or(0);
        let Some(contract) = self.selected.and_then(|i| self.contracts.get_mut(i)) else {
            return;
        };
        contract.payments.push(Payment {
            payment_id: 0,
            contract_id: contract.contract_id,
            payment_date: Local::now().date_naive(),
            amount: 0.0,
            payment_type_id,
            document_number: Some(String::new()),
        });
    }

    /// Remove the last payment of the active contract; a persisted one is
    /// queued for deletion on the next save.
    pub fn delete_payment(&mut self) {
        let Some(contract) = self.selected.and_then(|i| self.contracts.get_mut(i)) else {
            return;
        };
        let Some(payment) = contract.payments.pop() else {
            return;
        };
        if !payment.is_new() {
            self.deleted_payments.push(payment.payment_id);
        }
    }

    /// Append a phase with the next sequential number: today as due date,
    /// first stage, zero amount and advance.
    pub fn add_phase(&mut self) {
        let stage_id = self.stages.first().map(|s| s.id);
        let Some(contract) = self.selected.and_then(|i| self.contracts.get_mut(i)) else {
            return;
        };
        let phase_num = contract.next_phase_num();
        contract.phases.push(ContractPhase {
            contract_id: contract.contract_id,
            phase_num,
            due_date: Some(Local::now().date_naive()),
            stage_id,
            amount: Some(0.0),
            advance: Some(0.0),
            subject: Some(String::new()),
        });
    }

    /// Remove the highest-numbered phase. Phases of an unsaved contract
    /// (or a phase numbered 0) never touch the queued deletes.
    pub fn delete_phase(&mut self) {
        let Some(contract) = self.selected.and_then(|i| self.contracts.get_mut(i)) else {
            return;
        };
        let contract_id = contract.contract_id;
        let phases = &mut contract.phases;

        let Some(pos) = phases
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| p.phase_num)
            .map(|(i, _)| i)
        else {
            return;
        };
        let phase = phases.remove(pos);

        if contract_id != 0 && phase.phase_num != 0 {
            self.deleted_phases.push((contract_id, phase.phase_num));
        }
    }

    /// Case-insensitive substring match over subject, note, the contract
    /// id as text and the signed date formatted as dd.MM.yyyy.
    pub fn matches(&self, contract: &Contract) -> bool {
        let text = self.search_text.trim();
        if text.is_empty() {
            return true;
        }
        let needle = text.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

        contract.subject.as_deref().is_some_and(&contains)
            || contract.note.as_deref().is_some_and(&contains)
            || contains(&contract.contract_id.to_string())
            || contains(&contract.date_signed.format("%d.%m.%Y").to_string())
    }

    /// The visible subset; filtering never mutates the working set.
    pub fn visible(&self) -> Vec<&Contract> {
        self.contracts.iter().filter(|c| self.matches(c)).collect()
    }

    pub fn selected_contract(&self) -> Option<&Contract> {
        self.selected.and_then(|i| self.contracts.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contract_store::tests::{sample_contract, seed_references};
    use crate::db::test_pool;
    use chrono::NaiveDate;

    async fn loaded_service(pool: &DbPool) -> ContractService {
        let mut service = ContractService::new(pool);
        service.load().await.unwrap();
        service
    }

    #[tokio::test]
    async fn add_contract_defaults_to_first_available_references() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();

        let contract = service.selected_contract().unwrap();
        assert!(contract.is_new());
        assert_eq!(contract.customer_id, service.orgs[0].org_id);
        assert_eq!(contract.contractor_id, service.orgs[1].org_id);
        assert_eq!(contract.type_id, service.types[0].id);
        assert_eq!(contract.vat_id, service.vats[0].vat_id);
    }

    #[tokio::test]
    async fn phase_numbers_are_sequential() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();
        service.add_phase();
        service.add_phase();
        service.add_phase();

        let nums: Vec<i64> = service.selected_contract().unwrap().phases.iter()
            .map(|p| p.phase_num)
            .collect();
        assert_eq!(nums, vec![1, 2, 3]);

        service.add_phase();
        assert_eq!(service.selected_contract().unwrap().phases.last().unwrap().phase_num, 4);
    }

    #[tokio::test]
    async fn save_all_round_trips_a_new_contract() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();
        {
            let contract = &mut service.contracts[0];
            contract.subject = Some("Supply agreement".to_string());
            contract.date_signed = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();
        }
        service.add_phase();
        service.add_payment();

        let notice = service.save_all().await.unwrap();
        assert_eq!(notice, Notice::Saved("Saved.".to_string()));

        // After the reload the contract carries a store-generated identity
        // and the field values it had before the save.
        let contract = service.selected_contract().unwrap();
        assert!(contract.contract_id > 0);
        assert_eq!(contract.subject.as_deref(), Some("Supply agreement"));
        assert_eq!(contract.phases.len(), 1);
        assert_eq!(contract.payments.len(), 1);
        assert!(contract.payments[0].payment_id > 0);
    }

    #[tokio::test]
    async fn delete_selected_unsaved_contract_is_memory_only() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();
        service
            .delete_selected(|_| panic!("no confirmation for an unsaved contract"))
            .await
            .unwrap();

        assert!(service.contracts.is_empty());
        assert_eq!(service.selected, None);
    }

    #[tokio::test]
    async fn delete_selected_persisted_contract_requires_confirmation() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let store = ContractStore::new(pool.clone());
        let mut contracts = vec![sample_contract(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())];
        store.save_workspace(&mut contracts, &[], &[]).await.unwrap();

        let mut service = loaded_service(&pool).await;
        assert_eq!(service.contracts.len(), 1);

        // Declined: nothing happens.
        service
            .delete_selected(|notice| {
                assert!(matches!(notice, Notice::ConfirmDelete(_)));
                false
            })
            .await
            .unwrap();
        assert_eq!(service.contracts.len(), 1);

        // Confirmed: gone from store and memory.
        service.delete_selected(|_| true).await.unwrap();
        assert!(service.contracts.is_empty());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_selection_is_cleared_instead_of_acted_on() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        // Points past the (empty) working set, as a presentation layer
        // could leave it after the list shrank.
        service.selected = Some(3);

        assert!(service.selected_contract().is_none());
        service.add_payment();
        service.add_phase();
        service.delete_payment();
        service.delete_phase();

        service
            .delete_selected(|_| panic!("nothing to confirm for a stale selection"))
            .await
            .unwrap();
        assert_eq!(service.selected, None);
    }

    #[tokio::test]
    async fn delete_payment_queues_persisted_rows_until_save() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();
        service.add_payment();
        service.save_all().await.unwrap();

        let payment_id = service.selected_contract().unwrap().payments[0].payment_id;
        assert!(payment_id > 0);

        service.delete_payment();
        assert!(service.selected_contract().unwrap().payments.is_empty());

        // Still in the store until the pending delete is committed.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        service.save_all().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn delete_phase_removes_the_highest_numbered() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let mut service = loaded_service(&pool).await;

        service.add_contract();
        service.add_phase();
        service.add_phase();
        service.add_phase();

        service.delete_phase();
        let nums: Vec<i64> = service.selected_contract().unwrap().phases.iter()
            .map(|p| p.phase_num)
            .collect();
        assert_eq!(nums, vec![1, 2]);
    }

    #[tokio::test]
    async fn orphaned_organization_references_are_remapped_on_load() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let store = ContractStore::new(pool.clone());
        let mut contracts = vec![sample_contract(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())];
        store.save_workspace(&mut contracts, &[], &[]).await.unwrap();

        // Break the references behind the store's back (checks are off so
        // the orphan can exist at all).
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE contracts SET customer_id = 999, contractor_id = 998")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();

        let service = loaded_service(&pool).await;
        let contract = service.selected_contract().unwrap();
        assert_eq!(contract.customer_id, service.orgs[0].org_id);
        assert_eq!(contract.contractor_id, service.orgs[1].org_id);
    }

    #[tokio::test]
    async fn filter_matches_subject_id_and_formatted_date() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let store = ContractStore::new(pool.clone());
        let mut first = sample_contract(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        first.subject = Some("Roof repair".to_string());
        let mut second = sample_contract(NaiveDate::from_ymd_opt(2023, 11, 20).unwrap());
        second.subject = Some("Snow removal".to_string());
        let mut contracts = vec![first, second];
        store.save_workspace(&mut contracts, &[], &[]).await.unwrap();

        let mut service = loaded_service(&pool).await;

        service.search_text = "roof".to_string();
        let visible = service.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].subject.as_deref(), Some("Roof repair"));

        // The signed date participates as dd.MM.yyyy text.
        service.search_text = "20.11.2023".to_string();
        assert_eq!(service.visible().len(), 1);

        service.search_text = contracts[0].contract_id.to_string();
        assert!(!service.visible().is_empty());

        service.search_text = "   ".to_string();
        assert_eq!(service.visible().len(), 2);
    }
}
