use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Contract root entity. Owns its phases and payments; the three lookup
/// references and the two organizations are plain foreign keys resolved
/// against the loaded reference lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub contract_id: i64,
    pub date_signed: NaiveDate,
    pub customer_id: i64,
    pub contractor_id: i64,
    pub type_id: i64,
    pub stage_id: i64,
    pub vat_id: i64,
    pub due_date: Option<NaiveDate>,
    pub subject: Option<String>,
    pub note: Option<String>,

    #[sqlx(skip)]
    pub phases: Vec<ContractPhase>,
    #[sqlx(skip)]
    pub payments: Vec<Payment>,
}

impl Contract {
    pub fn is_new(&self) -> bool {
        self.contract_id == 0
    }

    /// Phase numbers are unique per contract and assigned sequentially.
    pub fn next_phase_num(&self) -> i64 {
        self.phases.iter().map(|p| p.phase_num).max().unwrap_or(0) + 1
    }
}

/// One phase of a contract, keyed by (contract_id, phase_num).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ContractPhase {
    pub contract_id: i64,
    pub phase_num: i64,
    pub due_date: Option<NaiveDate>,
    pub stage_id: Option<i64>,
    pub amount: Option<f64>,
    pub advance: Option<f64>,
    pub subject: Option<String>,
}

/// A payment booked against a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: i64,
    pub contract_id: i64,
    pub payment_date: NaiveDate,
    pub amount: f64,
    pub payment_type_id: i64,
    pub document_number: Option<String>,
}

impl Payment {
    pub fn is_new(&self) -> bool {
        self.payment_id == 0
    }
}
