use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of an id + name reference table (contract types, stages,
/// payment types). The store aliases the table's id column to `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LookupItem {
    pub id: i64,
    pub name: String,
}

impl LookupItem {
    pub fn is_new(&self) -> bool {
        self.id == 0
    }
}

/// VAT percentage in [0, 100]. A `None` rate is a placeholder the save
/// pass skips over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VatRate {
    pub vat_id: i64,
    pub rate: Option<f64>,
}

impl VatRate {
    pub fn is_new(&self) -> bool {
        self.vat_id == 0
    }
}
