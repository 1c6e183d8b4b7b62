use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A customer or contractor party. Identity 0 means "not yet persisted".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub org_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// Tax identification number.
    pub inn: Option<String>,
    pub bank_account: Option<String>,
    /// Bank routing code.
    pub bik: Option<String>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            org_id: 0,
            name: name.into(),
            address: None,
            phone: None,
            inn: None,
            bank_account: None,
            bik: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.org_id == 0
    }
}
