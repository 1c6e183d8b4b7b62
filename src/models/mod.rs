pub mod contract;
pub mod lookup;
pub mod organization;

pub use contract::{Contract, ContractPhase, Payment};
pub use lookup::{LookupItem, VatRate};
pub use organization::Organization;
