pub mod contract_service;
pub mod lookup_service;
pub mod organization_service;
pub mod report_service;
pub mod vat_service;

pub use contract_service::ContractService;
pub use lookup_service::LookupService;
pub use organization_service::OrganizationService;
pub use report_service::{ReportService, ReportTable, REPORTS};
pub use vat_service::VatRateService;
