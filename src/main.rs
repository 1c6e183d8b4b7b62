use anyhow::Result;
use tracing_subscriber::EnvFilter;

use contracts_registry::config::Config;
use contracts_registry::db;
use contracts_registry::services::{ContractService, ReportService, REPORTS};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // No resolvable database file is fatal: there is nothing to work on.
    let config = match Config::resolve() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };
    tracing::info!("using database at {}", config.db_path.display());

    let pool = db::init_db_pool(&config.db_path).await?;

    let mut contracts = ContractService::new(&pool);
    contracts.load().await?;
    tracing::info!(
        contracts = contracts.contracts.len(),
        organizations = contracts.orgs.len(),
        contract_types = contracts.types.len(),
        stages = contracts.stages.len(),
        vat_rates = contracts.vats.len(),
        payment_types = contracts.pay_types.len(),
        "working set loaded"
    );

    let reports = ReportService::new(pool);
    for (view, title) in REPORTS.iter().copied() {
        let table = reports.run(view, None, None).await?;
        tracing::info!(report = title, rows = table.rows.len(), "{}", table.summary);
    }

    Ok(())
}
