use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::Result;

pub mod contract_store;
pub mod lookup_store;
pub mod organization_store;
pub mod vat_store;

pub use contract_store::ContractStore;
pub use lookup_store::LookupStore;
pub use organization_store::OrganizationStore;
pub use vat_store::VatRateStore;

pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool.
///
/// Foreign keys are switched on for every connection; the schema relies on
/// them to cascade contract children and to reject deletes of referenced
/// lookup rows.
pub async fn init_db_pool(db_path: &Path) -> Result<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?;

    setup_database(&pool).await?;

    Ok(pool)
}

/// Set up the database schema: the eight tables and the three read-only
/// report views. The view columns carry the human-readable labels the
/// report projection consumes verbatim.
async fn setup_database(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            org_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT,
            phone TEXT,
            inn TEXT,
            bank_account TEXT,
            bik TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contract_types (
            type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            stage_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vat_rates (
            vat_id INTEGER PRIMARY KEY AUTOINCREMENT,
            rate REAL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_types (
            payment_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Organizations and lookups are deliberately not ON DELETE CASCADE:
    // deleting a referenced row must fail with a constraint violation.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            contract_id INTEGER PRIMARY KEY AUTOINCREMENT,
            date_signed TEXT NOT NULL,
            customer_id INTEGER NOT NULL REFERENCES organizations(org_id),
            contractor_id INTEGER NOT NULL REFERENCES organizations(org_id),
            type_id INTEGER NOT NULL REFERENCES contract_types(type_id),
            stage_id INTEGER NOT NULL REFERENCES stages(stage_id),
            vat_id INTEGER NOT NULL REFERENCES vat_rates(vat_id),
            due_date TEXT,
            subject TEXT,
            note TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contract_phases (
            contract_id INTEGER NOT NULL
                REFERENCES contracts(contract_id) ON DELETE CASCADE,
            phase_num INTEGER NOT NULL,
            due_date TEXT,
            stage_id INTEGER REFERENCES stages(stage_id),
            amount REAL,
            advance REAL,
            subject TEXT,
            PRIMARY KEY (contract_id, phase_num)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            payment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contract_id INTEGER NOT NULL
                REFERENCES contracts(contract_id) ON DELETE CASCADE,
            payment_date TEXT NOT NULL,
            amount REAL NOT NULL,
            payment_type_id INTEGER NOT NULL
                REFERENCES payment_types(payment_type_id),
            document_number TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_contract_info AS
        SELECT
            c.contract_id AS "Код_договора",
            cust.name AS "Заказчик",
            org.name AS "Исполнитель",
            t.name AS "Тип_договора",
            s.name AS "Стадия",
            c.date_signed AS "Дата_заключения",
            c.due_date AS "Дата_исполнения",
            c.subject AS "Тема",
            COALESCE((SELECT SUM(ph.amount) FROM contract_phases ph
                      WHERE ph.contract_id = c.contract_id), 0) AS "Плановая_сумма",
            COALESCE((SELECT SUM(pm.amount) FROM payments pm
                      WHERE pm.contract_id = c.contract_id), 0) AS "Оплачено",
            COALESCE((SELECT SUM(ph.amount) FROM contract_phases ph
                      WHERE ph.contract_id = c.contract_id), 0)
              - COALESCE((SELECT SUM(pm.amount) FROM payments pm
                          WHERE pm.contract_id = c.contract_id), 0)
              AS "Дебиторская_задолженность"
        FROM contracts c
        JOIN organizations cust ON cust.org_id = c.customer_id
        JOIN organizations org ON org.org_id = c.contractor_id
        JOIN contract_types t ON t.type_id = c.type_id
        JOIN stages s ON s.stage_id = c.stage_id;
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_payment_schedule AS
        SELECT
            p.contract_id AS "Код_договора",
            c.subject AS "Тема_договора",
            p.payment_date AS "Дата_оплаты",
            p.amount AS "Сумма_оплаты",
            pt.name AS "Вид_оплаты",
            p.document_number AS "№_платежного_документа"
        FROM payments p
        JOIN contracts c ON c.contract_id = p.contract_id
        JOIN payment_types pt ON pt.payment_type_id = p.payment_type_id;
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_plan_schedule AS
        SELECT
            ph.contract_id AS "Код_договора",
            c.subject AS "Тема_договора",
            ph.phase_num AS "Номер_этапа",
            ph.due_date AS "Дата_исполнения_этапа",
            ph.amount AS "Сумма_этапа",
            ph.advance AS "Сумма_аванса",
            s.name AS "Стадия_этапа"
        FROM contract_phases ph
        JOIN contracts c ON c.contract_id = ph.contract_id
        LEFT JOIN stages s ON s.stage_id = ph.stage_id;
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// In-memory database with the full schema, for tests. A single connection
/// keeps the database alive for the pool's lifetime.
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("failed to open in-memory database");

    setup_database(&pool).await.expect("failed to set up schema");

    pool
}
