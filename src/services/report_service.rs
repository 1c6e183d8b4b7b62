use base64::prelude::*;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::{
    db::DbPool,
    error::{AppError, Result},
};

/// The three fixed report views, keyed by view name, with display titles.
pub const REPORTS: &[(&str, &str)] = &[
    ("v_contract_info", "Сведения по договорам"),
    ("v_payment_schedule", "График оплат"),
    ("v_plan_schedule", "График этапов"),
];

/// A fully materialized report: ordered column labels, one ordered map per
/// row, and a summary line over the monetary columns. Never written back.
#[derive(Debug, Clone)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub summary: String,
}

/// Runs the read-only report views and applies the client-side date-range
/// filter, date reformatting and column totals.
pub struct ReportService {
    pool: DbPool,
}

impl ReportService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Execute one of the fixed views and post-process the full result:
    /// rows whose value in any date column falls outside the inclusive
    /// from/to range are dropped, remaining date cells are rewritten as
    /// dd.MM.yyyy, and each monetary column is summed into the summary
    /// line (non-numeric cells ignored).
    pub async fn run(
        &self,
        view: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<ReportTable> {
        if !REPORTS.iter().any(|(name, _)| *name == view) {
            return Err(AppError::Validation(format!("unknown report: {view}")));
        }

        let query = format!("SELECT * FROM {view}");
        let fetched = sqlx::query(&query).fetch_all(&self.pool).await?;

        let columns: Vec<String> = fetched
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(fetched.len());
        for row in &fetched {
            rows.push(materialize_row(row)?);
        }

        let date_columns: Vec<&String> = columns.iter().filter(|c| is_date_column(c)).collect();

        if (from.is_some() || to.is_some()) && !date_columns.is_empty() {
            rows.retain(|row| {
                for column in &date_columns {
                    let Some(date) = row.get(*column).and_then(parse_date) else {
                        continue;
                    };
                    if from.is_some_and(|f| date < f) || to.is_some_and(|t| date > t) {
                        return false;
                    }
                }
                true
            });
        }

        for column in &date_columns {
            for row in &mut rows {
                if let Some(date) = row.get(*column).and_then(parse_date) {
                    row.insert(
                        (*column).clone(),
                        Value::String(date.format("%d.%m.%Y").to_string()),
                    );
                }
            }
        }

        let money_columns: Vec<&String> = columns.iter().filter(|c| is_money_column(c)).collect();
        let summary = if money_columns.is_empty() {
            String::new()
        } else {
            let totals: Vec<String> = money_columns
                .iter()
                .map(|column| format!("{}: {:.2}", column, column_sum(&rows, column)))
                .collect();
            format!("Итоги — {}", totals.join("   "))
        };

        Ok(ReportTable {
            columns,
            rows,
            summary,
        })
    }
}

/// Materialize one row as an ordered column-name → value map, decoding by
/// the value's storage class.
fn materialize_row(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(i)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(BASE64_STANDARD.encode(row.try_get::<Vec<u8>, _>(i)?)),
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

/// A column participates in date filtering when its label carries a
/// date-indicating token.
fn is_date_column(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("дата") || name.contains("date")
}

/// A column is summed when its label carries one of the monetary tokens.
fn is_money_column(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("сумма") || name.contains("оплачено") || name.contains("плановая")
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.date())
                .ok()
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .map(|dt| dt.date())
                .ok()
        })
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Sum of the numeric-parseable values in a column; everything else is
/// ignored.
fn column_sum(rows: &[Map<String, Value>], column: &str) -> f64 {
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter_map(numeric)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contract_store::tests::{sample_contract, seed_references};
    use crate::db::{test_pool, ContractStore};
    use crate::models::{ContractPhase, Payment};
    use serde_json::json;

    #[test]
    fn date_and_money_columns_are_detected_by_token() {
        assert!(is_date_column("Дата_оплаты"));
        assert!(is_date_column("DueDate"));
        assert!(!is_date_column("Сумма_оплаты"));

        assert!(is_money_column("Сумма_этапа"));
        assert!(is_money_column("Оплачено"));
        assert!(is_money_column("Плановая_сумма"));
        assert!(!is_money_column("Дебиторская_задолженность"));
        assert!(!is_money_column("Тема"));
    }

    #[test]
    fn column_sum_ignores_non_numeric_values() {
        let rows: Vec<Map<String, Value>> = [
            json!({"Сумма": 100.00}),
            json!({"Сумма": 250.50}),
            json!({"Сумма": "not a number"}),
            json!({"Сумма": "49.50"}),
            json!({"Сумма": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();

        let sum = column_sum(&rows, "Сумма");
        assert!((sum - 400.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unknown_report_is_rejected() {
        let pool = test_pool().await;
        let service = ReportService::new(pool);

        let err = service.run("contracts", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    async fn seed_payment_schedule(pool: &DbPool) {
        seed_references(pool).await;
        let store = ContractStore::new(pool.clone());

        let mut contract = sample_contract(NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        for (date, amount) in [
            (NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), 100.0),
            (NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(), 250.5),
            (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 49.5),
        ] {
            contract.payments.push(Payment {
                payment_id: 0,
                contract_id: 0,
                payment_date: date,
                amount,
                payment_type_id: 1,
                document_number: None,
            });
        }

        let mut contracts = vec![contract];
        store.save_workspace(&mut contracts, &[], &[]).await.unwrap();
    }

    #[tokio::test]
    async fn date_range_filter_keeps_rows_inside_and_reformats() {
        let pool = test_pool().await;
        seed_payment_schedule(&pool).await;
        let service = ReportService::new(pool);

        let table = service
            .run(
                "v_payment_schedule",
                NaiveDate::from_ymd_opt(2023, 1, 1),
                NaiveDate::from_ymd_opt(2023, 12, 31),
            )
            .await
            .unwrap();

        assert_eq!(table.rows.len(), 2);
        let mut dates: Vec<&str> = table
            .rows
            .iter()
            .map(|r| r["Дата_оплаты"].as_str().unwrap())
            .collect();
        dates.sort();
        assert_eq!(dates, vec!["01.01.2023", "15.06.2023"]);

        // The sum covers only the retained rows.
        assert_eq!(table.summary, "Итоги — Сумма_оплаты: 350.50");
    }

    #[tokio::test]
    async fn unfiltered_report_carries_all_rows_and_totals() {
        let pool = test_pool().await;
        seed_payment_schedule(&pool).await;
        let service = ReportService::new(pool);

        let table = service.run("v_payment_schedule", None, None).await.unwrap();

        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.columns,
            vec![
                "Код_договора",
                "Тема_договора",
                "Дата_оплаты",
                "Сумма_оплаты",
                "Вид_оплаты",
                "№_платежного_документа"
            ]
        );
        assert_eq!(table.summary, "Итоги — Сумма_оплаты: 400.00");

        // Dates are reformatted even without a range filter.
        assert!(table
            .rows
            .iter()
            .any(|r| r["Дата_оплаты"] == json!("01.01.2023")));
    }

    #[tokio::test]
    async fn contract_info_computes_planned_paid_and_receivable() {
        let pool = test_pool().await;
        seed_references(&pool).await;
        let store = ContractStore::new(pool.clone());

        let mut contract = sample_contract(NaiveDate::from_ymd_opt(2024, 5, 5).unwrap());
        contract.phases.push(ContractPhase {
            contract_id: 0,
            phase_num: 1,
            due_date: None,
            stage_id: Some(1),
            amount: Some(1000.0),
            advance: Some(200.0),
            subject: None,
        });
        contract.payments.push(Payment {
            payment_id: 0,
            contract_id: 0,
            payment_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            amount: 400.0,
            payment_type_id: 1,
            document_number: None,
        });
        let mut contracts = vec![contract];
        store.save_workspace(&mut contracts, &[], &[]).await.unwrap();

        let service = ReportService::new(pool);
        let table = service.run("v_contract_info", None, None).await.unwrap();

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row["Плановая_сумма"], json!(1000.0));
        assert_eq!(row["Оплачено"], json!(400.0));
        assert_eq!(row["Дебиторская_задолженность"], json!(600.0));
        assert_eq!(row["Дата_заключения"], json!("05.05.2024"));

        // The receivable column carries no monetary token, so the summary
        // lists the two token-bearing columns only.
        assert_eq!(
            table.summary,
            "Итоги — Плановая_сумма: 1000.00   Оплачено: 400.00"
        );
    }
}
