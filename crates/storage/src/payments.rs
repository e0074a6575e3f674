//! Read side of the payment ledger as seen by bank matching, plus the writes
//! needed to seed it.

use chrono::NaiveDate;
use ledgerlink_core::{Money, PaymentForMatching, PaymentId, TenantId};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;

use crate::db::{date_string, parse_stored_date, parse_stored_money, StorageError};

const TABLE: &str = "payments";

/// Extra rows fetched past `limit` for the exact allocation check to reject.
const ALLOCATION_SLACK: i64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub tenant_id: TenantId,
    pub number: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub contact_name: String,
    pub reference: String,
}

pub async fn insert_payment<'e, E: SqliteExecutor<'e>>(
    executor: E,
    payment: &NewPayment,
) -> Result<PaymentId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO payments (tenant_id, number, payment_date, amount, contact_name, reference) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(payment.tenant_id.0)
    .bind(&payment.number)
    .bind(date_string(payment.date))
    .bind(payment.amount.to_storage_string())
    .bind(&payment.contact_name)
    .bind(&payment.reference)
    .fetch_one(executor)
    .await?;

    Ok(PaymentId(id))
}

pub async fn insert_allocation<'e, E: SqliteExecutor<'e>>(
    executor: E,
    payment_id: PaymentId,
    amount: Money,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO payment_allocations (payment_id, amount) VALUES (?, ?)")
        .bind(payment_id.0)
        .bind(amount.to_storage_string())
        .execute(executor)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: i64,
    number: String,
    payment_date: String,
    amount: String,
    contact_name: String,
    reference: String,
    allocations: Option<String>,
}

/// Payments of `tenant_id` that are not linked to any bank transaction and
/// whose amount exceeds what has been allocated, closest to
/// `|approx_amount|` first, at most `limit` of them.
///
/// SQL orders by a floating-point distance and drops payments whose
/// allocations clearly cover the amount; the final allocation test is done
/// here in decimals.
pub async fn find_unallocated_payments<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: TenantId,
    approx_amount: Money,
    limit: usize,
) -> Result<Vec<PaymentForMatching>, StorageError> {
    let target = approx_amount.abs().as_decimal().to_f64().unwrap_or(0.0);
    let rows = sqlx::query_as::<_, CandidateRow>(
        r#"
        SELECT p.id, p.number, p.payment_date, p.amount, p.contact_name, p.reference,
               GROUP_CONCAT(a.amount, ';') AS allocations
        FROM payments p
        LEFT JOIN payment_allocations a ON a.payment_id = p.id
        WHERE p.tenant_id = ?
          AND NOT EXISTS (
              SELECT 1 FROM bank_transactions t WHERE t.matched_payment_id = p.id
          )
        GROUP BY p.id
        HAVING ABS(CAST(p.amount AS REAL))
               - COALESCE(SUM(ABS(CAST(a.amount AS REAL))), 0) > 0.000001
        ORDER BY ABS(ABS(CAST(p.amount AS REAL)) - ?), p.payment_date, p.id
        LIMIT ?
        "#,
    )
    .bind(tenant_id.0)
    .bind(target)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(ALLOCATION_SLACK))
    .fetch_all(executor)
    .await?;

    let mut candidates = Vec::new();
    for row in rows {
        if candidates.len() >= limit {
            break;
        }
        let amount = parse_stored_money(TABLE, &row.amount)?;
        let mut allocated = Money::zero();
        for raw in row.allocations.as_deref().unwrap_or_default().split(';') {
            if !raw.is_empty() {
                allocated = allocated + parse_stored_money("payment_allocations", raw)?.abs();
            }
        }
        if amount.abs() <= allocated {
            continue;
        }
        candidates.push(PaymentForMatching {
            id: PaymentId(row.id),
            number: row.number,
            date: parse_stored_date(TABLE, &row.payment_date)?,
            amount,
            contact_name: row.contact_name,
            reference: row.reference,
        });
    }
    Ok(candidates)
}
