//! Sequential document number allocation.
//!
//! Numbers are allocated from a per-series counter row in
//! `document_sequences`, incremented with a single upsert executed on the
//! caller's transaction. The row lock serializes concurrent allocations
//! and a rolled-back document insert rolls the increment back with it, so
//! numbers stay distinct and gap-free. The unique index on the document
//! number column is the backstop; a violation there surfaces as
//! `AppError::Conflict`.

use service_core::error::AppError;
use sqlx::PgConnection;

/// Series prefix for jobs (`JOB-0001`, ...).
pub const JOB_SERIES: &str = "JOB";
/// Series prefix for invoices (`INV-0001`, ...).
pub const INVOICE_SERIES: &str = "INV";

/// Format a document number as `<PREFIX>-%04d`.
pub fn format_document_number(series: &str, value: i64) -> String {
    format!("{}-{:04}", series, value)
}

/// Allocate the next number in a series. Must be called on the same
/// transaction that inserts the document.
pub async fn next_document_number(
    conn: &mut PgConnection,
    series: &str,
) -> Result<String, AppError> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (series, last_value)
        VALUES ($1, 1)
        ON CONFLICT (series)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(series)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!(
            "Failed to allocate number for series {}: {}",
            series,
            e
        ))
    })?;

    Ok(format_document_number(series, value))
}

/// Map a unique violation on a document number column to a conflict error.
pub(crate) fn map_number_conflict(err: sqlx::Error, context: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Duplicate document number for {}", context))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create {}: {}", context, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded_to_four_digits() {
        assert_eq!(format_document_number(JOB_SERIES, 1), "JOB-0001");
        assert_eq!(format_document_number(INVOICE_SERIES, 42), "INV-0042");
        assert_eq!(format_document_number(JOB_SERIES, 9999), "JOB-9999");
    }

    #[test]
    fn numbers_past_four_digits_keep_growing() {
        assert_eq!(format_document_number(INVOICE_SERIES, 10000), "INV-10000");
    }
}
