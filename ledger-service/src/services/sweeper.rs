//! Overdue invoice sweep.
//!
//! A recurring background task that reclassifies `SENT`/`PARTIAL` invoices
//! whose due date has passed as `OVERDUE`. The scan predicate excludes
//! already-`OVERDUE` rows, so re-running is a no-op, and `SKIP LOCKED`
//! keeps the sweep from ever blocking a user-triggered mutation that holds
//! an invoice row lock.

use crate::models::{ActivityType, NewActivity};
use crate::services::activity::{insert_activity, status_change_metadata};
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, OVERDUE_SWEPT_TOTAL};
use service_core::error::AppError;
use sqlx::FromRow;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct SweptInvoice {
    invoice_id: Uuid,
    invoice_number: String,
    prev_status: String,
}

/// Recurring overdue sweep over the invoice ledger.
pub struct OverdueSweeper {
    db: Database,
    interval: Duration,
    timeout: Duration,
}

impl OverdueSweeper {
    pub fn new(db: Database, interval: Duration, timeout: Duration) -> Self {
        Self {
            db,
            interval,
            timeout,
        }
    }

    /// Run the sweep loop until cancelled. The first pass runs
    /// immediately (catching up after downtime), then once per interval.
    /// A pass that errors or exceeds the execution timeout is logged and
    /// retried on the next scheduled run.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "Overdue sweeper started"
        );

        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Overdue sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match tokio::time::timeout(self.timeout, sweep_once(&self.db)).await {
                        Ok(Ok(count)) => {
                            if count > 0 {
                                info!(count = count, "Marked invoices as overdue");
                            }
                        }
                        Ok(Err(e)) => {
                            OVERDUE_SWEPT_TOTAL.with_label_values(&["error"]).inc();
                            error!(error = %e, "Overdue sweep failed, will retry on next run");
                        }
                        Err(_) => {
                            OVERDUE_SWEPT_TOTAL.with_label_values(&["timeout"]).inc();
                            warn!(
                                timeout_secs = self.timeout.as_secs(),
                                "Overdue sweep timed out, will retry on next run"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Execute one sweep pass: transition every eligible invoice to `OVERDUE`
/// and append one audit record per transitioned invoice, all in one
/// transaction. Returns the number of invoices transitioned.
#[instrument(skip(db))]
pub async fn sweep_once(db: &Database) -> Result<u64, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["sweep_overdue"])
        .start_timer();

    let mut tx = db.pool().begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })?;

    let swept = sqlx::query_as::<_, SweptInvoice>(
        r#"
        WITH eligible AS (
            SELECT invoice_id, invoice_number, status AS prev_status
            FROM invoices
            WHERE status IN ('SENT', 'PARTIAL')
              AND due_date < NOW()
            FOR UPDATE SKIP LOCKED
        )
        UPDATE invoices i
        SET status = 'OVERDUE', updated_utc = NOW()
        FROM eligible e
        WHERE i.invoice_id = e.invoice_id
        RETURNING i.invoice_id, i.invoice_number, e.prev_status
        "#,
    )
    .fetch_all(&mut *tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Overdue sweep failed: {}", e)))?;

    for invoice in &swept {
        insert_activity(
            &mut *tx,
            &NewActivity::new(
                ActivityType::InvoiceOverdue,
                format!("Invoice {} is overdue", invoice.invoice_number),
            )
            .invoice(invoice.invoice_id)
            .metadata(status_change_metadata(&invoice.prev_status, "OVERDUE")),
        )
        .await?;
    }

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;

    timer.observe_duration();

    let count = swept.len() as u64;
    if count > 0 {
        OVERDUE_SWEPT_TOTAL
            .with_label_values(&["swept"])
            .inc_by(count as f64);
    }

    Ok(count)
}
