//! Invoice and payment operations.

use crate::models::{
    ActivityType, CreateInvoice, Invoice, InvoiceDetail, InvoiceLineItem, InvoiceStatus,
    ListActivitiesFilter, ListInvoicesFilter, NewActivity, Payment, RecordPayment, UpdateInvoice,
};
use crate::services::activity::{insert_activity, status_change_metadata};
use crate::services::calculator::{
    compute_totals, format_usd, normalize_line_items, round_currency, NormalizedLineItem, Totals,
};
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, PAYMENTS_TOTAL};
use crate::services::notify::{DomainEvent, EventSender};
use crate::services::numbering::{map_number_conflict, next_document_number, INVOICE_SERIES};
use crate::services::status::{invoice_is_terminal, invoice_transition};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, status, issue_date, due_date, \
                               subtotal, tax_rate, tax_amount, total, amount_paid, balance_due, \
                               notes, customer_id, job_id, created_utc, updated_utc";

/// Payment terms applied when no due date is given (net 30).
const DEFAULT_NET_DAYS: i64 = 30;

async fn replace_invoice_line_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    items: &[NormalizedLineItem],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
        .bind(invoice_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to clear line items: {}", e))
        })?;

    for (sort_order, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_line_items (line_item_id, invoice_id, description, quantity, unit_price, amount, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .bind(sort_order as i32)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
        })?;
    }

    Ok(())
}

async fn lock_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<Option<Invoice>, AppError> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 FOR UPDATE",
    ))
    .bind(invoice_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))
}

impl Database {
    /// Create a new draft invoice: allocate the next `INV-` number,
    /// compute totals from the line items, and persist everything with the
    /// audit record in one transaction.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        if self.get_customer(input.customer_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
        }
        if let Some(job_id) = input.job_id {
            if self.get_job(job_id).await?.is_none() {
                return Err(AppError::NotFound(anyhow::anyhow!("Job not found")));
            }
        }

        let line_items = normalize_line_items(&input.line_items)?;
        if line_items.is_empty() {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "At least one line item required"
            )));
        }

        let tax_rate = input.tax_rate.unwrap_or(Decimal::ZERO);
        let totals = compute_totals(&line_items, tax_rate)?;

        let issue_date = input.issue_date.unwrap_or_else(Utc::now);
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(DEFAULT_NET_DAYS));

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_number = next_document_number(&mut tx, INVOICE_SERIES).await?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, status, issue_date, due_date,
                subtotal, tax_rate, tax_amount, total, amount_paid, balance_due,
                notes, customer_id, job_id
            )
            VALUES ($1, $2, 'DRAFT', $3, $4, $5, $6, $7, $8, 0, $8, $9, $10, $11)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(&invoice_number)
        .bind(issue_date)
        .bind(due_date)
        .bind(totals.subtotal)
        .bind(tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(&input.notes)
        .bind(input.customer_id)
        .bind(input.job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_number_conflict(e, "invoice"))?;

        replace_invoice_line_items(&mut tx, invoice_id, &line_items).await?;

        let mut activity = NewActivity::new(
            ActivityType::InvoiceCreated,
            format!(
                "Invoice {} created for ${}",
                invoice_number,
                format_usd(totals.total)
            ),
        )
        .invoice(invoice_id)
        .user(input.created_by);
        if let Some(job_id) = input.job_id {
            activity = activity.job(job_id);
        }
        insert_activity(&mut *tx, &activity).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&["DRAFT"]).inc();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1",
        ))
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get an invoice with its line items, payments (newest first), and
    /// recent history.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_detail(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let Some(invoice) = self.get_invoice(invoice_id).await? else {
            return Ok(None);
        };

        let line_items = self.get_invoice_line_items(invoice_id).await?;
        let payments = self.list_payments(invoice_id).await?;
        let activities = self
            .list_activities(&ListActivitiesFilter {
                invoice_id: Some(invoice_id),
                page_size: 30,
                ..Default::default()
            })
            .await?;

        Ok(Some(InvoiceDetail {
            invoice,
            line_items,
            payments,
            activities,
        }))
    }

    /// Get line items for an invoice, in insertion order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_line_items(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLineItem>, AppError> {
        let line_items = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT line_item_id, invoice_id, description, quantity, unit_price, amount, sort_order, created_utc
            FROM invoice_line_items
            WHERE invoice_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        Ok(line_items)
    }

    /// List invoices. Search matches the invoice number and the customer
    /// name.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());
        let search = filter.search.as_deref().map(|s| format!("%{}%", s));

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices i
            WHERE ($1::text IS NULL
                   OR i.invoice_number ILIKE $1
                   OR EXISTS (SELECT 1 FROM customers c
                              WHERE c.customer_id = i.customer_id AND c.name ILIKE $1))
              AND ($2::text IS NULL OR i.status = $2)
              AND ($3::uuid IS NULL OR i.customer_id = $3)
              AND ($4::uuid IS NULL OR i.job_id = $4)
              AND ($5::uuid IS NULL OR i.invoice_id > $5)
            ORDER BY i.invoice_id
            LIMIT $6
            "#,
        ))
        .bind(&search)
        .bind(&status_str)
        .bind(filter.customer_id)
        .bind(filter.job_id)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Invoices linked to a job, newest first.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn list_invoices_for_job(&self, job_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE job_id = $1 ORDER BY created_utc DESC",
        ))
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list job invoices: {}", e))
        })?;

        Ok(invoices)
    }

    /// Update an invoice. Replacing line items recomputes totals against
    /// the amount already paid; a status change goes through the
    /// transition gate. A `PAID` or `CANCELLED` invoice is immutable.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
        user_id: Option<Uuid>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some(existing) = lock_invoice(&mut tx, invoice_id).await? else {
            return Ok(None);
        };

        let current_status = InvoiceStatus::from_string(&existing.status);
        let has_field_changes = input.issue_date.is_some()
            || input.due_date.is_some()
            || input.tax_rate.is_some()
            || input.notes.is_some()
            || input.line_items.is_some();

        if invoice_is_terminal(current_status) {
            // The idempotent no-op (status set to its current value, no
            // other fields) is still allowed.
            if has_field_changes || input.status.is_some_and(|s| s != current_status) {
                return Err(AppError::InvalidState(anyhow::anyhow!(
                    "Invoice {} is {} and cannot be modified",
                    existing.invoice_number,
                    current_status.as_str()
                )));
            }
            return Ok(Some(existing));
        }

        let applied_status = match input.status {
            Some(requested) => invoice_transition(current_status, requested)?,
            None => None,
        };

        // Recompute money fields so the invariants hold after the update.
        let mut new_totals: Option<Totals> = None;
        let mut new_line_items: Option<Vec<NormalizedLineItem>> = None;
        let new_tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);

        if let Some(items) = &input.line_items {
            let normalized = normalize_line_items(items)?;
            if normalized.is_empty() {
                return Err(AppError::ValidationError(anyhow::anyhow!(
                    "At least one line item required"
                )));
            }
            new_totals = Some(compute_totals(&normalized, new_tax_rate)?);
            new_line_items = Some(normalized);
        } else if input.tax_rate.is_some() {
            // Tax rate changed without touching line items: rebase the tax
            // on the existing subtotal.
            if new_tax_rate < Decimal::ZERO {
                return Err(AppError::ValidationError(anyhow::anyhow!(
                    "Tax rate cannot be negative"
                )));
            }
            let tax_amount =
                round_currency(existing.subtotal * new_tax_rate / Decimal::ONE_HUNDRED);
            new_totals = Some(Totals {
                subtotal: existing.subtotal,
                tax_amount,
                total: existing.subtotal + tax_amount,
            });
        }

        let new_balance_due = new_totals
            .map(|t| (t.total - existing.amount_paid).max(Decimal::ZERO));

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = COALESCE($2, status),
                issue_date = COALESCE($3, issue_date),
                due_date = COALESCE($4, due_date),
                tax_rate = COALESCE($5, tax_rate),
                subtotal = COALESCE($6, subtotal),
                tax_amount = COALESCE($7, tax_amount),
                total = COALESCE($8, total),
                balance_due = COALESCE($9, balance_due),
                notes = COALESCE($10, notes),
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(applied_status.map(|s| s.as_str().to_string()))
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.tax_rate)
        .bind(new_totals.map(|t| t.subtotal))
        .bind(new_totals.map(|t| t.tax_amount))
        .bind(new_totals.map(|t| t.total))
        .bind(new_balance_due)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        if let Some(items) = &new_line_items {
            replace_invoice_line_items(&mut tx, invoice_id, items).await?;

            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::LineItemsUpdated,
                    format!("Invoice line items replaced ({} items)", items.len()),
                )
                .invoice(invoice_id)
                .user(user_id),
            )
            .await?;
        }

        if let Some(new_status) = applied_status {
            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::StatusChange,
                    format!("Invoice status changed to {}", new_status.as_str()),
                )
                .invoice(invoice_id)
                .user(user_id)
                .metadata(status_change_metadata(
                    current_status.as_str(),
                    new_status.as_str(),
                )),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(new_status) = applied_status {
            INVOICES_TOTAL
                .with_label_values(&[new_status.as_str()])
                .inc();
        }

        Ok(Some(invoice))
    }

    /// Delete an invoice. A paid invoice cannot be deleted; line items and
    /// payments cascade.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let Some(existing) = self.get_invoice(invoice_id).await? else {
            return Ok(false);
        };

        if InvoiceStatus::from_string(&existing.status) == InvoiceStatus::Paid {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot delete a paid invoice"
            )));
        }

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    /// Send an invoice to its customer. A draft transitions to `SENT`;
    /// already-sent invoices are re-sent without a status change. The
    /// email itself is dispatched as an event after commit, so a failing
    /// mail collaborator never rolls back the transition.
    #[instrument(skip(self, events), fields(invoice_id = %invoice_id))]
    pub async fn send_invoice(
        &self,
        invoice_id: Uuid,
        user_id: Option<Uuid>,
        events: &EventSender,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["send_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some(existing) = lock_invoice(&mut tx, invoice_id).await? else {
            return Ok(None);
        };

        let current_status = InvoiceStatus::from_string(&existing.status);
        if current_status == InvoiceStatus::Cancelled {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot send a cancelled invoice"
            )));
        }

        let applied_status = if current_status == InvoiceStatus::Draft {
            invoice_transition(current_status, InvoiceStatus::Sent)?
        } else {
            None
        };

        let invoice = match applied_status {
            Some(new_status) => {
                let invoice = sqlx::query_as::<_, Invoice>(&format!(
                    r#"
                    UPDATE invoices
                    SET status = $2, updated_utc = NOW()
                    WHERE invoice_id = $1
                    RETURNING {INVOICE_COLUMNS}
                    "#,
                ))
                .bind(invoice_id)
                .bind(new_status.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice sent: {}", e))
                })?;

                insert_activity(
                    &mut *tx,
                    &NewActivity::new(
                        ActivityType::StatusChange,
                        format!("Invoice status changed to {}", new_status.as_str()),
                    )
                    .invoice(invoice_id)
                    .user(user_id)
                    .metadata(status_change_metadata(
                        current_status.as_str(),
                        new_status.as_str(),
                    )),
                )
                .await?;

                invoice
            }
            None => existing,
        };

        let recipient = self
            .get_customer(invoice.customer_id)
            .await?
            .and_then(|c| c.email)
            .unwrap_or_else(|| "customer".to_string());

        insert_activity(
            &mut *tx,
            &NewActivity::new(
                ActivityType::InvoiceSent,
                format!("Invoice {} sent to {}", invoice.invoice_number, recipient),
            )
            .invoice(invoice_id)
            .user(user_id),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(new_status) = applied_status {
            INVOICES_TOTAL
                .with_label_values(&[new_status.as_str()])
                .inc();
        }

        events.publish(DomainEvent::InvoiceSent { invoice_id });

        info!(
            invoice_id = %invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice sent"
        );

        Ok(Some(invoice))
    }

    /// Apply a payment to an invoice's outstanding balance.
    ///
    /// The payment insert, the balance update, the derived status, and the
    /// audit records commit as one transaction; the row lock serializes
    /// concurrent payments against the same invoice. Overpayment is
    /// accepted and clamps the balance to zero.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn record_payment(
        &self,
        invoice_id: Uuid,
        input: &RecordPayment,
    ) -> Result<(Payment, Invoice), AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Valid payment amount required"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = lock_invoice(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let current_status = InvoiceStatus::from_string(&invoice.status);
        if invoice_is_terminal(current_status) {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot record a payment against a {} invoice",
                current_status.as_str()
            )));
        }

        let amount = round_currency(input.amount);
        let paid_at = input.paid_at.unwrap_or_else(Utc::now);

        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, invoice_id, amount, method, reference, notes, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING payment_id, invoice_id, amount, method, reference, notes, paid_at, created_utc
            "#,
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(amount)
        .bind(input.method.as_str())
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let new_amount_paid = invoice.amount_paid + amount;
        let raw_balance = invoice.total - new_amount_paid;
        let new_balance_due = raw_balance.max(Decimal::ZERO);
        let derived_status = if raw_balance <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        };
        let applied_status = invoice_transition(current_status, derived_status)?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET amount_paid = $2,
                balance_due = $3,
                status = COALESCE($4, status),
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(new_amount_paid)
        .bind(new_balance_due)
        .bind(applied_status.map(|s| s.as_str().to_string()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice balance: {}", e))
        })?;

        let reference_suffix = input
            .reference
            .as_deref()
            .map(|r| format!(" ({})", r))
            .unwrap_or_default();
        insert_activity(
            &mut *tx,
            &NewActivity::new(
                ActivityType::PaymentReceived,
                format!(
                    "Payment of ${} received{}",
                    format_usd(amount),
                    reference_suffix
                ),
            )
            .invoice(invoice_id)
            .user(input.user_id),
        )
        .await?;

        if let Some(new_status) = applied_status {
            insert_activity(
                &mut *tx,
                &NewActivity::new(
                    ActivityType::StatusChange,
                    format!("Invoice status changed to {}", new_status.as_str()),
                )
                .invoice(invoice_id)
                .user(input.user_id)
                .metadata(status_change_metadata(
                    current_status.as_str(),
                    new_status.as_str(),
                )),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        PAYMENTS_TOTAL
            .with_label_values(&[input.method.as_str()])
            .inc();
        if let Some(new_status) = applied_status {
            INVOICES_TOTAL
                .with_label_values(&[new_status.as_str()])
                .inc();
        }

        info!(
            invoice_id = %invoice_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            balance_due = %invoice.balance_due,
            status = %invoice.status,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    /// Payments recorded against an invoice, newest first.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, method, reference, notes, paid_at, created_utc
            FROM payments
            WHERE invoice_id = $1
            ORDER BY paid_at DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        Ok(payments)
    }
}
