//! Invoice lifecycle integration tests for ledger-service.

mod common;

use common::{dec, invoice_input, line_item, no_events, seed_customer, TestDb};
use ledger_service::models::{InvoiceStatus, ListInvoicesFilter, UpdateInvoice};
use service_core::error::AppError;

#[tokio::test]
async fn create_invoice_computes_totals_and_starts_as_draft() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Totals Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "7",
            vec![
                line_item("Breaker panel", "2", "50.00"),
                line_item("Service call", "1", "100.00"),
            ],
        ))
        .await
        .expect("Failed to create invoice");

    assert_eq!(invoice.invoice_number, "INV-0001");
    assert_eq!(invoice.status, "DRAFT");
    assert_eq!(invoice.subtotal, dec("200.00"));
    assert_eq!(invoice.tax_amount, dec("14.00"));
    assert_eq!(invoice.total, dec("214.00"));
    assert_eq!(invoice.amount_paid, dec("0"));
    assert_eq!(invoice.balance_due, dec("214.00"));

    let line_items = db
        .get_invoice_line_items(invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(line_items.len(), 2);
    assert_eq!(line_items[0].amount, dec("100.00"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn create_invoice_without_line_items_is_rejected() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Empty Invoice Customer").await;
    let err = db
        .create_invoice(&invoice_input(customer.customer_id, "0", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // Blank-description lines do not count either.
    let err = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("", "1", "100.00")],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    ctx.cleanup().await;
}

#[tokio::test]
async fn create_invoice_for_missing_customer_is_not_found() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let err = db
        .create_invoice(&invoice_input(
            uuid::Uuid::new_v4(),
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    ctx.cleanup().await;
}

#[tokio::test]
async fn due_date_defaults_to_thirty_days_after_issue() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Net Thirty Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();

    assert_eq!((invoice.due_date - invoice.issue_date).num_days(), 30);

    ctx.cleanup().await;
}

#[tokio::test]
async fn replacing_line_items_recomputes_totals_against_amount_paid() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Recompute Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Deposit", "1", "200.00")],
        ))
        .await
        .unwrap();

    // Pay half, then replace the line items with a bigger scope.
    db.record_payment(
        invoice.invoice_id,
        &ledger_service::models::RecordPayment {
            amount: dec("100.00"),
            method: ledger_service::models::PaymentMethod::Check,
            reference: None,
            notes: None,
            paid_at: None,
            user_id: None,
        },
    )
    .await
    .unwrap();

    let updated = db
        .update_invoice(
            invoice.invoice_id,
            &UpdateInvoice {
                line_items: Some(vec![line_item("Full project", "1", "500.00")]),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .expect("Invoice disappeared");

    assert_eq!(updated.subtotal, dec("500.00"));
    assert_eq!(updated.total, dec("500.00"));
    assert_eq!(updated.amount_paid, dec("100.00"));
    assert_eq!(updated.balance_due, dec("400.00"));
    // total == subtotal + tax_amount holds after the mutation.
    assert_eq!(updated.total, updated.subtotal + updated.tax_amount);

    ctx.cleanup().await;
}

#[tokio::test]
async fn changing_tax_rate_rebases_tax_on_existing_subtotal() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Tax Change Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "200.00")],
        ))
        .await
        .unwrap();

    let updated = db
        .update_invoice(
            invoice.invoice_id,
            &UpdateInvoice {
                tax_rate: Some(dec("7")),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.tax_amount, dec("14.00"));
    assert_eq!(updated.total, dec("214.00"));
    assert_eq!(updated.balance_due, dec("214.00"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn send_invoice_transitions_draft_to_sent() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Send Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();

    let sent = db
        .send_invoice(invoice.invoice_id, None, &no_events())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.status, "SENT");

    // Re-sending does not change status and emits no further status
    // change record.
    let resent = db
        .send_invoice(invoice.invoice_id, None, &no_events())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resent.status, "SENT");

    ctx.cleanup().await;
}

#[tokio::test]
async fn illegal_status_jump_is_rejected() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Illegal Jump Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();

    // DRAFT -> OVERDUE is not in the transition table.
    let err = db
        .update_invoice(
            invoice.invoice_id,
            &UpdateInvoice {
                status: Some(InvoiceStatus::Overdue),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    ctx.cleanup().await;
}

#[tokio::test]
async fn paid_invoice_is_immutable_and_undeletable() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Locked Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();

    db.record_payment(
        invoice.invoice_id,
        &ledger_service::models::RecordPayment {
            amount: dec("100.00"),
            method: ledger_service::models::PaymentMethod::Cash,
            reference: None,
            notes: None,
            paid_at: None,
            user_id: None,
        },
    )
    .await
    .unwrap();

    let err = db
        .update_invoice(
            invoice.invoice_id,
            &UpdateInvoice {
                notes: Some("Touching a paid invoice".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = db.delete_invoice(invoice.invoice_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    // Setting the current status is an idempotent no-op, not an error.
    let unchanged = db
        .update_invoice(
            invoice.invoice_id,
            &UpdateInvoice {
                status: Some(InvoiceStatus::Paid),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.status, "PAID");

    ctx.cleanup().await;
}

#[tokio::test]
async fn draft_invoice_can_be_deleted_and_cascades() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Delete Customer").await;
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();

    assert!(db.delete_invoice(invoice.invoice_id).await.unwrap());
    assert!(db.get_invoice(invoice.invoice_id).await.unwrap().is_none());
    assert!(db
        .get_invoice_line_items(invoice.invoice_id)
        .await
        .unwrap()
        .is_empty());

    ctx.cleanup().await;
}

#[tokio::test]
async fn list_invoices_filters_by_status() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Filter Customer").await;
    let first = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work A", "1", "100.00")],
        ))
        .await
        .unwrap();
    db.create_invoice(&invoice_input(
        customer.customer_id,
        "0",
        vec![line_item("Work B", "1", "200.00")],
    ))
    .await
    .unwrap();

    db.send_invoice(first.invoice_id, None, &no_events())
        .await
        .unwrap();

    let sent = db
        .list_invoices(&ListInvoicesFilter {
            status: Some(InvoiceStatus::Sent),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].invoice_id, first.invoice_id);

    let drafts = db
        .list_invoices(&ListInvoicesFilter {
            status: Some(InvoiceStatus::Draft),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);

    ctx.cleanup().await;
}
