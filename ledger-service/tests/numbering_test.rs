//! Document number allocation tests, including the concurrency property:
//! N concurrent allocations yield N distinct, gap-free numbers.

mod common;

use common::{invoice_input, job_input, line_item, no_events, seed_customer, TestDb};
use std::collections::HashSet;

#[tokio::test]
async fn numbers_increase_sequentially_per_series() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Sequence Customer").await;

    for expected in ["JOB-0001", "JOB-0002", "JOB-0003"] {
        let job = db
            .create_job(&job_input(customer.customer_id, "Sequenced work"), &no_events())
            .await
            .unwrap();
        assert_eq!(job.job_number, expected);
    }

    // The invoice series counts independently of the job series.
    let invoice = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();
    assert_eq!(invoice.invoice_number, "INV-0001");

    ctx.cleanup().await;
}

#[tokio::test]
async fn concurrent_job_creations_get_distinct_gap_free_numbers() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Concurrent Sequence Customer").await;

    const N: usize = 12;
    let mut handles = Vec::new();
    for i in 0..N {
        let db = db.clone();
        let customer_id = customer.customer_id;
        handles.push(tokio::spawn(async move {
            db.create_job(
                &common_job_input(customer_id, i),
                &ledger_service::services::EventSender::disabled(),
            )
            .await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let job = handle.await.unwrap().expect("Concurrent job creation failed");
        assert!(
            numbers.insert(job.job_number.clone()),
            "duplicate number {}",
            job.job_number
        );
    }

    // Distinct and gap-free: exactly JOB-0001 ..= JOB-00{N}.
    assert_eq!(numbers.len(), N);
    for n in 1..=N {
        assert!(numbers.contains(&format!("JOB-{:04}", n)));
    }

    ctx.cleanup().await;
}

fn common_job_input(customer_id: uuid::Uuid, i: usize) -> ledger_service::models::CreateJob {
    let mut input = common::job_input(customer_id, "Concurrent work");
    input.description = Some(format!("slot {}", i));
    input
}

#[tokio::test]
async fn failed_creation_does_not_burn_a_number() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Rollback Customer").await;

    let first = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("Work", "1", "100.00")],
        ))
        .await
        .unwrap();
    assert_eq!(first.invoice_number, "INV-0001");

    // Negative line item makes the creation fail before any insert.
    let mut bad = invoice_input(customer.customer_id, "0", vec![line_item("Bad", "1", "100.00")]);
    bad.line_items[0].unit_price = common::dec("-5");
    db.create_invoice(&bad).await.unwrap_err();

    let second = db
        .create_invoice(&invoice_input(
            customer.customer_id,
            "0",
            vec![line_item("More work", "1", "50.00")],
        ))
        .await
        .unwrap();
    assert_eq!(second.invoice_number, "INV-0002");

    ctx.cleanup().await;
}
