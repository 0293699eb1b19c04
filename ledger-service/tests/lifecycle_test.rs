//! End-to-end lifecycle test: job through invoice through payment, with a
//! complete audit trail; plus an application boot smoke test.

mod common;

use common::{dec, invoice_input, job_input, line_item, no_events, seed_customer, TestDb};
use ledger_service::config::{
    DatabaseConfig, LedgerConfig, NotificationConfig, SmtpConfig, SweeperConfig,
};
use ledger_service::models::{
    ActivityType, JobStatus, ListActivitiesFilter, PaymentMethod, RecordPayment, UpdateJob,
};
use ledger_service::startup::Application;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;

#[tokio::test]
async fn job_to_paid_invoice_leaves_a_complete_trail() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Lifecycle Customer").await;

    // Lead comes in, gets scheduled, work happens.
    let job = db
        .create_job(&job_input(customer.customer_id, "Full Panel Upgrade 200A"), &no_events())
        .await
        .unwrap();
    for status in [JobStatus::Scheduled, JobStatus::InProgress, JobStatus::Completed] {
        db.update_job(
            job.job_id,
            &UpdateJob {
                status: Some(status),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    }

    // Bill it.
    let mut input = invoice_input(
        customer.customer_id,
        "0",
        vec![
            line_item("200A Main Breaker Panel", "1", "1200.00"),
            line_item("Labor", "20", "100.00"),
        ],
    );
    input.job_id = Some(job.job_id);
    let invoice = db.create_invoice(&input).await.unwrap();
    assert_eq!(invoice.total, dec("3200.00"));

    db.send_invoice(invoice.invoice_id, None, &no_events())
        .await
        .unwrap();

    let (_, invoice) = db
        .record_payment(
            invoice.invoice_id,
            &RecordPayment {
                amount: dec("3200.00"),
                method: PaymentMethod::Check,
                reference: Some("Check #4521".to_string()),
                notes: None,
                paid_at: None,
                user_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.status, "PAID");

    // Job trail: creation plus one audit record per status change, each
    // carrying {from, to}.
    let job_changes = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            activity_type: Some(ActivityType::StatusChange),
            page_size: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(job_changes.len(), 3);
    for record in &job_changes {
        let metadata = record.metadata.as_ref().expect("Missing metadata");
        assert!(metadata.get("from").is_some());
        assert!(metadata.get("to").is_some());
    }

    // Invoice trail: created, sent (with its status change), payment
    // received (with its status change).
    let invoice_trail = db
        .list_activities(&ListActivitiesFilter {
            invoice_id: Some(invoice.invoice_id),
            page_size: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    let types: Vec<&str> = invoice_trail
        .iter()
        .map(|a| a.activity_type.as_str())
        .collect();
    assert!(types.contains(&"INVOICE_CREATED"));
    assert!(types.contains(&"INVOICE_SENT"));
    assert!(types.contains(&"PAYMENT_RECEIVED"));
    assert_eq!(
        types.iter().filter(|t| **t == "STATUS_CHANGE").count(),
        2 // DRAFT -> SENT, SENT -> PAID
    );

    ctx.cleanup().await;
}

#[tokio::test]
async fn application_serves_health_and_metrics() {
    let Some(ctx) = TestDb::spawn().await else { return };

    let config = LedgerConfig {
        common: CoreConfig { port: 0 },
        service_name: "ledger-service-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new(ctx.database_url().to_string()),
            max_connections: 5,
            min_connections: 1,
        },
        sweeper: SweeperConfig {
            enabled: false,
            interval_hours: 24,
            timeout_secs: 300,
        },
        smtp: SmtpConfig {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "billing@example.com".to_string(),
            from_name: "Billing".to_string(),
        },
        notifications: NotificationConfig { queue_size: 16 },
    };

    let app = Application::build_without_migrations(config)
        .await
        .expect("Failed to build application");
    let port = app.http_port();
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    let health_url = format!("http://127.0.0.1:{}/health", port);
    let mut response = None;
    for _ in 0..50 {
        if let Ok(r) = client.get(&health_url).send().await {
            response = Some(r);
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
    let response = response.expect("Health endpoint never came up");
    assert!(response.status().is_success());

    let metrics = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to fetch metrics");
    assert!(metrics.status().is_success());

    ctx.cleanup().await;
}
