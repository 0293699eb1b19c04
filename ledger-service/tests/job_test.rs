//! Job lifecycle integration tests for ledger-service.

mod common;

use common::{crew_input, dec, invoice_input, job_input, line_item, no_events, seed_customer, TestDb};
use ledger_service::models::{
    ActivityType, JobStatus, ListActivitiesFilter, ListJobsFilter, UpdateJob,
};
use service_core::error::AppError;

#[tokio::test]
async fn create_job_assigns_sequential_number_and_logs_creation() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Job Customer").await;
    let job = db
        .create_job(
            &job_input(customer.customer_id, "Full Panel Upgrade 200A"),
            &no_events(),
        )
        .await
        .expect("Failed to create job");

    assert_eq!(job.job_number, "JOB-0001");
    assert_eq!(job.status, "LEAD");
    assert_eq!(job.priority, "MEDIUM");

    let activities = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, "JOB_CREATED");
    assert!(activities[0].description.contains("JOB-0001"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn work_order_job_logs_receipt() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Work Order Customer").await;
    let mut input = job_input(customer.customer_id, "Auto Shop Lift Circuit");
    input.is_work_order = true;
    input.work_order_email = Some("shop@example.com".to_string());

    let job = db.create_job(&input, &no_events()).await.unwrap();

    let receipts = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            activity_type: Some(ActivityType::WorkOrderReceived),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].description.contains("shop@example.com"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn job_line_items_are_fully_replaced_on_update() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Line Item Customer").await;
    let mut input = job_input(customer.customer_id, "Kitchen Wiring");
    input.line_items = vec![
        line_item("Sub-Panel 100A", "1", "800.00"),
        line_item("Outlet circuits", "6", "200.00"),
    ];
    let job = db.create_job(&input, &no_events()).await.unwrap();
    assert_eq!(db.get_job_line_items(job.job_id).await.unwrap().len(), 2);

    db.update_job(
        job.job_id,
        &UpdateJob {
            line_items: Some(vec![line_item("Revised scope", "1", "2500.00")]),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    let items = db.get_job_line_items(job.job_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "Revised scope");
    assert_eq!(items[0].amount, dec("2500.00"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn status_change_writes_exactly_one_audit_record_with_metadata() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Status Customer").await;
    let job = db
        .create_job(&job_input(customer.customer_id, "Rewire"), &no_events())
        .await
        .unwrap();

    db.update_job(
        job.job_id,
        &UpdateJob {
            status: Some(JobStatus::Scheduled),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    let changes = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            activity_type: Some(ActivityType::StatusChange),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    let metadata = changes[0].metadata.as_ref().expect("Missing metadata");
    assert_eq!(metadata["from"], "LEAD");
    assert_eq!(metadata["to"], "SCHEDULED");

    ctx.cleanup().await;
}

#[tokio::test]
async fn setting_current_status_is_idempotent_and_silent() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Idempotent Customer").await;
    let job = db
        .create_job(&job_input(customer.customer_id, "Detector Install"), &no_events())
        .await
        .unwrap();

    let updated = db
        .update_job(
            job.job_id,
            &UpdateJob {
                status: Some(JobStatus::Lead),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "LEAD");

    let changes = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            activity_type: Some(ActivityType::StatusChange),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(changes.is_empty());

    ctx.cleanup().await;
}

#[tokio::test]
async fn backward_and_terminal_transitions_are_rejected() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Transition Customer").await;
    let mut input = job_input(customer.customer_id, "Lighting Retrofit");
    input.status = Some(JobStatus::InProgress);
    let job = db.create_job(&input, &no_events()).await.unwrap();

    let err = db
        .update_job(
            job.job_id,
            &UpdateJob {
                status: Some(JobStatus::Quoted),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    db.update_job(
        job.job_id,
        &UpdateJob {
            status: Some(JobStatus::Completed),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    let err = db
        .update_job(
            job.job_id,
            &UpdateJob {
                status: Some(JobStatus::InProgress),
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
async fn job_with_invoices_cannot_be_deleted() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Delete Guard Customer").await;
    let job = db
        .create_job(&job_input(customer.customer_id, "EV Charger Install"), &no_events())
        .await
        .unwrap();

    let mut invoice = invoice_input(
        customer.customer_id,
        "0",
        vec![line_item("EV charger install", "1", "2200.00")],
    );
    invoice.job_id = Some(job.job_id);
    db.create_invoice(&invoice).await.unwrap();

    let err = db.delete_job(job.job_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    ctx.cleanup().await;
}

#[tokio::test]
async fn crew_assignment_is_audited_and_duplicates_conflict() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Crew Customer").await;
    let job = db
        .create_job(&job_input(customer.customer_id, "Buildout"), &no_events())
        .await
        .unwrap();
    let member = db.create_crew_member(&crew_input("Carlos Reyes")).await.unwrap();

    let assigned = db
        .assign_crew(job.job_id, member.crew_id, None)
        .await
        .unwrap();
    assert_eq!(assigned.name, "Carlos Reyes");

    let err = db
        .assign_crew(job.job_id, member.crew_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let crew = db.crew_for_job(job.job_id).await.unwrap();
    assert_eq!(crew.len(), 1);

    assert!(db.remove_crew(job.job_id, member.crew_id, None).await.unwrap());
    assert!(db.crew_for_job(job.job_id).await.unwrap().is_empty());

    let events = db
        .list_activities(&ListActivitiesFilter {
            job_id: Some(job.job_id),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    let types: Vec<&str> = events.iter().map(|a| a.activity_type.as_str()).collect();
    assert!(types.contains(&"CREW_ASSIGNED"));
    assert!(types.contains(&"CREW_REMOVED"));

    ctx.cleanup().await;
}

#[tokio::test]
async fn list_jobs_searches_number_and_title() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Search Customer").await;
    db.create_job(&job_input(customer.customer_id, "Panel Upgrade"), &no_events())
        .await
        .unwrap();
    db.create_job(&job_input(customer.customer_id, "Parking Lot Lighting"), &no_events())
        .await
        .unwrap();

    let by_title = db
        .list_jobs(&ListJobsFilter {
            search: Some("lighting".to_string()),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_title.len(), 1);

    let by_number = db
        .list_jobs(&ListJobsFilter {
            search: Some("JOB-0001".to_string()),
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_number.len(), 1);
    assert_eq!(by_number[0].title, "Panel Upgrade");

    ctx.cleanup().await;
}

#[tokio::test]
async fn job_detail_aggregates_owned_and_related_records() {
    let Some(ctx) = TestDb::spawn().await else { return };
    let db = &ctx.db;

    let customer = seed_customer(db, "Detail Customer").await;
    let mut input = job_input(customer.customer_id, "Dental Office Buildout");
    input.line_items = vec![line_item("Sub-Panel 200A", "1", "1400.00")];
    let job = db.create_job(&input, &no_events()).await.unwrap();

    let member = db.create_crew_member(&crew_input("Andre Johnson")).await.unwrap();
    db.assign_crew(job.job_id, member.crew_id, None).await.unwrap();

    let mut invoice = invoice_input(
        customer.customer_id,
        "0",
        vec![line_item("Deposit", "1", "5000.00")],
    );
    invoice.job_id = Some(job.job_id);
    db.create_invoice(&invoice).await.unwrap();

    let detail = db.get_job_detail(job.job_id).await.unwrap().unwrap();
    assert_eq!(detail.line_items.len(), 1);
    assert_eq!(detail.invoices.len(), 1);
    assert_eq!(detail.crew.len(), 1);
    assert!(!detail.activities.is_empty());

    ctx.cleanup().await;
}
