//! Notification collaborators, decoupled from ledger mutations.
//!
//! Ledger operations publish `DomainEvent`s on a bounded channel and move
//! on; the dispatcher task consumes them and talks to the email and PDF
//! collaborators. A collaborator failure is logged and counted, never
//! propagated back into the mutation that raised the event.

use crate::config::SmtpConfig;
use crate::models::{Customer, Invoice, InvoiceLineItem, Job};
use crate::services::calculator::format_usd;
use crate::services::database::Database;
use crate::services::metrics::NOTIFICATIONS_TOTAL;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Events raised by ledger operations for collaborators to react to.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// An invoice was sent to its customer; dispatch the email.
    InvoiceSent { invoice_id: Uuid },
    /// A work order job was created; notify the configured inbox.
    WorkOrderReceived { job_id: Uuid },
}

impl DomainEvent {
    fn kind(&self) -> &'static str {
        match self {
            DomainEvent::InvoiceSent { .. } => "invoice_email",
            DomainEvent::WorkOrderReceived { .. } => "work_order",
        }
    }
}

/// Handle for publishing domain events. Publishing never blocks and never
/// fails the caller; a full or closed queue drops the event with a warning.
#[derive(Clone)]
pub struct EventSender {
    tx: Option<mpsc::Sender<DomainEvent>>,
}

impl EventSender {
    /// A sender that drops everything. Used when notifications are
    /// disabled and in tests.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, event: DomainEvent) {
        let Some(tx) = &self.tx else {
            tracing::debug!(kind = event.kind(), "Notifications disabled, dropping event");
            return;
        };
        if let Err(e) = tx.try_send(event) {
            tracing::warn!(error = %e, "Failed to enqueue domain event");
        }
    }
}

/// Everything the email/PDF collaborators need to render an invoice.
pub struct InvoiceEmailContext {
    pub invoice: Invoice,
    pub customer: Customer,
    pub line_items: Vec<InvoiceLineItem>,
    pub settings: HashMap<String, String>,
}

/// Context for a work-order notification.
pub struct WorkOrderContext {
    pub job: Job,
    pub customer: Customer,
    pub settings: HashMap<String, String>,
}

/// Outbound email collaborator. Returns `Ok(false)` when sending was
/// skipped (transport not configured).
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_invoice_email(
        &self,
        ctx: &InvoiceEmailContext,
        pdf: Option<Vec<u8>>,
    ) -> Result<bool, AppError>;

    async fn send_work_order_notification(&self, ctx: &WorkOrderContext)
        -> Result<bool, AppError>;
}

/// PDF rendering collaborator, consumed by the email-with-attachment flow
/// and the download endpoint of the API layer.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render_invoice(&self, ctx: &InvoiceEmailContext) -> Result<Vec<u8>, AppError>;
}

/// SMTP-backed `EmailNotifier`. With `enabled = false` every send is
/// skipped and reported as such, so an unconfigured deployment still works.
pub struct SmtpEmailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let transport = if config.enabled {
            let creds = Credentials::new(
                config.user.clone(),
                config.password.expose_secret().clone(),
            );
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e))
                })?
                .port(config.port)
                .credentials(creds)
                .build();
            Some(transport)
        } else {
            None
        };

        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn from_mailbox(&self) -> Result<Mailbox, AppError> {
        format!("{} <{}>", self.from_name, self.from_email)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e)))
    }

    async fn send(&self, message: Message) -> Result<(), AppError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| AppError::EmailError("SMTP transport not configured".to_string()))?;
        transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(e.to_string()))?;
        Ok(())
    }
}

fn company_name(settings: &HashMap<String, String>) -> &str {
    settings
        .get("company_name")
        .map(String::as_str)
        .unwrap_or("Our Company")
}

fn invoice_email_html(ctx: &InvoiceEmailContext) -> String {
    let rows: String = ctx
        .line_items
        .iter()
        .map(|li| {
            format!(
                "<tr><td>{}</td><td align=\"center\">{}</td><td align=\"right\">${}</td></tr>",
                li.description,
                li.quantity,
                format_usd(li.amount)
            )
        })
        .collect();

    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:0 auto;">
  <h1>{company}</h1>
  <p>Hi {first_name},</p>
  <p>Please find your invoice <strong>{number}</strong> below.</p>
  <table width="100%" cellpadding="6">
    <tr><td>Invoice</td><td align="right"><strong>{number}</strong></td></tr>
    <tr><td>Issue Date</td><td align="right">{issue}</td></tr>
    <tr><td>Due Date</td><td align="right">{due}</td></tr>
    <tr><td><strong>Balance Due</strong></td><td align="right"><strong>${balance}</strong></td></tr>
  </table>
  <table width="100%" cellpadding="6">
    <thead><tr><th align="left">Description</th><th>Qty</th><th align="right">Amount</th></tr></thead>
    <tbody>{rows}</tbody>
    <tfoot><tr><td colspan="2" align="right"><strong>Total</strong></td><td align="right"><strong>${total}</strong></td></tr></tfoot>
  </table>
</div>"#,
        company = company_name(&ctx.settings),
        first_name = ctx
            .customer
            .name
            .split_whitespace()
            .next()
            .unwrap_or("there"),
        number = ctx.invoice.invoice_number,
        issue = ctx.invoice.issue_date.format("%B %e, %Y"),
        due = ctx.invoice.due_date.format("%B %e, %Y"),
        balance = format_usd(ctx.invoice.balance_due),
        total = format_usd(ctx.invoice.total),
        rows = rows,
    )
}

#[async_trait]
impl EmailNotifier for SmtpEmailer {
    async fn send_invoice_email(
        &self,
        ctx: &InvoiceEmailContext,
        pdf: Option<Vec<u8>>,
    ) -> Result<bool, AppError> {
        if self.transport.is_none() {
            tracing::warn!(
                invoice_number = %ctx.invoice.invoice_number,
                "SMTP not configured, skipping invoice email"
            );
            return Ok(false);
        }

        let to_email = ctx.customer.email.as_deref().ok_or_else(|| {
            AppError::EmailError("Customer has no email address".to_string())
        })?;
        let to: Mailbox = to_email
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient address: {}", e)))?;

        let html = invoice_email_html(ctx);
        let plain = format!(
            "Invoice {} from {}. Balance due: ${}.",
            ctx.invoice.invoice_number,
            company_name(&ctx.settings),
            format_usd(ctx.invoice.balance_due)
        );

        let alternative = MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(plain),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html),
            );

        let body = match pdf {
            Some(bytes) => {
                let content_type = ContentType::parse("application/pdf")
                    .map_err(|e| AppError::EmailError(e.to_string()))?;
                let attachment = Attachment::new(format!(
                    "{}.pdf",
                    ctx.invoice.invoice_number
                ))
                .body(bytes, content_type);
                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(attachment)
            }
            None => alternative,
        };

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(format!(
                "Invoice {} from {}",
                ctx.invoice.invoice_number,
                company_name(&ctx.settings)
            ))
            .multipart(body)?;

        self.send(message).await?;

        tracing::info!(
            invoice_number = %ctx.invoice.invoice_number,
            to = %to_email,
            "Invoice email sent"
        );

        Ok(true)
    }

    async fn send_work_order_notification(
        &self,
        ctx: &WorkOrderContext,
    ) -> Result<bool, AppError> {
        if self.transport.is_none() {
            tracing::warn!(
                job_number = %ctx.job.job_number,
                "SMTP not configured, skipping work order notification"
            );
            return Ok(false);
        }

        let to_email = ctx
            .job
            .work_order_email
            .as_deref()
            .or_else(|| ctx.settings.get("workorder_email").map(String::as_str))
            .ok_or_else(|| {
                AppError::EmailError("No work order notification address configured".to_string())
            })?;
        let to: Mailbox = to_email
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient address: {}", e)))?;

        let body = format!(
            "Work order received: {} — {}\nCustomer: {}\nSite: {}\n",
            ctx.job.job_number,
            ctx.job.title,
            ctx.customer.name,
            ctx.job.address.as_deref().unwrap_or("n/a"),
        );

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(format!("Work order {}: {}", ctx.job.job_number, ctx.job.title))
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(body),
            )?;

        self.send(message).await?;

        tracing::info!(
            job_number = %ctx.job.job_number,
            to = %to_email,
            "Work order notification sent"
        );

        Ok(true)
    }
}

/// Consumes domain events and drives the collaborators.
pub struct NotificationDispatcher {
    db: Database,
    emailer: Arc<dyn EmailNotifier>,
    pdf: Option<Arc<dyn PdfRenderer>>,
    rx: mpsc::Receiver<DomainEvent>,
}

impl NotificationDispatcher {
    pub fn new(
        db: Database,
        emailer: Arc<dyn EmailNotifier>,
        pdf: Option<Arc<dyn PdfRenderer>>,
        queue_size: usize,
    ) -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel(queue_size);
        (
            Self {
                db,
                emailer,
                pdf,
                rx,
            },
            EventSender { tx: Some(tx) },
        )
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Notification dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification dispatcher shutting down");
                    break;
                }
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => {
                            tracing::info!("Event channel closed, dispatcher exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, event: DomainEvent) {
        let kind = event.kind();
        let outcome = match &event {
            DomainEvent::InvoiceSent { invoice_id } => self.handle_invoice_sent(*invoice_id).await,
            DomainEvent::WorkOrderReceived { job_id } => self.handle_work_order(*job_id).await,
        };

        match outcome {
            Ok(true) => {
                NOTIFICATIONS_TOTAL.with_label_values(&[kind, "sent"]).inc();
            }
            Ok(false) => {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&[kind, "skipped"])
                    .inc();
            }
            Err(e) => {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&[kind, "failed"])
                    .inc();
                tracing::error!(error = %e, kind = kind, "Notification dispatch failed");
            }
        }
    }

    async fn handle_invoice_sent(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let invoice = self
            .db
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
        let customer = self
            .db
            .get_customer(invoice.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
        let line_items = self.db.get_invoice_line_items(invoice_id).await?;
        let settings = self.db.settings_map().await?;

        let ctx = InvoiceEmailContext {
            invoice,
            customer,
            line_items,
            settings,
        };

        // A PDF failure downgrades to a bare email; it never blocks the
        // notification.
        let pdf = match &self.pdf {
            Some(renderer) => match renderer.render_invoice(&ctx).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::error!(error = %e, "Invoice PDF rendering failed, sending without attachment");
                    None
                }
            },
            None => None,
        };

        self.emailer.send_invoice_email(&ctx, pdf).await
    }

    async fn handle_work_order(&self, job_id: Uuid) -> Result<bool, AppError> {
        let job = self
            .db
            .get_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Job not found")))?;
        let customer = self
            .db
            .get_customer(job.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
        let settings = self.db.settings_map().await?;

        let ctx = WorkOrderContext {
            job,
            customer,
            settings,
        };

        self.emailer.send_work_order_notification(&ctx).await
    }
}
