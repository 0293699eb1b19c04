//! Services module for ledger-service.

pub mod activity;
pub mod calculator;
pub mod crew;
pub mod customers;
pub mod database;
pub mod invoices;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod numbering;
pub mod settings;
pub mod status;
pub mod sweeper;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use notify::{
    DomainEvent, EmailNotifier, EventSender, NotificationDispatcher, PdfRenderer, SmtpEmailer,
};
pub use sweeper::OverdueSweeper;
