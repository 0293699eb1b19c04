//! Domain models for ledger-service.

mod activity;
mod crew_member;
mod customer;
mod invoice;
mod job;
mod line_item;
mod payment;
mod setting;

pub use activity::{Activity, ActivityType, ListActivitiesFilter, NewActivity};
pub use crew_member::{
    CreateCrewMember, CrewMember, CrewMemberWithAssignments, UpdateCrewMember,
};
pub use customer::{
    CreateCustomer, Customer, CustomerType, CustomerWithCounts, ListCustomersFilter,
    UpdateCustomer,
};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
};
pub use job::{
    CreateJob, Job, JobDetail, JobPriority, JobStatus, ListJobsFilter, UpdateJob,
};
pub use line_item::{InvoiceLineItem, JobLineItem, LineItemInput};
pub use payment::{Payment, PaymentMethod, RecordPayment};
pub use setting::Setting;
