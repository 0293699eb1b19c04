//! Status transition gates for jobs and invoices.
//!
//! Both entities share the same pattern: an explicit transition table
//! consulted before any status write. Requesting the current status is an
//! idempotent no-op (`Ok(None)`) and produces no audit record; an illegal
//! jump is rejected with `AppError::InvalidState`.

use crate::models::{InvoiceStatus, JobStatus};
use service_core::error::AppError;

fn job_rank(status: JobStatus) -> Option<u8> {
    match status {
        JobStatus::Lead => Some(0),
        JobStatus::Quoted => Some(1),
        JobStatus::Scheduled => Some(2),
        JobStatus::InProgress => Some(3),
        JobStatus::Completed => Some(4),
        JobStatus::Cancelled => None,
    }
}

/// Whether a job status is terminal.
pub fn job_is_terminal(status: JobStatus) -> bool {
    matches!(status, JobStatus::Completed | JobStatus::Cancelled)
}

/// Gate a job status change. Forward moves along
/// `LEAD -> QUOTED -> SCHEDULED -> IN_PROGRESS -> COMPLETED` are legal
/// (including jumps that skip intermediate states); `CANCELLED` is
/// reachable from any non-terminal state; backward moves are not.
pub fn job_transition(
    current: JobStatus,
    requested: JobStatus,
) -> Result<Option<JobStatus>, AppError> {
    if current == requested {
        return Ok(None);
    }

    if job_is_terminal(current) {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "Job status {} is terminal and cannot change to {}",
            current.as_str(),
            requested.as_str()
        )));
    }

    let allowed = match (job_rank(current), job_rank(requested)) {
        // CANCELLED from any non-terminal state
        (_, None) => true,
        (Some(from), Some(to)) => to > from,
        (None, Some(_)) => false,
    };

    if allowed {
        Ok(Some(requested))
    } else {
        Err(AppError::InvalidState(anyhow::anyhow!(
            "Illegal job status transition {} -> {}",
            current.as_str(),
            requested.as_str()
        )))
    }
}

/// Whether an invoice status is terminal.
pub fn invoice_is_terminal(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
}

/// Gate an invoice status change against the transition table:
/// `DRAFT -> SENT | PARTIAL | PAID`, `SENT -> PARTIAL | PAID | OVERDUE`,
/// `PARTIAL -> PAID | OVERDUE`, `OVERDUE -> PARTIAL | PAID`, and
/// `CANCELLED` from any non-terminal state.
pub fn invoice_transition(
    current: InvoiceStatus,
    requested: InvoiceStatus,
) -> Result<Option<InvoiceStatus>, AppError> {
    use InvoiceStatus::*;

    if current == requested {
        return Ok(None);
    }

    if invoice_is_terminal(current) {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "Invoice status {} is terminal and cannot change to {}",
            current.as_str(),
            requested.as_str()
        )));
    }

    let allowed = matches!(
        (current, requested),
        (Draft, Sent | Partial | Paid | Cancelled)
            | (Sent, Partial | Paid | Overdue | Cancelled)
            | (Partial, Paid | Overdue | Cancelled)
            | (Overdue, Partial | Paid | Cancelled)
    );

    if allowed {
        Ok(Some(requested))
    } else {
        Err(AppError::InvalidState(anyhow::anyhow!(
            "Illegal invoice status transition {} -> {}",
            current.as_str(),
            requested.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, JobStatus};

    #[test]
    fn job_forward_chain_is_legal() {
        let chain = [
            JobStatus::Lead,
            JobStatus::Quoted,
            JobStatus::Scheduled,
            JobStatus::InProgress,
            JobStatus::Completed,
        ];
        for pair in chain.windows(2) {
            assert_eq!(job_transition(pair[0], pair[1]).unwrap(), Some(pair[1]));
        }
    }

    #[test]
    fn job_forward_jump_skipping_states_is_legal() {
        assert_eq!(
            job_transition(JobStatus::Lead, JobStatus::Scheduled).unwrap(),
            Some(JobStatus::Scheduled)
        );
        assert_eq!(
            job_transition(JobStatus::Quoted, JobStatus::Completed).unwrap(),
            Some(JobStatus::Completed)
        );
    }

    #[test]
    fn job_backward_move_is_rejected() {
        let err = job_transition(JobStatus::InProgress, JobStatus::Quoted).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn job_cancel_from_any_non_terminal_state() {
        for status in [
            JobStatus::Lead,
            JobStatus::Quoted,
            JobStatus::Scheduled,
            JobStatus::InProgress,
        ] {
            assert_eq!(
                job_transition(status, JobStatus::Cancelled).unwrap(),
                Some(JobStatus::Cancelled)
            );
        }
    }

    #[test]
    fn job_terminal_states_are_frozen() {
        for terminal in [JobStatus::Completed, JobStatus::Cancelled] {
            let err = job_transition(terminal, JobStatus::Lead).unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)));
        }
        let err = job_transition(JobStatus::Cancelled, JobStatus::Completed).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn job_same_status_is_a_noop() {
        assert_eq!(
            job_transition(JobStatus::Scheduled, JobStatus::Scheduled).unwrap(),
            None
        );
        // Even for terminal states.
        assert_eq!(
            job_transition(JobStatus::Completed, JobStatus::Completed).unwrap(),
            None
        );
    }

    #[test]
    fn invoice_send_and_payment_paths() {
        use InvoiceStatus::*;
        assert_eq!(invoice_transition(Draft, Sent).unwrap(), Some(Sent));
        assert_eq!(invoice_transition(Sent, Partial).unwrap(), Some(Partial));
        assert_eq!(invoice_transition(Partial, Paid).unwrap(), Some(Paid));
        assert_eq!(invoice_transition(Sent, Paid).unwrap(), Some(Paid));
    }

    #[test]
    fn invoice_overdue_path_and_recovery() {
        use InvoiceStatus::*;
        assert_eq!(invoice_transition(Sent, Overdue).unwrap(), Some(Overdue));
        assert_eq!(invoice_transition(Partial, Overdue).unwrap(), Some(Overdue));
        // Paying an overdue invoice is legal.
        assert_eq!(invoice_transition(Overdue, Partial).unwrap(), Some(Partial));
        assert_eq!(invoice_transition(Overdue, Paid).unwrap(), Some(Paid));
    }

    #[test]
    fn invoice_terminal_states_are_frozen() {
        use InvoiceStatus::*;
        for terminal in [Paid, Cancelled] {
            for target in [Draft, Sent, Partial, Overdue] {
                let err = invoice_transition(terminal, target).unwrap_err();
                assert!(matches!(err, AppError::InvalidState(_)));
            }
        }
    }

    #[test]
    fn invoice_illegal_jumps_are_rejected() {
        use InvoiceStatus::*;
        // A draft cannot go straight to overdue, and nothing goes back to
        // draft.
        assert!(invoice_transition(Draft, Overdue).is_err());
        assert!(invoice_transition(Sent, Draft).is_err());
        assert!(invoice_transition(Overdue, Sent).is_err());
    }

    #[test]
    fn invoice_same_status_is_a_noop() {
        use InvoiceStatus::*;
        assert_eq!(invoice_transition(Sent, Sent).unwrap(), None);
        assert_eq!(invoice_transition(Paid, Paid).unwrap(), None);
    }

    #[test]
    fn invoice_cancel_from_any_non_terminal_state() {
        use InvoiceStatus::*;
        for status in [Draft, Sent, Partial, Overdue] {
            assert_eq!(
                invoice_transition(status, Cancelled).unwrap(),
                Some(Cancelled)
            );
        }
    }
}
