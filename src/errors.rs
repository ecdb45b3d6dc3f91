use thiserror::Error;
use uuid::Uuid;

use crate::types::LoanStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
    },

    #[error("invalid amount: {value}")]
    InvalidAmount {
        value: String,
    },

    #[error("invalid transition: cannot {operation} loan {loan_id} in status {status}")]
    InvalidTransition {
        loan_id: Uuid,
        status: LoanStatus,
        operation: &'static str,
    },

    #[error("installment already paid: {installment_id}")]
    AlreadyPaid {
        installment_id: Uuid,
    },

    #[error("installment schedule already exists for loan {loan_id}")]
    ScheduleAlreadyExists {
        loan_id: Uuid,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("concurrent modification of loan {loan_id}: expected version {expected}, found {found}")]
    ConcurrentModification {
        loan_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("invalid amortization input: {message}")]
    InvalidAmortizationInput {
        message: String,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },
}

impl LoanError {
    pub(crate) fn loan_not_found(id: Uuid) -> Self {
        LoanError::NotFound { entity: "loan", id }
    }

    pub(crate) fn installment_not_found(id: Uuid) -> Self {
        LoanError::NotFound {
            entity: "installment",
            id,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn overflow(what: &str) -> Self {
        LoanError::Validation {
            message: format!("{what} overflows decimal range"),
        }
    }

    /// stable code for transports and logs
    pub fn code(&self) -> &'static str {
        match self {
            LoanError::Validation { .. } => "VALIDATION_ERROR",
            LoanError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LoanError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LoanError::AlreadyPaid { .. } => "ALREADY_PAID",
            LoanError::ScheduleAlreadyExists { .. } => "SCHEDULE_ALREADY_EXISTS",
            LoanError::NotFound { .. } => "NOT_FOUND",
            LoanError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            LoanError::InvalidAmortizationInput { .. } => "INVALID_AMORTIZATION_INPUT",
            LoanError::Storage { .. } => "STORAGE_FAILURE",
        }
    }

    /// caller-facing domain error, as opposed to an infrastructure failure
    pub fn is_domain(&self) -> bool {
        !matches!(self, LoanError::Storage { .. })
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_domain_split() {
        let id = Uuid::new_v4();
        let err = LoanError::InvalidTransition {
            loan_id: id,
            status: LoanStatus::Rejected,
            operation: "approve",
        };
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(err.is_domain());
        assert!(err.to_string().contains("REJECTED"));

        let storage = LoanError::Storage {
            message: "backend unavailable".to_string(),
        };
        assert!(!storage.is_domain());
        assert_eq!(LoanError::installment_not_found(id).code(), "NOT_FOUND");
    }
}
