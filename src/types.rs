use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for an installment
pub type InstallmentId = Uuid;

/// employee reference in the external directory
pub type EmployeeId = Uuid;

/// identity of the approver or rejecter, as given by the caller
pub type ActorId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// submitted by the employee, awaiting a decision
    Requested,
    /// terms fixed, schedule being materialized in the same unit of work
    Approved,
    /// declined by an approver
    Rejected,
    /// schedule generated, installments being collected
    InRepayment,
    /// every installment paid
    Settled,
    /// withdrawn by the requester before a decision
    Cancelled,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 6] = [
        LoanStatus::Requested,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::InRepayment,
        LoanStatus::Settled,
        LoanStatus::Cancelled,
    ];

    /// absorbing states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Rejected | LoanStatus::Settled | LoanStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "REQUESTED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::InRepayment => "IN_REPAYMENT",
            LoanStatus::Settled => "SETTLED",
            LoanStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// installment status. `Overdue` is never stored, only derived for views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
}

/// spacing between consecutive due dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    #[default]
    Monthly,
    Biweekly,
    Weekly,
}

/// how the collected total relates to the rounded installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TotalValuePolicy {
    /// total = rounded installment x periods, every installment identical
    #[default]
    InstallmentTimesPeriods,
    /// total = unrounded installment x periods rounded once, last installment absorbs the cents
    ExactInterest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&LoanStatus::InRepayment).unwrap();
        assert_eq!(json, "\"IN_REPAYMENT\"");
        assert_eq!(LoanStatus::InRepayment.to_string(), "IN_REPAYMENT");
        let back: LoanStatus = serde_json::from_str("\"SETTLED\"").unwrap();
        assert_eq!(back, LoanStatus::Settled);
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = LoanStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![&LoanStatus::Rejected, &LoanStatus::Settled, &LoanStatus::Cancelled]
        );
    }
}
