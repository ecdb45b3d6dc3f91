use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{ActorId, EmployeeId, InstallmentId, LoanId, LoanStatus};

/// all events emitted by the loan engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // request events
    LoanRequested {
        loan_id: LoanId,
        employee_id: EmployeeId,
        amount: Money,
        installment_count: u32,
        timestamp: DateTime<Utc>,
    },
    InstallmentsRenegotiated {
        loan_id: LoanId,
        old_count: u32,
        new_count: u32,
        timestamp: DateTime<Utc>,
    },

    // decision events
    LoanApproved {
        loan_id: LoanId,
        approved_amount: Money,
        interest_rate: Rate,
        installment_value: Money,
        total_value: Money,
        approved_by: ActorId,
        timestamp: DateTime<Utc>,
    },
    ScheduleGenerated {
        loan_id: LoanId,
        installment_count: u32,
        first_due_date: NaiveDate,
        last_due_date: NaiveDate,
    },
    LoanRejected {
        loan_id: LoanId,
        reason: String,
        rejected_by: ActorId,
        timestamp: DateTime<Utc>,
    },
    LoanCancelled {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    LoanPurged {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },

    // repayment events
    InstallmentPaid {
        loan_id: LoanId,
        installment_id: InstallmentId,
        sequence_number: u32,
        amount: Money,
        paid_date: NaiveDate,
        outstanding_balance: Money,
    },
    LoanSettled {
        loan_id: LoanId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::LoanRequested { loan_id, .. }
            | Event::InstallmentsRenegotiated { loan_id, .. }
            | Event::LoanApproved { loan_id, .. }
            | Event::ScheduleGenerated { loan_id, .. }
            | Event::LoanRejected { loan_id, .. }
            | Event::LoanCancelled { loan_id, .. }
            | Event::LoanPurged { loan_id, .. }
            | Event::InstallmentPaid { loan_id, .. }
            | Event::LoanSettled { loan_id, .. }
            | Event::StatusChanged { loan_id, .. } => *loan_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// append a batch produced by a committed unit of work
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_take_drains_store() {
        let loan_id = Uuid::new_v4();
        let mut store = EventStore::new();
        store.emit(Event::LoanCancelled {
            loan_id,
            timestamp: Utc::now(),
        });
        store.extend(vec![Event::LoanPurged {
            loan_id,
            timestamp: Utc::now(),
        }]);

        assert_eq!(store.events().len(), 2);
        let taken = store.take_events();
        assert_eq!(taken.len(), 2);
        assert!(taken.iter().all(|e| e.loan_id() == loan_id));
        assert!(store.events().is_empty());
    }
}
