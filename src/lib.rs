pub mod amortization;
pub mod config;
pub mod decimal;
pub mod directory;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod query;
pub mod serialization;
pub mod service;
pub mod store;
pub mod types;

// re-export key types
pub use amortization::{compute_installment, AmortizationCalculator, AmortizationSchedule, ScheduledPayment};
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use directory::{EmployeeDirectory, InMemoryDirectory};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use ledger::{overdue_status, Installment, InstallmentLedger, LedgerTotals};
pub use loan::{Loan, LoanBalances};
pub use query::{LoanDetails, LoanFilter, LoanStatistics, OverdueInstallment, Page, PageRequest};
pub use serialization::{LoanView, ScheduleView};
pub use service::{ApprovalTerms, Decision, LoanRequest, LoanService, PaymentOutcome};
pub use store::{InMemoryLoanStore, KeyedLocks, LoanRecord, LoanStore};
pub use types::{
    ActorId, EmployeeId, InstallmentId, InstallmentStatus, LoanId, LoanStatus, PeriodUnit,
    TotalValuePolicy,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
