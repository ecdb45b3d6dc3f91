use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::amortization::{AmortizationCalculator, AmortizationSchedule};
use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::directory::EmployeeDirectory;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::Installment;
use crate::loan::Loan;
use crate::query::{self, LoanDetails, LoanFilter, LoanStatistics, OverdueInstallment, Page, PageRequest};
use crate::store::{InMemoryLoanStore, KeyedLocks, LoanRecord, LoanStore};
use crate::types::{ActorId, EmployeeId, InstallmentId, LoanId, LoanStatus};

/// employee loan application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub employee_id: EmployeeId,
    pub amount: Money,
    pub installment_count: u32,
    pub reason: String,
}

/// terms fixed by the approver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTerms {
    /// defaults to the requested amount
    pub amount: Option<Money>,
    pub rate: Rate,
    pub first_due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Approve(ApprovalTerms),
    Reject {
        reason: String,
        notes: Option<String>,
    },
}

impl Decision {
    fn operation(&self) -> &'static str {
        match self {
            Decision::Approve(_) => "approve",
            Decision::Reject { .. } => "reject",
        }
    }
}

/// result of a recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub loan: Loan,
    pub installment: Installment,
    pub settled: bool,
}

/// orchestrates the loan aggregate, its ledger and storage.
///
/// Every state-changing operation is one unit of work: take the loan's keyed
/// lock, mutate a private copy of the stored record, then commit it with the
/// version read at the start. A failure anywhere drops the copy, so the stored
/// state and the event journal are untouched.
pub struct LoanService {
    config: EngineConfig,
    calculator: AmortizationCalculator,
    store: Arc<dyn LoanStore>,
    directory: Arc<dyn EmployeeDirectory>,
    clock: Mutex<SafeTimeProvider>,
    locks: KeyedLocks,
    journal: Mutex<EventStore>,
}

impl LoanService {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn LoanStore>,
        directory: Arc<dyn EmployeeDirectory>,
        clock: SafeTimeProvider,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: AmortizationCalculator::new(config.total_value_policy),
            config,
            store,
            directory,
            clock: Mutex::new(clock),
            locks: KeyedLocks::new(),
            journal: Mutex::new(EventStore::new()),
        })
    }

    /// service over a fresh in-memory store
    pub fn in_memory(
        config: EngineConfig,
        directory: Arc<dyn EmployeeDirectory>,
        clock: SafeTimeProvider,
    ) -> Result<Self> {
        Self::new(config, Arc::new(InMemoryLoanStore::new()), directory, clock)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.lock().now()
    }

    fn log_failure(operation: &str, loan_id: LoanId, err: &LoanError) {
        if err.is_domain() {
            tracing::warn!("{} rejected for loan {}: {}", operation, loan_id, err);
        } else {
            tracing::error!("{} failed for loan {}: {}", operation, loan_id, err);
        }
    }

    /// run `work` against a private copy of the record and commit it
    fn unit_of_work<T>(
        &self,
        loan_id: LoanId,
        operation: &'static str,
        work: impl FnOnce(&mut LoanRecord, DateTime<Utc>, &mut Vec<Event>) -> Result<T>,
    ) -> Result<T> {
        let result = self.locks.with_lock(loan_id, || {
            self.store.load(loan_id).and_then(|mut record| {
                let expected = record.version;
                let mut events = Vec::new();
                let value = work(&mut record, self.now(), &mut events)?;
                self.store.commit(record, expected)?;
                self.journal.lock().extend(events);
                Ok(value)
            })
        });

        if let Err(err) = &result {
            Self::log_failure(operation, loan_id, err);
        }
        result
    }

    /// create a loan in `REQUESTED`; no installments exist until approval
    pub fn request_loan(&self, request: LoanRequest) -> Result<Loan> {
        let employee_id = request.employee_id;
        let result = self.config
            .check_amount(request.amount, "requested amount")
            .and_then(|amount| {
                let count = self.config.check_installment_count(request.installment_count)?;
                Loan::request(employee_id, amount, count, request.reason, self.now())
            })
            .and_then(|loan| {
                if self.config.require_known_employee && !self.directory.exists(employee_id)? {
                    return Err(LoanError::NotFound {
                        entity: "employee",
                        id: employee_id,
                    });
                }
                self.store.insert(LoanRecord::new(loan.clone()))?;
                Ok(loan)
            });

        let loan = result.map_err(|err| {
            if err.is_domain() {
                tracing::warn!("loan request rejected for employee {}: {}", employee_id, err);
            } else {
                tracing::error!("loan request failed for employee {}: {}", employee_id, err);
            }
            err
        })?;

        self.journal.lock().emit(Event::LoanRequested {
            loan_id: loan.id(),
            employee_id,
            amount: loan.requested_amount(),
            installment_count: loan.installment_count(),
            timestamp: loan.requested_at(),
        });
        tracing::info!(
            "Loan {} requested by employee {}: {} in {} installments",
            loan.id(),
            employee_id,
            loan.requested_amount(),
            loan.installment_count()
        );
        Ok(loan)
    }

    /// change the installment count of an undecided request
    pub fn renegotiate_installments(&self, loan_id: LoanId, installment_count: u32) -> Result<Loan> {
        let loan = self.unit_of_work(loan_id, "renegotiate", |record, now, events| {
            record.loan.ensure_status(LoanStatus::Requested, "renegotiate")?;
            let count = self.config.check_installment_count(installment_count)?;
            let old_count = record.loan.installment_count();
            record.loan.renegotiate_installments(count, now)?;
            events.push(Event::InstallmentsRenegotiated {
                loan_id,
                old_count,
                new_count: count,
                timestamp: now,
            });
            Ok(record.loan.clone())
        })?;

        tracing::info!(
            "Loan {} renegotiated to {} installments",
            loan_id,
            loan.installment_count()
        );
        Ok(loan)
    }

    /// approve or reject a pending request in one unit of work
    pub fn decide(&self, loan_id: LoanId, decision: Decision, actor: ActorId) -> Result<Loan> {
        let operation = decision.operation();
        let loan = self.unit_of_work(loan_id, operation, |record, now, events| {
            record.loan.ensure_status(LoanStatus::Requested, operation)?;
            match decision {
                Decision::Approve(terms) => self.apply_approval(record, terms, actor, now, events)?,
                Decision::Reject { reason, notes } => {
                    record.loan.reject(reason, notes, actor, now)?;
                    events.push(Event::LoanRejected {
                        loan_id,
                        reason: record.loan.rejection_reason().unwrap_or_default().to_string(),
                        rejected_by: actor,
                        timestamp: now,
                    });
                    events.push(Event::StatusChanged {
                        loan_id,
                        old_status: LoanStatus::Requested,
                        new_status: LoanStatus::Rejected,
                        timestamp: now,
                    });
                }
            }
            Ok(record.loan.clone())
        })?;

        match loan.status() {
            LoanStatus::Rejected => tracing::info!(
                "Loan {} rejected by {}: {}",
                loan_id,
                actor,
                loan.rejection_reason().unwrap_or_default()
            ),
            status => tracing::info!("Loan {} approved by {}, now {}", loan_id, actor, status),
        }
        Ok(loan)
    }

    /// fix the terms, materialize the schedule and enter repayment
    fn apply_approval(
        &self,
        record: &mut LoanRecord,
        terms: ApprovalTerms,
        actor: ActorId,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let loan_id = record.loan.id();
        let amount = self.config.check_amount(
            terms.amount.unwrap_or_else(|| record.loan.requested_amount()),
            "approved amount",
        )?;
        let schedule = self
            .calculator
            .schedule(amount, record.loan.installment_count(), terms.rate)?;

        record
            .loan
            .approve(amount, &schedule, terms.first_due_date, actor, now)?;
        let installments = record.ledger.generate_schedule(
            &record.loan,
            &schedule,
            terms.first_due_date,
            self.config.period_unit,
        )?;
        let first_due_date = installments.first().map(|i| i.due_date).unwrap_or(terms.first_due_date);
        let last_due_date = installments.last().map(|i| i.due_date).unwrap_or(terms.first_due_date);
        tracing::debug!(
            "Schedule for loan {}: {} x {} from {} to {}",
            loan_id,
            installments.len(),
            schedule.installment_value,
            first_due_date,
            last_due_date
        );
        record.loan.begin_repayment(&record.ledger, now)?;

        events.push(Event::LoanApproved {
            loan_id,
            approved_amount: amount,
            interest_rate: schedule.rate,
            installment_value: schedule.installment_value,
            total_value: schedule.total_value(),
            approved_by: actor,
            timestamp: now,
        });
        events.push(Event::ScheduleGenerated {
            loan_id,
            installment_count: schedule.periods,
            first_due_date,
            last_due_date,
        });
        events.push(Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Requested,
            new_status: LoanStatus::InRepayment,
            timestamp: now,
        });
        Ok(())
    }

    pub fn approve(&self, loan_id: LoanId, terms: ApprovalTerms, actor: ActorId) -> Result<Loan> {
        self.decide(loan_id, Decision::Approve(terms), actor)
    }

    pub fn reject(
        &self,
        loan_id: LoanId,
        reason: impl Into<String>,
        notes: Option<String>,
        actor: ActorId,
    ) -> Result<Loan> {
        self.decide(
            loan_id,
            Decision::Reject {
                reason: reason.into(),
                notes,
            },
            actor,
        )
    }

    /// requester withdraws an undecided request
    pub fn cancel(&self, loan_id: LoanId) -> Result<Loan> {
        let loan = self.unit_of_work(loan_id, "cancel", |record, now, events| {
            record.loan.cancel(now)?;
            events.push(Event::LoanCancelled {
                loan_id,
                timestamp: now,
            });
            events.push(Event::StatusChanged {
                loan_id,
                old_status: LoanStatus::Requested,
                new_status: LoanStatus::Cancelled,
                timestamp: now,
            });
            Ok(record.loan.clone())
        })?;

        tracing::info!("Loan {} cancelled by requester", loan_id);
        Ok(loan)
    }

    /// delete a cancelled loan together with its ledger
    pub fn purge_cancelled(&self, loan_id: LoanId) -> Result<()> {
        let result = self.locks.with_lock(loan_id, || {
            self.store.load(loan_id).and_then(|record| {
                record.loan.ensure_status(LoanStatus::Cancelled, "purge")?;
                self.store.remove(loan_id, record.version)
            })
        });

        match result {
            Ok(_) => {
                let now = self.now();
                self.journal.lock().emit(Event::LoanPurged {
                    loan_id,
                    timestamp: now,
                });
                tracing::info!("Cancelled loan {} purged", loan_id);
                Ok(())
            }
            Err(err) => {
                Self::log_failure("purge", loan_id, &err);
                Err(err)
            }
        }
    }

    /// mark one installment paid, recompute balances and settle when complete
    pub fn pay_installment(
        &self,
        loan_id: LoanId,
        installment_id: InstallmentId,
        paid_date: NaiveDate,
        receipt_reference: Option<String>,
    ) -> Result<PaymentOutcome> {
        let outcome = self.unit_of_work(loan_id, "pay installment", |record, now, events| {
            let installment =
                record
                    .ledger
                    .record_payment(installment_id, paid_date, receipt_reference)?;
            let settled = record.loan.reconcile(&record.ledger.totals()?, now)?;

            events.push(Event::InstallmentPaid {
                loan_id,
                installment_id,
                sequence_number: installment.sequence_number,
                amount: installment.amount,
                paid_date,
                outstanding_balance: record.loan.outstanding_balance(),
            });
            if settled {
                events.push(Event::LoanSettled {
                    loan_id,
                    total_paid: record.loan.amount_paid(),
                    timestamp: now,
                });
                events.push(Event::StatusChanged {
                    loan_id,
                    old_status: LoanStatus::InRepayment,
                    new_status: LoanStatus::Settled,
                    timestamp: now,
                });
            }

            Ok(PaymentOutcome {
                loan: record.loan.clone(),
                installment,
                settled,
            })
        })?;

        tracing::info!(
            "Installment {} of loan {} paid: {}, outstanding {}",
            outcome.installment.sequence_number,
            loan_id,
            outcome.installment.amount,
            outcome.loan.outstanding_balance()
        );
        if outcome.settled {
            tracing::info!("Loan {} settled, total paid {}", loan_id, outcome.loan.amount_paid());
        }
        Ok(outcome)
    }

    pub fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.store.load(loan_id).map(|record| record.loan)
    }

    /// loan with its installments, overdue derived against `as_of`
    pub fn loan_details(&self, loan_id: LoanId, as_of: NaiveDate) -> Result<LoanDetails> {
        let record = self.store.load(loan_id)?;
        Ok(LoanDetails::from_record(&record, as_of))
    }

    fn snapshot(&self) -> Result<Vec<LoanRecord>> {
        self.store.snapshot().map_err(|err| {
            tracing::error!("failed to read loan snapshot: {}", err);
            err
        })
    }

    /// requests awaiting a decision, newest first
    pub fn list_pending(&self, employee_id: Option<EmployeeId>, page: PageRequest) -> Result<Page<Loan>> {
        let records = self.snapshot()?;
        let loans = query::pending_loans(&records, employee_id);
        tracing::debug!("{} pending loans", loans.len());
        query::paginate(loans, page, &self.config)
    }

    /// pending installments past due on `as_of`, oldest first
    pub fn list_overdue(&self, as_of: NaiveDate, page: PageRequest) -> Result<Page<OverdueInstallment>> {
        let records = self.snapshot()?;
        let overdue = query::overdue_installments(&records, as_of);
        tracing::debug!("{} installments overdue as of {}", overdue.len(), as_of);
        query::paginate(overdue, page, &self.config)
    }

    /// general listing over status, employee and request date, newest first
    pub fn list_loans(&self, filter: LoanFilter, page: PageRequest) -> Result<Page<Loan>> {
        filter.validate()?;
        let records = self.snapshot()?;
        let loans = query::filter_loans(&records, &filter);
        tracing::debug!("{} loans match {:?}", loans.len(), filter);
        query::paginate(loans, page, &self.config)
    }

    /// every loan of an employee, newest first
    pub fn list_history(&self, employee_id: EmployeeId, page: PageRequest) -> Result<Page<Loan>> {
        let records = self.snapshot()?;
        let loans = query::loan_history(&records, employee_id);
        tracing::debug!("{} loans in history of employee {}", loans.len(), employee_id);
        query::paginate(loans, page, &self.config)
    }

    pub fn statistics(&self, employee_id: Option<EmployeeId>) -> Result<LoanStatistics> {
        let records = self.snapshot()?;
        query::loan_statistics(&records, employee_id).map_err(|err| {
            tracing::error!("failed to aggregate loan statistics: {}", err);
            err
        })
    }

    /// schedule preview, nothing is stored
    pub fn simulate(&self, principal: Money, periods: u32, rate: Rate) -> Result<AmortizationSchedule> {
        let periods = self.config.check_installment_count(periods)?;
        self.calculator.schedule(principal, periods, rate)
    }

    /// drain events of committed operations
    pub fn take_events(&self) -> Vec<Event> {
        self.journal.lock().take_events()
    }
}
