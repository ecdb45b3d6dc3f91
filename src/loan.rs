use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::AmortizationSchedule;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::ledger::{InstallmentLedger, LedgerTotals};
use crate::types::{ActorId, EmployeeId, LoanId, LoanStatus};

/// balances derived from the installment ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoanBalances {
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub installments_paid: u32,
}

/// employee loan aggregate.
///
/// Fields are private: terms become immutable once decided and the balances
/// are only ever written by [`Loan::reconcile`] from ledger totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,
    employee_id: EmployeeId,
    requested_amount: Money,
    approved_amount: Option<Money>,
    installment_count: u32,
    interest_rate_per_period: Option<Rate>,
    installment_value: Option<Money>,
    total_value: Option<Money>,
    reason: String,
    notes: Option<String>,
    status: LoanStatus,
    requested_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<ActorId>,
    first_installment_date: Option<NaiveDate>,
    rejection_reason: Option<String>,
    settled_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    balances: LoanBalances,
}

impl Loan {
    /// create a loan in `REQUESTED`
    pub fn request(
        employee_id: EmployeeId,
        amount: Money,
        installment_count: u32,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let amount = amount
            .ensure_positive("requested amount")?
            .ensure_at_most(Money::MAX_AMOUNT, "requested amount")?;
        if installment_count == 0 {
            return Err(LoanError::validation("installment count must be at least 1"));
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(LoanError::validation("loan reason must not be empty"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            employee_id,
            requested_amount: amount,
            approved_amount: None,
            installment_count,
            interest_rate_per_period: None,
            installment_value: None,
            total_value: None,
            reason,
            notes: None,
            status: LoanStatus::Requested,
            requested_at: now,
            decided_at: None,
            decided_by: None,
            first_installment_date: None,
            rejection_reason: None,
            settled_at: None,
            cancelled_at: None,
            updated_at: now,
            balances: LoanBalances::default(),
        })
    }

    pub(crate) fn ensure_status(&self, expected: LoanStatus, operation: &'static str) -> Result<()> {
        if self.status != expected {
            return Err(LoanError::InvalidTransition {
                loan_id: self.id,
                status: self.status,
                operation,
            });
        }
        Ok(())
    }

    /// change the number of installments while the request is undecided
    pub fn renegotiate_installments(&mut self, installment_count: u32, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(LoanStatus::Requested, "renegotiate")?;
        if installment_count == 0 {
            return Err(LoanError::validation("installment count must be at least 1"));
        }
        self.installment_count = installment_count;
        self.updated_at = now;
        Ok(())
    }

    /// fix the approved terms. The loan stays `APPROVED` only until
    /// [`Loan::begin_repayment`] runs in the same unit of work
    pub fn approve(
        &mut self,
        approved_amount: Money,
        schedule: &AmortizationSchedule,
        first_installment_date: NaiveDate,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_status(LoanStatus::Requested, "approve")?;
        let approved_amount = approved_amount
            .ensure_positive("approved amount")?
            .ensure_at_most(Money::MAX_AMOUNT, "approved amount")?;

        if schedule.principal != approved_amount || schedule.periods != self.installment_count {
            return Err(LoanError::validation(format!(
                "schedule for {} over {} periods does not match approved {} over {}",
                schedule.principal, schedule.periods, approved_amount, self.installment_count
            )));
        }

        self.approved_amount = Some(approved_amount);
        self.interest_rate_per_period = Some(schedule.rate);
        self.installment_value = Some(schedule.installment_value);
        self.total_value = Some(schedule.total_value());
        self.first_installment_date = Some(first_installment_date);
        self.decided_at = Some(now);
        self.decided_by = Some(actor);
        self.status = LoanStatus::Approved;
        self.updated_at = now;
        Ok(())
    }

    /// move an approved loan into repayment once its schedule exists
    pub fn begin_repayment(&mut self, ledger: &InstallmentLedger, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(LoanStatus::Approved, "begin repayment")?;
        if ledger.loan_id() != self.id || ledger.len() != self.installment_count as usize {
            return Err(LoanError::InvalidTransition {
                loan_id: self.id,
                status: self.status,
                operation: "begin repayment without a schedule",
            });
        }
        self.apply_totals(&ledger.totals()?)?;
        self.status = LoanStatus::InRepayment;
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reason: String,
        notes: Option<String>,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_status(LoanStatus::Requested, "reject")?;
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(LoanError::validation("rejection reason must not be empty"));
        }

        self.rejection_reason = Some(reason);
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self.decided_at = Some(now);
        self.decided_by = Some(actor);
        self.status = LoanStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    /// requester withdraws before a decision
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(LoanStatus::Requested, "cancel")?;
        self.cancelled_at = Some(now);
        self.status = LoanStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// recompute balances from the ledger and settle when everything is paid.
    /// Returns true when this call settled the loan
    pub fn reconcile(&mut self, totals: &LedgerTotals, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_status(LoanStatus::InRepayment, "record payment")?;

        self.apply_totals(totals)?;
        self.updated_at = now;

        if totals.all_paid() && totals.installment_count == self.installment_count {
            self.status = LoanStatus::Settled;
            self.settled_at = Some(now);
            return Ok(true);
        }
        Ok(false)
    }

    fn apply_totals(&mut self, totals: &LedgerTotals) -> Result<()> {
        let total_value = self.total_value.unwrap_or(Money::ZERO);
        let outstanding_balance = total_value
            .checked_sub(totals.amount_paid)
            .ok_or_else(|| LoanError::overflow("outstanding balance"))?;
        self.balances = LoanBalances {
            amount_paid: totals.amount_paid,
            outstanding_balance,
            installments_paid: totals.installments_paid,
        };
        Ok(())
    }

    /// amount paid + outstanding == total value (zero before approval)
    pub fn balances_reconcile(&self) -> bool {
        let total = self.total_value.unwrap_or(Money::ZERO);
        self.balances
            .amount_paid
            .checked_add(self.balances.outstanding_balance)
            == Some(total)
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn requested_amount(&self) -> Money {
        self.requested_amount
    }

    pub fn approved_amount(&self) -> Option<Money> {
        self.approved_amount
    }

    pub fn installment_count(&self) -> u32 {
        self.installment_count
    }

    pub fn interest_rate_per_period(&self) -> Option<Rate> {
        self.interest_rate_per_period
    }

    pub fn installment_value(&self) -> Option<Money> {
        self.installment_value
    }

    pub fn total_value(&self) -> Option<Money> {
        self.total_value
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn decided_by(&self) -> Option<ActorId> {
        self.decided_by
    }

    pub fn first_installment_date(&self) -> Option<NaiveDate> {
        self.first_installment_date
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn balances(&self) -> LoanBalances {
        self.balances
    }

    pub fn amount_paid(&self) -> Money {
        self.balances.amount_paid
    }

    pub fn outstanding_balance(&self) -> Money {
        self.balances.outstanding_balance
    }

    pub fn installments_paid(&self) -> u32 {
        self.balances.installments_paid
    }
}
