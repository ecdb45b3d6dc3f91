pub mod calendar;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amortization::AmortizationSchedule;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus, PeriodUnit};

pub use calendar::{due_date, due_dates};

/// one scheduled repayment unit of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    pub sequence_number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    /// persisted status, only `Pending` or `Paid`
    pub status: InstallmentStatus,
    pub receipt_reference: Option<String>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        overdue_status(self, as_of)
    }

    /// status as seen on `as_of`, with overdue derived from the due date
    pub fn effective_status(&self, as_of: NaiveDate) -> InstallmentStatus {
        if self.is_overdue(as_of) {
            InstallmentStatus::Overdue
        } else {
            self.status
        }
    }

    /// whole days past the due date, zero when not overdue
    pub fn days_overdue(&self, as_of: NaiveDate) -> u32 {
        if self.is_overdue(as_of) {
            (as_of - self.due_date).num_days() as u32
        } else {
            0
        }
    }
}

/// pending and past due on `as_of`. Never stored; recomputed for every caller
pub fn overdue_status(installment: &Installment, as_of: NaiveDate) -> bool {
    installment.status == InstallmentStatus::Pending && installment.due_date < as_of
}

/// aggregates derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub amount_paid: Money,
    pub installments_paid: u32,
    pub installment_count: u32,
    pub scheduled_total: Money,
}

impl LedgerTotals {
    pub fn all_paid(&self) -> bool {
        self.installment_count > 0 && self.installments_paid == self.installment_count
    }
}

/// ordered installments of a single loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentLedger {
    loan_id: LoanId,
    installments: Vec<Installment>,
}

impl InstallmentLedger {
    pub fn new(loan_id: LoanId) -> Self {
        Self {
            loan_id,
            installments: Vec::new(),
        }
    }

    pub fn loan_id(&self) -> LoanId {
        self.loan_id
    }

    /// materialize the full schedule for an approved loan, exactly once
    pub fn generate_schedule(
        &mut self,
        loan: &Loan,
        schedule: &AmortizationSchedule,
        start_date: NaiveDate,
        unit: PeriodUnit,
    ) -> Result<&[Installment]> {
        if !self.installments.is_empty() {
            return Err(LoanError::ScheduleAlreadyExists {
                loan_id: self.loan_id,
            });
        }
        loan.ensure_status(LoanStatus::Approved, "generate schedule")?;
        if loan.id() != self.loan_id {
            return Err(LoanError::validation(format!(
                "ledger for loan {} cannot hold a schedule for loan {}",
                self.loan_id,
                loan.id()
            )));
        }
        if schedule.periods != loan.installment_count()
            || schedule.payments.len() != loan.installment_count() as usize
        {
            return Err(LoanError::validation(format!(
                "schedule has {} periods but loan {} expects {}",
                schedule.payments.len(),
                loan.id(),
                loan.installment_count()
            )));
        }
        if loan.approved_amount() != Some(schedule.principal) {
            return Err(LoanError::validation(format!(
                "schedule principal {} does not match approved amount of loan {}",
                schedule.principal,
                loan.id()
            )));
        }

        let dates = calendar::due_dates(start_date, schedule.periods, unit)?;
        let installments = schedule
            .payments
            .iter()
            .zip(dates)
            .map(|(payment, due_date)| Installment {
                id: Uuid::new_v4(),
                loan_id: self.loan_id,
                sequence_number: payment.number,
                amount: payment.amount,
                due_date,
                paid_date: None,
                status: InstallmentStatus::Pending,
                receipt_reference: None,
            })
            .collect();

        self.installments = installments;
        Ok(&self.installments)
    }

    /// mark an installment paid. The only mutation path; there is no unpay
    pub fn record_payment(
        &mut self,
        installment_id: InstallmentId,
        paid_date: NaiveDate,
        receipt_reference: Option<String>,
    ) -> Result<Installment> {
        let installment = self
            .installments
            .iter_mut()
            .find(|i| i.id == installment_id)
            .ok_or_else(|| LoanError::installment_not_found(installment_id))?;

        if installment.is_paid() {
            return Err(LoanError::AlreadyPaid { installment_id });
        }

        installment.paid_date = Some(paid_date);
        installment.receipt_reference = receipt_reference.filter(|r| !r.trim().is_empty());
        installment.status = InstallmentStatus::Paid;

        Ok(installment.clone())
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn get(&self, installment_id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == installment_id)
    }

    pub fn contains(&self, installment_id: InstallmentId) -> bool {
        self.get(installment_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn totals(&self) -> Result<LedgerTotals> {
        let paid = self.installments.iter().filter(|i| i.is_paid());
        Ok(LedgerTotals {
            amount_paid: Money::checked_sum(paid.clone().map(|i| i.amount))
                .ok_or_else(|| LoanError::overflow("amount paid"))?,
            installments_paid: paid.count() as u32,
            installment_count: self.installments.len() as u32,
            scheduled_total: Money::checked_sum(self.installments.iter().map(|i| i.amount))
                .ok_or_else(|| LoanError::overflow("scheduled total"))?,
        })
    }

    /// first unpaid installment, the next payroll deduction
    pub fn next_due(&self) -> Option<&Installment> {
        self.installments.iter().find(|i| !i.is_paid())
    }

    pub fn overdue(&self, as_of: NaiveDate) -> impl Iterator<Item = &Installment> {
        self.installments.iter().filter(move |i| i.is_overdue(as_of))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::AmortizationCalculator;
    use crate::decimal::Rate;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approved_loan(amount: i64, count: u32) -> (Loan, AmortizationSchedule) {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
        let mut loan = Loan::request(
            Uuid::new_v4(),
            Money::from_major(amount),
            count,
            "family emergency".to_string(),
            now,
        )
        .unwrap();
        let schedule = AmortizationCalculator::default()
            .schedule(Money::from_major(amount), count, Rate::ZERO)
            .unwrap();
        loan.approve(Money::from_major(amount), &schedule, date(2024, 2, 28), Uuid::new_v4(), now)
            .unwrap();
        (loan, schedule)
    }

    #[test]
    fn test_generate_schedule() {
        let (loan, schedule) = approved_loan(1_000_000, 12);
        let mut ledger = InstallmentLedger::new(loan.id());

        let installments = ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 28), PeriodUnit::Monthly)
            .unwrap();

        assert_eq!(installments.len(), 12);
        let sequence: Vec<u32> = installments.iter().map(|i| i.sequence_number).collect();
        assert_eq!(sequence, (1..=12).collect::<Vec<_>>());
        assert_eq!(installments[0].due_date, date(2024, 2, 28));
        assert_eq!(installments[11].due_date, date(2025, 1, 28));
        assert_eq!(installments[11].amount, Money::parse("83333.37").unwrap());
        assert!(installments.iter().all(|i| i.status == InstallmentStatus::Pending));
        assert_eq!(ledger.totals().unwrap().scheduled_total, Money::from_major(1_000_000));
    }

    #[test]
    fn test_generate_schedule_is_exactly_once() {
        let (loan, schedule) = approved_loan(6_000, 6);
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();
        let first_ids: Vec<_> = ledger.installments().iter().map(|i| i.id).collect();

        let err = ledger
            .generate_schedule(&loan, &schedule, date(2024, 3, 1), PeriodUnit::Monthly)
            .unwrap_err();
        assert_eq!(err, LoanError::ScheduleAlreadyExists { loan_id: loan.id() });
        let ids: Vec<_> = ledger.installments().iter().map(|i| i.id).collect();
        assert_eq!(ids, first_ids);
    }

    #[test]
    fn test_generate_schedule_rejects_foreign_loan() {
        let (loan, schedule) = approved_loan(6_000, 6);
        let mut ledger = InstallmentLedger::new(Uuid::new_v4());
        assert!(matches!(
            ledger.generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly),
            Err(LoanError::Validation { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_generate_schedule_requires_approval() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
        let loan = Loan::request(
            Uuid::new_v4(),
            Money::from_major(6_000),
            6,
            "school fees".to_string(),
            now,
        )
        .unwrap();
        let schedule = AmortizationCalculator::default()
            .schedule(Money::from_major(6_000), 6, Rate::ZERO)
            .unwrap();
        let mut ledger = InstallmentLedger::new(loan.id());

        let err = ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap_err();
        assert!(matches!(
            err,
            LoanError::InvalidTransition {
                status: LoanStatus::Requested,
                operation: "generate schedule",
                ..
            }
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_generate_schedule_rejects_other_principal() {
        let (loan, _) = approved_loan(6_000, 6);
        // same period count, different principal
        let other = AmortizationCalculator::default()
            .schedule(Money::from_major(9_000), 6, Rate::ZERO)
            .unwrap();
        let mut ledger = InstallmentLedger::new(loan.id());
        assert!(matches!(
            ledger.generate_schedule(&loan, &other, date(2024, 2, 1), PeriodUnit::Monthly),
            Err(LoanError::Validation { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_totals_report_overflow() {
        let loan_id = Uuid::new_v4();
        let huge = Money::parse("50000000000000000000000000000").unwrap();
        let installments = (1..=2)
            .map(|n| Installment {
                id: Uuid::new_v4(),
                loan_id,
                sequence_number: n,
                amount: huge,
                due_date: date(2024, n + 1, 1),
                paid_date: Some(date(2024, n + 1, 1)),
                status: InstallmentStatus::Paid,
                receipt_reference: None,
            })
            .collect();
        let ledger = InstallmentLedger {
            loan_id,
            installments,
        };
        assert!(matches!(ledger.totals(), Err(LoanError::Validation { .. })));
    }

    #[test]
    fn test_record_payment_once() {
        let (loan, schedule) = approved_loan(6_000, 6);
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();
        let target = ledger.installments()[0].id;

        let paid = ledger
            .record_payment(target, date(2024, 2, 1), Some("RCPT-001".to_string()))
            .unwrap();
        assert_eq!(paid.status, InstallmentStatus::Paid);
        assert_eq!(paid.receipt_reference.as_deref(), Some("RCPT-001"));
        assert_eq!(ledger.totals().unwrap().amount_paid, Money::from_major(1_000));

        let again = ledger.record_payment(target, date(2024, 2, 2), None);
        assert_eq!(again.unwrap_err(), LoanError::AlreadyPaid { installment_id: target });
        assert_eq!(ledger.totals().unwrap().amount_paid, Money::from_major(1_000));
        assert_eq!(ledger.get(target).unwrap().paid_date, Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_record_payment_unknown_installment() {
        let (loan, schedule) = approved_loan(6_000, 6);
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();
        let missing = Uuid::new_v4();
        assert!(matches!(
            ledger.record_payment(missing, date(2024, 2, 1), None),
            Err(LoanError::NotFound { entity: "installment", .. })
        ));
    }

    #[test]
    fn test_overdue_is_derived_from_as_of() {
        let (loan, schedule) = approved_loan(3_000, 3);
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();
        let first = ledger.installments()[0].clone();

        // due date itself is not overdue
        assert!(!overdue_status(&first, date(2024, 2, 1)));
        assert!(overdue_status(&first, date(2024, 2, 2)));
        assert_eq!(first.days_overdue(date(2024, 2, 11)), 10);
        assert_eq!(first.effective_status(date(2024, 2, 2)), InstallmentStatus::Overdue);
        // same as_of, same answer
        assert_eq!(overdue_status(&first, date(2024, 3, 5)), overdue_status(&first, date(2024, 3, 5)));

        ledger.record_payment(first.id, date(2024, 2, 20), None).unwrap();
        let paid = ledger.get(first.id).unwrap();
        assert!(!overdue_status(paid, date(2024, 3, 5)));
        assert_eq!(paid.effective_status(date(2024, 3, 5)), InstallmentStatus::Paid);
        // persisted status never becomes overdue
        assert_eq!(ledger.overdue(date(2024, 3, 5)).count(), 1);
        assert!(ledger
            .installments()
            .iter()
            .all(|i| i.status != InstallmentStatus::Overdue));
    }

    #[test]
    fn test_totals_and_next_due() {
        let (loan, schedule) = approved_loan(3_000, 3);
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();

        let ids: Vec<_> = ledger.installments().iter().map(|i| i.id).collect();
        ledger.record_payment(ids[0], date(2024, 2, 1), None).unwrap();
        assert_eq!(ledger.next_due().unwrap().id, ids[1]);
        assert!(!ledger.totals().unwrap().all_paid());

        ledger.record_payment(ids[2], date(2024, 2, 1), None).unwrap();
        ledger.record_payment(ids[1], date(2024, 2, 1), None).unwrap();
        let totals = ledger.totals().unwrap();
        assert!(totals.all_paid());
        assert_eq!(totals.installments_paid, 3);
        assert_eq!(totals.amount_paid, Money::from_major(3_000));
        assert!(ledger.next_due().is_none());
    }
}
