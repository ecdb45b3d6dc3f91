/// serializable views of loans and schedules
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::amortization::AmortizationSchedule;
use crate::decimal::{Money, Rate};
use crate::query::LoanDetails;
use crate::types::{ActorId, EmployeeId, InstallmentId, InstallmentStatus, LoanId, LoanStatus};

/// serializable view of a loan and its installments on a given date
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub employee_id: EmployeeId,
    pub status: LoanStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub terms: TermsView,
    pub balances: BalanceView,
    pub timeline: TimelineView,
    pub installments: Vec<InstallmentView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermsView {
    pub requested_amount: Money,
    pub approved_amount: Option<Money>,
    pub installment_count: u32,
    pub interest_rate_per_period: Option<Rate>,
    pub installment_value: Option<Money>,
    pub total_value: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceView {
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub installments_paid: u32,
    pub overdue_installments: usize,
    pub next_due_date: Option<NaiveDate>,
    pub next_due_amount: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineView {
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<ActorId>,
    pub first_installment_date: Option<NaiveDate>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub id: InstallmentId,
    pub sequence_number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    /// `OVERDUE` is derived against the view date
    pub status: InstallmentStatus,
    pub days_overdue: u32,
    pub receipt_reference: Option<String>,
}

impl LoanView {
    pub fn from_details(details: &LoanDetails) -> Self {
        let loan = &details.loan;
        let as_of = details.as_of;
        let next_due = details.next_due();

        LoanView {
            id: loan.id(),
            employee_id: loan.employee_id(),
            status: loan.status(),
            reason: loan.reason().to_string(),
            notes: loan.notes().map(str::to_string),
            rejection_reason: loan.rejection_reason().map(str::to_string),
            terms: TermsView {
                requested_amount: loan.requested_amount(),
                approved_amount: loan.approved_amount(),
                installment_count: loan.installment_count(),
                interest_rate_per_period: loan.interest_rate_per_period(),
                installment_value: loan.installment_value(),
                total_value: loan.total_value(),
            },
            balances: BalanceView {
                amount_paid: loan.amount_paid(),
                outstanding_balance: loan.outstanding_balance(),
                installments_paid: loan.installments_paid(),
                overdue_installments: details.overdue_count(),
                next_due_date: next_due.map(|i| i.due_date),
                next_due_amount: next_due.map(|i| i.amount),
            },
            timeline: TimelineView {
                requested_at: loan.requested_at(),
                decided_at: loan.decided_at(),
                decided_by: loan.decided_by(),
                first_installment_date: loan.first_installment_date(),
                settled_at: loan.settled_at(),
                cancelled_at: loan.cancelled_at(),
                updated_at: loan.updated_at(),
                as_of,
            },
            installments: details
                .installments
                .iter()
                .map(|i| InstallmentView {
                    id: i.id,
                    sequence_number: i.sequence_number,
                    amount: i.amount,
                    due_date: i.due_date,
                    paid_date: i.paid_date,
                    status: i.effective_status(as_of),
                    days_overdue: i.days_overdue(as_of),
                    receipt_reference: i.receipt_reference.clone(),
                })
                .collect(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// simulator output
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleView {
    pub principal: Money,
    pub periods: u32,
    pub rate: Rate,
    pub installment_value: Money,
    pub total_value: Money,
    pub total_interest: Money,
    pub rows: Vec<ScheduleRowView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleRowView {
    pub number: u32,
    pub amount: Money,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

impl ScheduleView {
    pub fn from_schedule(schedule: &AmortizationSchedule) -> Self {
        ScheduleView {
            principal: schedule.principal,
            periods: schedule.periods,
            rate: schedule.rate,
            installment_value: schedule.installment_value,
            total_value: schedule.total_value(),
            total_interest: schedule.total_interest(),
            rows: schedule
                .payments
                .iter()
                .map(|p| ScheduleRowView {
                    number: p.number,
                    amount: p.amount,
                    interest: p.interest_portion,
                    principal: p.principal_portion,
                    balance: p.ending_balance,
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::AmortizationCalculator;
    use crate::ledger::InstallmentLedger;
    use crate::loan::Loan;
    use crate::store::LoanRecord;
    use crate::types::PeriodUnit;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_view_derives_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let mut loan = Loan::request(
            Uuid::new_v4(),
            Money::from_major(900),
            3,
            "laptop".to_string(),
            now,
        )
        .unwrap();
        let schedule = AmortizationCalculator::default()
            .schedule(Money::from_major(900), 3, Rate::ZERO)
            .unwrap();
        loan.approve(Money::from_major(900), &schedule, date(2024, 2, 1), Uuid::new_v4(), now)
            .unwrap();
        let mut ledger = InstallmentLedger::new(loan.id());
        ledger
            .generate_schedule(&loan, &schedule, date(2024, 2, 1), PeriodUnit::Monthly)
            .unwrap();
        loan.begin_repayment(&ledger, now).unwrap();

        let record = LoanRecord {
            loan,
            ledger,
            version: 1,
        };
        let view = LoanView::from_details(&LoanDetails::from_record(&record, date(2024, 3, 1)));

        assert_eq!(view.balances.overdue_installments, 1);
        assert_eq!(view.installments[0].status, InstallmentStatus::Overdue);
        assert_eq!(view.installments[0].days_overdue, 29);
        assert_eq!(view.installments[1].status, InstallmentStatus::Pending);
        assert_eq!(view.balances.next_due_date, Some(date(2024, 2, 1)));

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"IN_REPAYMENT\""));
        assert!(json.contains("\"OVERDUE\""));
        assert!(json.contains("\"300.00\""));
    }

    #[test]
    fn test_schedule_view_rows() {
        let schedule = AmortizationCalculator::default()
            .schedule(Money::from_major(1_000), 2, Rate::ZERO)
            .unwrap();
        let view = ScheduleView::from_schedule(&schedule);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[1].balance, Money::ZERO);
        assert_eq!(view.total_interest, Money::ZERO);
        assert!(view.to_json_pretty().unwrap().contains("\"500.00\""));
    }
}
