use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::ledger::Installment;
use crate::loan::Loan;
use crate::store::LoanRecord;
use crate::types::{EmployeeId, InstallmentStatus, LoanId, LoanStatus};

/// 1-based page selector; a missing size falls back to the configured default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size: Some(page_size),
        }
    }

    pub fn first() -> Self {
        Self::default()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// cut one page out of an already ordered result set. Oversized pages are
/// clamped to `max_page_size`
pub fn paginate<T>(items: Vec<T>, request: PageRequest, config: &EngineConfig) -> Result<Page<T>> {
    if request.page == 0 {
        return Err(LoanError::validation("page numbers start at 1"));
    }
    let page_size = match request.page_size {
        Some(0) => return Err(LoanError::validation("page size must be at least 1")),
        Some(size) => size.min(config.max_page_size),
        None => config.default_page_size,
    };

    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let items = items
        .into_iter()
        .skip((request.page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Ok(Page {
        items,
        page: request.page,
        page_size,
        total_items,
        total_pages,
    })
}

/// loan with its installments as seen on `as_of`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDetails {
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub as_of: NaiveDate,
}

impl LoanDetails {
    pub fn from_record(record: &LoanRecord, as_of: NaiveDate) -> Self {
        Self {
            loan: record.loan.clone(),
            installments: record.ledger.installments().to_vec(),
            as_of,
        }
    }

    /// installment statuses with `OVERDUE` derived against `as_of`
    pub fn effective_statuses(&self) -> Vec<InstallmentStatus> {
        self.installments
            .iter()
            .map(|i| i.effective_status(self.as_of))
            .collect()
    }

    pub fn overdue_count(&self) -> usize {
        self.installments
            .iter()
            .filter(|i| i.is_overdue(self.as_of))
            .count()
    }

    /// next installment to deduct from payroll
    pub fn next_due(&self) -> Option<&Installment> {
        self.installments.iter().find(|i| !i.is_paid())
    }
}

/// pending installment past its due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueInstallment {
    pub loan_id: LoanId,
    pub employee_id: EmployeeId,
    pub installment: Installment,
    pub days_overdue: u32,
}

/// aggregate counters over a set of loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoanStatistics {
    pub total_loans: usize,
    pub requested: usize,
    pub approved: usize,
    pub rejected: usize,
    pub in_repayment: usize,
    pub settled: usize,
    pub cancelled: usize,
    /// sum of requested amounts over every loan
    pub total_requested: Money,
    /// sum of approved amounts over loans in repayment or settled
    pub total_approved: Money,
    pub total_paid: Money,
    pub total_outstanding: Money,
}

impl LoanStatistics {
    pub fn count(&self, status: LoanStatus) -> usize {
        match status {
            LoanStatus::Requested => self.requested,
            LoanStatus::Approved => self.approved,
            LoanStatus::Rejected => self.rejected,
            LoanStatus::InRepayment => self.in_repayment,
            LoanStatus::Settled => self.settled,
            LoanStatus::Cancelled => self.cancelled,
        }
    }

    fn add(&mut self, loan: &Loan) -> Result<()> {
        let sum = |total: Money, amount: Money, what: &str| {
            total
                .checked_add(amount)
                .ok_or_else(|| LoanError::overflow(what))
        };

        self.total_requested = sum(self.total_requested, loan.requested_amount(), "total requested")?;
        if matches!(loan.status(), LoanStatus::InRepayment | LoanStatus::Settled) {
            let approved = loan.approved_amount().unwrap_or(Money::ZERO);
            self.total_approved = sum(self.total_approved, approved, "total approved")?;
        }
        self.total_paid = sum(self.total_paid, loan.amount_paid(), "total paid")?;
        self.total_outstanding = sum(self.total_outstanding, loan.outstanding_balance(), "total outstanding")?;

        self.total_loans += 1;
        match loan.status() {
            LoanStatus::Requested => self.requested += 1,
            LoanStatus::Approved => self.approved += 1,
            LoanStatus::Rejected => self.rejected += 1,
            LoanStatus::InRepayment => self.in_repayment += 1,
            LoanStatus::Settled => self.settled += 1,
            LoanStatus::Cancelled => self.cancelled += 1,
        }
        Ok(())
    }
}

/// criteria of the general loan listing; unset fields match everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub employee_id: Option<EmployeeId>,
    /// first request date included
    pub requested_from: Option<NaiveDate>,
    /// last request date included
    pub requested_to: Option<NaiveDate>,
}

impl LoanFilter {
    pub fn with_status(status: LoanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn for_employee(employee_id: EmployeeId) -> Self {
        Self {
            employee_id: Some(employee_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        let requested_on = loan.requested_at().date_naive();
        self.status.map_or(true, |status| loan.status() == status)
            && belongs_to(loan, self.employee_id)
            && self.requested_from.map_or(true, |from| requested_on >= from)
            && self.requested_to.map_or(true, |to| requested_on <= to)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match (self.requested_from, self.requested_to) {
            (Some(from), Some(to)) if from > to => Err(LoanError::validation(format!(
                "request date range is empty: {} is after {}",
                from, to
            ))),
            _ => Ok(()),
        }
    }
}

fn belongs_to(loan: &Loan, employee_id: Option<EmployeeId>) -> bool {
    employee_id.map_or(true, |id| loan.employee_id() == id)
}

/// newest request first, id as tie-breaker so pages are stable
fn newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| {
        b.requested_at()
            .cmp(&a.requested_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

/// loans matching `filter`, newest first
pub fn filter_loans(records: &[LoanRecord], filter: &LoanFilter) -> Vec<Loan> {
    let mut loans: Vec<Loan> = records
        .iter()
        .map(|r| &r.loan)
        .filter(|l| filter.matches(l))
        .cloned()
        .collect();
    newest_first(&mut loans);
    loans
}

/// loans awaiting a decision
pub fn pending_loans(records: &[LoanRecord], employee_id: Option<EmployeeId>) -> Vec<Loan> {
    let mut loans: Vec<Loan> = records
        .iter()
        .map(|r| &r.loan)
        .filter(|l| l.status() == LoanStatus::Requested && belongs_to(l, employee_id))
        .cloned()
        .collect();
    newest_first(&mut loans);
    loans
}

/// every loan of one employee, whatever the status
pub fn loan_history(records: &[LoanRecord], employee_id: EmployeeId) -> Vec<Loan> {
    let mut loans: Vec<Loan> = records
        .iter()
        .map(|r| &r.loan)
        .filter(|l| l.employee_id() == employee_id)
        .cloned()
        .collect();
    newest_first(&mut loans);
    loans
}

/// overdue installments ordered by due date, oldest first
pub fn overdue_installments(records: &[LoanRecord], as_of: NaiveDate) -> Vec<OverdueInstallment> {
    let mut overdue: Vec<OverdueInstallment> = records
        .iter()
        .filter(|r| r.loan.status() == LoanStatus::InRepayment)
        .flat_map(|r| {
            r.ledger.overdue(as_of).map(move |i| OverdueInstallment {
                loan_id: r.loan.id(),
                employee_id: r.loan.employee_id(),
                installment: i.clone(),
                days_overdue: i.days_overdue(as_of),
            })
        })
        .collect();
    overdue.sort_by(|a, b| {
        a.installment
            .due_date
            .cmp(&b.installment.due_date)
            .then_with(|| a.loan_id.cmp(&b.loan_id))
            .then_with(|| a.installment.sequence_number.cmp(&b.installment.sequence_number))
    });
    overdue
}

pub fn loan_statistics(records: &[LoanRecord], employee_id: Option<EmployeeId>) -> Result<LoanStatistics> {
    let mut stats = LoanStatistics::default();
    for record in records.iter().filter(|r| belongs_to(&r.loan, employee_id)) {
        stats.add(&record.loan)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    fn requested_on(employee_id: EmployeeId, day: u32) -> LoanRecord {
        let at: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 4, day, 10, 0, 0).unwrap();
        let loan = Loan::request(employee_id, Money::from_major(800), 4, "tuition".to_string(), at).unwrap();
        LoanRecord::new(loan)
    }

    /// a stored loan whose requested amount predates any bound
    fn stored_with_amount(amount: &str) -> LoanRecord {
        let record = requested_on(Uuid::new_v4(), 1);
        let mut json = serde_json::to_value(&record.loan).unwrap();
        json["requested_amount"] = serde_json::Value::String(amount.to_string());
        LoanRecord::new(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_filter_by_status_employee_and_date() {
        let alice = Uuid::new_v4();
        let bruno = Uuid::new_v4();
        let mut records = vec![
            requested_on(alice, 1),
            requested_on(alice, 10),
            requested_on(bruno, 20),
        ];
        let now = Utc.with_ymd_and_hms(2024, 4, 21, 9, 0, 0).unwrap();
        records[0].loan.cancel(now).unwrap();

        assert_eq!(filter_loans(&records, &LoanFilter::default()).len(), 3);
        assert_eq!(filter_loans(&records, &LoanFilter::for_employee(alice)).len(), 2);

        let cancelled = filter_loans(&records, &LoanFilter::with_status(LoanStatus::Cancelled));
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id(), records[0].loan.id());

        let window = LoanFilter {
            requested_from: NaiveDate::from_ymd_opt(2024, 4, 10),
            requested_to: NaiveDate::from_ymd_opt(2024, 4, 20),
            ..LoanFilter::default()
        };
        let loans = filter_loans(&records, &window);
        // both bounds inclusive, newest first
        assert_eq!(loans.len(), 2);
        assert_eq!(loans[0].employee_id(), bruno);
        assert_eq!(loans[1].id(), records[1].loan.id());

        let inverted = LoanFilter {
            requested_from: NaiveDate::from_ymd_opt(2024, 5, 1),
            requested_to: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..LoanFilter::default()
        };
        assert!(matches!(inverted.validate(), Err(LoanError::Validation { .. })));
        assert!(window.validate().is_ok());
    }

    #[test]
    fn test_statistics_report_overflow() {
        let records = vec![
            stored_with_amount("50000000000000000000000000000"),
            stored_with_amount("50000000000000000000000000000"),
        ];
        assert!(matches!(
            loan_statistics(&records, None),
            Err(LoanError::Validation { .. })
        ));

        let stats = loan_statistics(&records[..1], None).unwrap();
        assert_eq!(stats.total_loans, 1);
        assert_eq!(stats.requested, 1);
    }

    #[test]
    fn test_paginate_clamps_and_counts() {
        let config = EngineConfig {
            default_page_size: 2,
            max_page_size: 3,
            ..EngineConfig::default()
        };
        let items: Vec<u32> = (1..=7).collect();

        let page = paginate(items.clone(), PageRequest::first(), &config).unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total_pages, 4);
        assert!(page.has_next());

        let page = paginate(items.clone(), PageRequest::new(3, 50), &config).unwrap();
        assert_eq!(page.page_size, 3);
        assert_eq!(page.items, vec![7]);
        assert!(!page.has_next());

        let page = paginate(items.clone(), PageRequest::new(9, 3), &config).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_items, 7);

        assert!(paginate(items.clone(), PageRequest::new(0, 3), &config).is_err());
        assert!(paginate(items, PageRequest::new(1, 0), &config).is_err());
    }

    #[test]
    fn test_paginate_empty_set() {
        let page = paginate(Vec::<u32>::new(), PageRequest::first(), &EngineConfig::default()).unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(page.is_empty());
        assert!(!page.has_next());
    }
}
