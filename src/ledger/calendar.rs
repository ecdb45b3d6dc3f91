use chrono::{Days, Months, NaiveDate};

use crate::errors::{LoanError, Result};
use crate::types::PeriodUnit;

/// due date of the installment at zero-based `index`, counted from `start`.
///
/// Offsets are always taken from the start date, so a schedule starting on
/// the 31st lands on the 31st again whenever the month has one.
pub fn due_date(start: NaiveDate, index: u32, unit: PeriodUnit) -> Result<NaiveDate> {
    let date = match unit {
        PeriodUnit::Monthly => start.checked_add_months(Months::new(index)),
        PeriodUnit::Biweekly => start.checked_add_days(Days::new(14 * index as u64)),
        PeriodUnit::Weekly => start.checked_add_days(Days::new(7 * index as u64)),
    };

    date.ok_or_else(|| {
        LoanError::validation(format!(
            "due date out of range: {} + {} {:?} periods",
            start, index, unit
        ))
    })
}

/// all due dates for a schedule of `count` installments
pub fn due_dates(start: NaiveDate, count: u32, unit: PeriodUnit) -> Result<Vec<NaiveDate>> {
    (0..count).map(|i| due_date(start, i, unit)).collect()
}
