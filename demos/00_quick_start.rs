/// quick start - request, approve and pay a payroll loan
use std::sync::Arc;

use employee_loan_rs::chrono::NaiveDate;
use employee_loan_rs::{
    ApprovalTerms, EngineConfig, InMemoryDirectory, LoanRequest, LoanService, LoanView, Money,
    Rate, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let employee = Uuid::new_v4();
    let directory = Arc::new(InMemoryDirectory::with_employees([employee]));
    let service = LoanService::in_memory(
        EngineConfig::default(),
        directory,
        SafeTimeProvider::new(TimeSource::System),
    )?;

    // 10,000 over 12 months
    let loan = service.request_loan(LoanRequest {
        employee_id: employee,
        amount: Money::from_major(10_000),
        installment_count: 12,
        reason: "home repairs".to_string(),
    })?;

    let first_due = NaiveDate::from_ymd_opt(2024, 2, 25).ok_or("bad date")?;
    service.approve(
        loan.id(),
        ApprovalTerms {
            amount: None,
            rate: Rate::parse("0.015")?,
            first_due_date: first_due,
        },
        Uuid::new_v4(),
    )?;

    // pay the first installment
    let details = service.loan_details(loan.id(), first_due)?;
    let first = &details.installments[0];
    service.pay_installment(loan.id(), first.id, first_due, Some("PAYROLL-2024-02".to_string()))?;

    let details = service.loan_details(loan.id(), first_due)?;
    println!("{}", LoanView::from_details(&details).to_json_pretty()?);

    Ok(())
}
