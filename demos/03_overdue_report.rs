/// overdue report - derived overdue status and portfolio statistics
use std::sync::Arc;

use employee_loan_rs::chrono::{NaiveDate, TimeZone, Utc};
use employee_loan_rs::{
    ApprovalTerms, EngineConfig, InMemoryDirectory, LoanRequest, LoanService, Money, PageRequest,
    Rate, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
    ));
    let config = EngineConfig::from_json(r#"{ "default_page_size": 5 }"#)?;
    let staff: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let directory = Arc::new(InMemoryDirectory::with_employees(staff.iter().copied()));
    let service = LoanService::in_memory(config, directory, time)?;

    let first_due = NaiveDate::from_ymd_opt(2024, 1, 31).ok_or("bad date")?;
    for (n, employee) in staff.iter().enumerate() {
        let loan = service.request_loan(LoanRequest {
            employee_id: *employee,
            amount: Money::from_major(2_000 * (n as i64 + 1)),
            installment_count: 4,
            reason: "salary advance".to_string(),
        })?;
        service.approve(
            loan.id(),
            ApprovalTerms {
                amount: None,
                rate: Rate::from_bps(100),
                first_due_date: first_due,
            },
            Uuid::new_v4(),
        )?;

        // even-numbered employees keep up with payroll
        if n % 2 == 0 {
            let details = service.loan_details(loan.id(), first_due)?;
            for installment in details.installments.iter().take(2) {
                service.pay_installment(loan.id(), installment.id, installment.due_date, None)?;
            }
        }
    }

    let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).ok_or("bad date")?;
    let mut page = PageRequest::first();
    loop {
        let overdue = service.list_overdue(as_of, page)?;
        println!("page {}/{}", overdue.page, overdue.total_pages);
        for item in &overdue.items {
            println!(
                "  loan {} #{} due {} ({} days) {}",
                item.loan_id,
                item.installment.sequence_number,
                item.installment.due_date,
                item.days_overdue,
                item.installment.amount
            );
        }
        if !overdue.has_next() {
            break;
        }
        page.page += 1;
    }

    let stats = service.statistics(None)?;
    println!("\n{}", portfolio_summary(&stats));

    Ok(())
}

fn portfolio_summary(stats: &employee_loan_rs::LoanStatistics) -> String {
    format!(
        "loans: {}, in repayment: {}, approved total: {}, paid: {}, outstanding: {}",
        stats.total_loans,
        stats.in_repayment,
        stats.total_approved,
        stats.total_paid,
        stats.total_outstanding
    )
}
