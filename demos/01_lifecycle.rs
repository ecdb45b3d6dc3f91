/// lifecycle - every transition of the loan state machine with controlled time
use std::sync::Arc;

use employee_loan_rs::chrono::{Duration, NaiveDate, TimeZone, Utc};
use employee_loan_rs::{
    ApprovalTerms, Decision, EngineConfig, InMemoryDirectory, LoanRequest, LoanService, Money,
    PageRequest, Rate, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("=== loan lifecycle example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let alice = Uuid::new_v4();
    let bruno = Uuid::new_v4();
    let carla = Uuid::new_v4();
    let hr_manager = Uuid::new_v4();
    let directory = Arc::new(InMemoryDirectory::with_employees([alice, bruno, carla]));
    let service = LoanService::in_memory(EngineConfig::default(), directory, time.clone())?;

    let request = |employee, amount, count, reason: &str| {
        service.request_loan(LoanRequest {
            employee_id: employee,
            amount: Money::from_major(amount),
            installment_count: count,
            reason: reason.to_string(),
        })
    };

    let approved = request(alice, 500_000, 6, "vehicle purchase")?;
    let rejected = request(bruno, 50_000, 10, "holiday")?;
    let withdrawn = request(carla, 20_000, 2, "furniture")?;
    println!("three requests submitted on {}", time.now().format("%Y-%m-%d"));

    // decisions a day later
    controller.advance(Duration::days(1));
    let loan = service.decide(
        approved.id(),
        Decision::Approve(ApprovalTerms {
            amount: None,
            rate: Rate::from_percent(employee_loan_rs::Decimal::new(15, 1))?,
            first_due_date: NaiveDate::from_ymd_opt(2024, 2, 25).ok_or("bad date")?,
        }),
        hr_manager,
    )?;
    println!(
        "approved: {} x {} = {}",
        loan.installment_count(),
        loan.installment_value().unwrap_or(Money::ZERO),
        loan.total_value().unwrap_or(Money::ZERO)
    );

    service.reject(rejected.id(), "insufficient tenure", None, hr_manager)?;
    match service.approve(
        rejected.id(),
        ApprovalTerms {
            amount: None,
            rate: Rate::ZERO,
            first_due_date: NaiveDate::from_ymd_opt(2024, 2, 25).ok_or("bad date")?,
        },
        hr_manager,
    ) {
        Err(err) => println!("late approval refused: {} ({})", err, err.code()),
        Ok(_) => println!("unexpected approval of a rejected loan"),
    }

    service.cancel(withdrawn.id())?;
    service.purge_cancelled(withdrawn.id())?;

    // one payroll deduction per month
    let installments = service.loan_details(approved.id(), time.now().date_naive())?.installments;
    for installment in &installments {
        let outcome = service.pay_installment(
            approved.id(),
            installment.id,
            installment.due_date,
            Some(format!("PAYROLL-{}", installment.due_date.format("%Y-%m"))),
        )?;
        println!(
            "installment {} paid, outstanding {}",
            installment.sequence_number,
            outcome.loan.outstanding_balance()
        );
    }

    let history = service.list_history(alice, PageRequest::first())?;
    println!("\nalice's loans: {}", history.total_items);
    println!("final status: {}", service.get_loan(approved.id())?.status());

    println!("\nevents:");
    for event in service.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
