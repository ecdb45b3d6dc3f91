/// simulator - compare schedules before submitting a request
use employee_loan_rs::{
    AmortizationCalculator, Money, Rate, ScheduleView, TotalValuePolicy,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== loan simulator ===\n");

    let principal = Money::parse("500000")?;
    let rate = Rate::parse("0.015")?;

    for policy in [
        TotalValuePolicy::InstallmentTimesPeriods,
        TotalValuePolicy::ExactInterest,
    ] {
        let schedule = AmortizationCalculator::new(policy).schedule(principal, 6, rate)?;
        println!(
            "{:?}: installment {}, total {}, interest {}",
            policy,
            schedule.installment_value,
            schedule.total_value(),
            schedule.total_interest()
        );
    }

    // interest-free advance, last installment absorbs the cents
    let advance = AmortizationCalculator::default().schedule(Money::from_major(1_000_000), 12, Rate::ZERO)?;
    println!("\ninterest-free amounts: {:?}", advance.amounts());

    println!("\n{}", ScheduleView::from_schedule(&advance).to_json_pretty()?);

    Ok(())
}
