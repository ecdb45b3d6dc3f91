use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::TotalValuePolicy;

/// one row of an amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub number: u32,
    pub amount: Money,
    pub interest_portion: Money,
    pub principal_portion: Money,
    pub ending_balance: Money,
}

/// amortization schedule, amounts only (no dates)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub principal: Money,
    pub rate: Rate,
    pub periods: u32,
    pub policy: TotalValuePolicy,
    /// the per-installment value quoted to the borrower
    pub installment_value: Money,
    pub payments: Vec<ScheduledPayment>,
    total_value: Money,
    total_interest: Money,
}

impl AmortizationSchedule {
    /// amount actually collected over the life of the loan
    pub fn total_value(&self) -> Money {
        self.total_value
    }

    pub fn total_interest(&self) -> Money {
        self.total_interest
    }

    pub fn amounts(&self) -> Vec<Money> {
        self.payments.iter().map(|p| p.amount).collect()
    }

    /// get payment for specific period (1-based)
    pub fn get_payment(&self, number: u32) -> Option<&ScheduledPayment> {
        number
            .checked_sub(1)
            .and_then(|idx| self.payments.get(idx as usize))
    }
}

/// amortization calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct AmortizationCalculator {
    policy: TotalValuePolicy,
}

impl AmortizationCalculator {
    pub fn new(policy: TotalValuePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TotalValuePolicy {
        self.policy
    }

    /// constant installment value for the given terms
    pub fn compute_installment(&self, principal: Money, periods: u32, rate: Rate) -> Result<Money> {
        compute_installment(principal, periods, rate)
    }

    /// full schedule with interest/principal split
    pub fn schedule(&self, principal: Money, periods: u32, rate: Rate) -> Result<AmortizationSchedule> {
        validate_inputs(principal, periods, rate)?;

        let installment_value = compute_installment(principal, periods, rate)?;
        let amounts = self.installment_amounts(principal, periods, rate, installment_value)?;

        let r = rate.as_decimal();
        let mut balance = principal;
        let mut payments = Vec::with_capacity(amounts.len());

        for (idx, amount) in amounts.into_iter().enumerate() {
            let number = idx as u32 + 1;
            let (interest_portion, principal_portion) = if number == periods {
                // final row retires whatever principal is left
                let interest = amount.checked_sub(balance).ok_or_else(|| overflow("interest"))?;
                (interest, balance)
            } else {
                let interest = balance
                    .as_decimal()
                    .checked_mul(r)
                    .map(Money::from_decimal)
                    .ok_or_else(|| overflow("interest"))?;
                let principal_portion = amount
                    .checked_sub(interest)
                    .ok_or_else(|| overflow("principal portion"))?;
                (interest, principal_portion)
            };
            balance = balance
                .checked_sub(principal_portion)
                .ok_or_else(|| overflow("balance"))?;

            payments.push(ScheduledPayment {
                number,
                amount,
                interest_portion,
                principal_portion,
                ending_balance: balance,
            });
        }

        let total_value = Money::checked_sum(payments.iter().map(|p| p.amount))
            .ok_or_else(|| overflow("total value"))?;
        let total_interest = Money::checked_sum(payments.iter().map(|p| p.interest_portion))
            .ok_or_else(|| overflow("total interest"))?;

        Ok(AmortizationSchedule {
            principal,
            rate,
            periods,
            policy: self.policy,
            installment_value,
            payments,
            total_value,
            total_interest,
        })
    }

    /// per-installment amounts, residual cents landing on the last one
    fn installment_amounts(
        &self,
        principal: Money,
        periods: u32,
        rate: Rate,
        installment_value: Money,
    ) -> Result<Vec<Money>> {
        let mut amounts = vec![installment_value; periods as usize];

        let target_total = if rate.is_zero() {
            Some(principal)
        } else {
            match self.policy {
                TotalValuePolicy::InstallmentTimesPeriods => None,
                TotalValuePolicy::ExactInterest => {
                    let exact = unrounded_installment(principal, periods, rate)?;
                    let total = exact
                        .checked_mul(Decimal::from(periods))
                        .ok_or_else(|| overflow("total value"))?;
                    Some(Money::from_decimal(total))
                }
            }
        };

        if let Some(total) = target_total {
            let last = installment_value
                .checked_times(periods - 1)
                .and_then(|leading| total.checked_sub(leading))
                .ok_or_else(|| overflow("last installment"))?;
            if !last.is_positive() {
                return Err(LoanError::InvalidAmortizationInput {
                    message: format!(
                        "principal {} is too small to split into {} installments",
                        principal, periods
                    ),
                });
            }
            if let Some(slot) = amounts.last_mut() {
                *slot = last;
            }
        }

        Ok(amounts)
    }
}

/// constant installment value (Price/French system), or flat division when the rate is zero
pub fn compute_installment(principal: Money, periods: u32, rate: Rate) -> Result<Money> {
    validate_inputs(principal, periods, rate)?;

    let installment = Money::from_decimal(unrounded_installment(principal, periods, rate)?);
    if !installment.is_positive() {
        return Err(LoanError::InvalidAmortizationInput {
            message: format!(
                "principal {} yields a zero installment over {} periods",
                principal, periods
            ),
        });
    }
    Ok(installment)
}

fn validate_inputs(principal: Money, periods: u32, rate: Rate) -> Result<()> {
    if !principal.is_positive() {
        return Err(LoanError::InvalidAmortizationInput {
            message: format!("principal must be positive, got {}", principal),
        });
    }
    if periods == 0 {
        return Err(LoanError::InvalidAmortizationInput {
            message: "periods must be at least 1".to_string(),
        });
    }
    if rate.is_negative() {
        return Err(LoanError::InvalidAmortizationInput {
            message: format!("rate must not be negative, got {}", rate),
        });
    }
    Ok(())
}

/// installment before rounding, in full decimal precision
fn unrounded_installment(principal: Money, periods: u32, rate: Rate) -> Result<Decimal> {
    let p = principal.as_decimal();
    let r = rate.as_decimal();

    if r.is_zero() {
        return Ok(p / Decimal::from(periods));
    }

    // PMT = P * r * (1 + r)^n / ((1 + r)^n - 1)
    let base = Decimal::ONE
        .checked_add(r)
        .ok_or_else(|| overflow("compound factor"))?;
    let compound = checked_powu(base, periods)?;
    let denominator = compound
        .checked_sub(Decimal::ONE)
        .ok_or_else(|| overflow("compound factor"))?;
    if denominator.is_zero() {
        return Err(LoanError::InvalidAmortizationInput {
            message: format!("rate {} is below decimal precision", rate),
        });
    }

    let numerator = p
        .checked_mul(r)
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(|| overflow("installment"))?;
    numerator
        .checked_div(denominator)
        .ok_or_else(|| overflow("installment"))
}

/// exponentiation by squaring with overflow detection
fn checked_powu(base: Decimal, exp: u32) -> Result<Decimal> {
    let mut result = Decimal::ONE;
    let mut factor = base;
    let mut remaining = exp;

    while remaining > 0 {
        if remaining & 1 == 1 {
            result = result.checked_mul(factor).ok_or_else(|| overflow("compound factor"))?;
        }
        remaining >>= 1;
        if remaining > 0 {
            factor = factor.checked_mul(factor).ok_or_else(|| overflow("compound factor"))?;
        }
    }

    Ok(result)
}

fn overflow(what: &str) -> LoanError {
    LoanError::InvalidAmortizationInput {
        message: format!("{} overflows decimal range", what),
    }
}
