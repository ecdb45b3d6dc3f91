use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::{PeriodUnit, TotalValuePolicy};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// upper bound on installments per loan
    pub max_installments: u32,
    /// upper bound on requested and approved amounts
    pub max_amount: Money,
    /// spacing between installment due dates
    pub period_unit: PeriodUnit,
    /// rounding policy for the collected total of interest-bearing loans
    pub total_value_policy: TotalValuePolicy,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// refuse requests for employees the directory does not know
    pub require_known_employee: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_installments: 60,
            max_amount: Money::MAX_AMOUNT,
            period_unit: PeriodUnit::Monthly,
            total_value_policy: TotalValuePolicy::InstallmentTimesPeriods,
            default_page_size: 20,
            max_page_size: 100,
            require_known_employee: true,
        }
    }
}

impl EngineConfig {
    /// parse from json, missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| LoanError::validation(format!("malformed engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_installments == 0 {
            return Err(LoanError::validation("max_installments must be at least 1"));
        }
        if !self.max_amount.is_positive() || self.max_amount > Money::MAX_AMOUNT {
            return Err(LoanError::validation(format!(
                "max_amount must be between 0.01 and {}, got {}",
                Money::MAX_AMOUNT,
                self.max_amount
            )));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(LoanError::validation("page sizes must be at least 1"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(LoanError::validation(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// check a requested installment count against the configured bound
    pub fn check_installment_count(&self, count: u32) -> Result<u32> {
        if count == 0 || count > self.max_installments {
            return Err(LoanError::validation(format!(
                "installment count must be between 1 and {}, got {}",
                self.max_installments, count
            )));
        }
        Ok(count)
    }

    /// check a requested or approved amount against the configured bounds
    pub fn check_amount(&self, amount: Money, field: &str) -> Result<Money> {
        amount
            .ensure_positive(field)?
            .ensure_at_most(self.max_amount, field)
    }
}
