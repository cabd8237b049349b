use tracing::warn;

use super::types::MortgageState;

/// Fixed monthly payment that retires `principal` over `num_periods` months.
///
/// `num_periods` must be positive; a zero term divides by zero and yields a
/// non-finite payment.
pub fn periodic_payment(annual_rate_pct: f64, num_periods: u32, principal: f64) -> f64 {
    let n = num_periods as f64;
    if annual_rate_pct == 0.0 {
        return principal / n;
    }
    let monthly_rate = annual_rate_pct / 100.0 / 12.0;
    principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-n))
}

impl MortgageState {
    /// A fresh loan with its scheduled payment filled in. A zero term or
    /// non-positive principal produces an inactive mortgage.
    pub fn amortizing(
        principal: f64,
        annual_rate_pct: f64,
        term_months: u32,
        reinvest_after_payoff: bool,
    ) -> Self {
        if term_months == 0 || principal <= 0.0 {
            if term_months == 0 && principal > 0.0 {
                warn!(principal, "mortgage with zero term ignored");
            }
            return Self::default();
        }
        Self {
            active: true,
            remaining_principal: principal,
            annual_rate_pct,
            remaining_term_months: term_months,
            monthly_payment: periodic_payment(annual_rate_pct, term_months, principal),
            reinvest_after_payoff,
        }
    }
}
