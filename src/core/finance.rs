use serde::Serialize;

use crate::{prelude::*, quantity::cost::Cost};

/// Discounted cash flow settings.
#[derive(Copy, Clone, Debug, Serialize, bon::Builder)]
pub struct FinancialParameters {
    #[builder(default = 0.06)]
    pub discount_rate: f64,

    /// Analysis horizon in years.
    #[builder(default = 15)]
    pub analysis_period: u32,

    /// Yearly escalation of the demand charge.
    pub inflation_rate: Option<f64>,

    /// Share of the savings lost to taxes.
    pub tax_rate: Option<f64>,
}

impl Default for FinancialParameters {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FinancialParameters {
    /// Project the first-year savings over the analysis period.
    ///
    /// The savings decline with the battery degradation, escalate with the inflation,
    /// and are reduced by the tax.
    pub fn project_savings(&self, first_year: Cost, degradation_rate: f64) -> Vec<Cost> {
        let yearly_factor = (1.0 - degradation_rate) * (1.0 + self.inflation_rate.unwrap_or(0.0));
        let after_tax = 1.0 - self.tax_rate.unwrap_or(0.0);
        (0..self.analysis_period)
            .scan(first_year * after_tax, |savings, _| {
                let current = *savings;
                *savings = *savings * yearly_factor;
                Some(current)
            })
            .collect()
    }
}

/// Outcome of the internal rate of return solver.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct IrrResult {
    /// Last iterate in percent, even when not converged.
    pub rate_percent: f64,

    pub converged: bool,
    pub iterations: u32,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct YearBreakdown {
    /// 1-based year number.
    pub year: u32,

    pub savings: Cost,
    pub cumulative_savings: Cost,
    pub present_value: Cost,

    /// Net present value at the end of the year, including the initial cost.
    pub cumulative_npv: Cost,
}

#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct FinancialAnalysis {
    pub initial_cost: Cost,
    pub total_savings: Cost,
    pub net_present_value: Cost,
    pub internal_rate_of_return: IrrResult,

    /// Years until the undiscounted savings recover the cost, or the horizon length if never.
    pub simple_payback: f64,

    /// Years until the discounted savings recover the cost, or the horizon length if never.
    pub adjusted_payback: f64,

    /// Return on investment over the horizon, in percent.
    pub roi: f64,

    pub year_by_year: Vec<YearBreakdown>,
}

impl FinancialAnalysis {
    const IRR_INITIAL_RATE: f64 = 0.1;
    const IRR_MAX_ITERATIONS: u32 = 100;
    const IRR_TOLERANCE: f64 = 1e-4;
    const IRR_MIN_RATE: f64 = -0.99;
    const IRR_MAX_RATE: f64 = 10.0;

    /// Evaluate the investment, the savings being received at the end of each year.
    #[instrument(skip_all, fields(?initial_cost, n_years = yearly_savings.len()))]
    pub fn evaluate(initial_cost: Cost, yearly_savings: &[Cost], discount_rate: f64) -> Self {
        let mut year_by_year = Vec::with_capacity(yearly_savings.len());
        let mut cumulative_savings = Cost::ZERO;
        let mut cumulative_npv = -initial_cost;
        for (year, savings) in (1..).zip(yearly_savings) {
            let present_value = *savings / (1.0 + discount_rate).powi(year);
            cumulative_savings += *savings;
            cumulative_npv += present_value;
            year_by_year.push(YearBreakdown {
                year: year.unsigned_abs(),
                savings: *savings,
                cumulative_savings,
                present_value,
                cumulative_npv,
            });
        }

        let roi = if initial_cost > Cost::ZERO {
            100.0 * ((cumulative_savings - initial_cost) / initial_cost)
        } else {
            0.0
        };
        let analysis = Self {
            initial_cost,
            total_savings: cumulative_savings,
            net_present_value: cumulative_npv,
            internal_rate_of_return: Self::solve_irr(initial_cost, yearly_savings),
            simple_payback: payback(
                initial_cost,
                year_by_year
                    .iter()
                    .map(|breakdown| (breakdown.savings, breakdown.cumulative_savings)),
            ),
            adjusted_payback: payback(
                initial_cost,
                year_by_year.iter().map(|breakdown| {
                    (breakdown.present_value, breakdown.cumulative_npv + initial_cost)
                }),
            ),
            roi,
            year_by_year,
        };
        debug!(
            npv = ?analysis.net_present_value,
            irr = analysis.internal_rate_of_return.rate_percent,
            payback = analysis.simple_payback,
            "evaluated",
        );
        analysis
    }

    /// Newton-Raphson on the net present value as a function of the rate.
    ///
    /// Cash flows changing sign more than once may have several roots,
    /// in which case the solver lands on an arbitrary one.
    fn solve_irr(initial_cost: Cost, yearly_savings: &[Cost]) -> IrrResult {
        let mut rate = Self::IRR_INITIAL_RATE;
        for iteration in 1..=Self::IRR_MAX_ITERATIONS {
            let (npv, derivative) = (1..).zip(yearly_savings).fold(
                (-initial_cost.0, 0.0),
                |(npv, derivative), (year, savings)| {
                    let discount = (1.0 + rate).powi(year);
                    (
                        npv + savings.0 / discount,
                        derivative - f64::from(year) * savings.0 / (discount * (1.0 + rate)),
                    )
                },
            );
            if npv.abs() < Self::IRR_TOLERANCE {
                return IrrResult {
                    rate_percent: 100.0 * rate,
                    converged: true,
                    iterations: iteration,
                };
            }
            if derivative.abs() < Self::IRR_TOLERANCE {
                trace!(rate, npv, "flat net present value, giving up");
                return IrrResult {
                    rate_percent: 100.0 * rate,
                    converged: false,
                    iterations: iteration,
                };
            }
            rate = (rate - npv / derivative).clamp(Self::IRR_MIN_RATE, Self::IRR_MAX_RATE);
        }
        warn!(rate, "internal rate of return did not converge");
        IrrResult {
            rate_percent: 100.0 * rate,
            converged: false,
            iterations: Self::IRR_MAX_ITERATIONS,
        }
    }
}

/// Find the interpolated year when the cumulative value first reaches the cost.
///
/// Takes pairs of the yearly increment and the cumulative value at the end of the year.
#[allow(clippy::cast_precision_loss)]
fn payback(initial_cost: Cost, years: impl ExactSizeIterator<Item = (Cost, Cost)>) -> f64 {
    if initial_cost <= Cost::ZERO {
        return 0.0;
    }
    let n_years = years.len();
    for (index, (increment, cumulative)) in years.enumerate() {
        if cumulative >= initial_cost {
            let shortfall = initial_cost - (cumulative - increment);
            return index as f64 + shortfall / increment;
        }
    }
    n_years as f64
}
