//! Tariff and financial arguments shared by the subcommands.

use clap::Parser;

use crate::{
    core::{finance::FinancialParameters, scoring::SavingsModel},
    prelude::*,
    quantity::rate::DemandRate,
};

#[derive(Copy, Clone, Parser)]
pub struct SavingsArgs {
    /// Demand charge per kilowatt of the monthly billed peak.
    #[clap(long = "demand-rate", env = "DEMAND_RATE", default_value = "15")]
    pub demand_rate: DemandRate,

    /// Yearly decline of the demand credit as the battery degrades.
    #[clap(long = "degradation-rate", env = "DEGRADATION_RATE", default_value = "0.02")]
    pub degradation_rate: f64,

    #[clap(flatten)]
    pub financial: FinancialArgs,
}

impl SavingsArgs {
    pub fn try_model(&self, analysis_period: u32) -> Result<SavingsModel> {
        ensure!(self.demand_rate >= DemandRate::ZERO, "the demand rate must not be negative");
        ensure!(
            (0.0..1.0).contains(&self.degradation_rate),
            "the degradation rate must be within [0, 1)",
        );
        Ok(SavingsModel::builder()
            .demand_rate(self.demand_rate)
            .degradation_rate(self.degradation_rate)
            .financial(self.financial.try_parameters(analysis_period)?)
            .build())
    }
}

#[derive(Copy, Clone, Parser)]
pub struct FinancialArgs {
    #[clap(long = "discount-rate", env = "DISCOUNT_RATE", default_value = "0.06")]
    pub discount_rate: f64,

    /// Yearly escalation of the demand charge.
    #[clap(long = "inflation-rate", env = "INFLATION_RATE")]
    pub inflation_rate: Option<f64>,

    /// Share of the savings lost to taxes.
    #[clap(long = "tax-rate", env = "TAX_RATE")]
    pub tax_rate: Option<f64>,
}

impl FinancialArgs {
    pub fn try_parameters(&self, analysis_period: u32) -> Result<FinancialParameters> {
        ensure!(analysis_period != 0, "the analysis period must be at least one year");
        ensure!(self.discount_rate > -1.0, "the discount rate must be above -100%");
        ensure!(
            self.tax_rate.is_none_or(|tax_rate| (0.0..=1.0).contains(&tax_rate)),
            "the tax rate must be within [0, 1]",
        );
        Ok(FinancialParameters::builder()
            .discount_rate(self.discount_rate)
            .analysis_period(analysis_period)
            .maybe_inflation_rate(self.inflation_rate)
            .maybe_tax_rate(self.tax_rate)
            .build())
    }
}
