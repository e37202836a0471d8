use clap::Parser;

use crate::{
    cli::economics::SavingsArgs,
    core::scoring::{recommend, viability_score},
    prelude::*,
    quantity::{cost::Cost, power::Kilowatts},
    tables::build_financials_table,
};

#[derive(Parser)]
pub struct FinanceArgs {
    /// Installed cost of the battery.
    #[clap(long = "cost")]
    pub cost: Cost,

    /// Monthly peak reduction, priced with the demand rate.
    #[clap(long = "peak-reduction-kw", conflicts_with = "annual_savings")]
    pub peak_reduction: Option<Kilowatts>,

    /// First-year savings, overriding the demand-rate pricing.
    #[clap(long = "annual-savings")]
    pub annual_savings: Option<Cost>,

    /// Analysis horizon in years.
    #[clap(long = "analysis-period", env = "FINANCE_ANALYSIS_PERIOD", default_value = "10")]
    pub analysis_period: u32,

    #[clap(flatten)]
    pub savings: SavingsArgs,
}

impl FinanceArgs {
    #[instrument(skip_all, fields(cost = %self.cost))]
    pub fn run(&self) -> Result {
        let model = self.savings.try_model(self.analysis_period)?;
        let first_year = match (self.peak_reduction, self.annual_savings) {
            (Some(peak_reduction), _) => model.first_year_savings(peak_reduction),
            (None, Some(annual_savings)) => annual_savings,
            (None, None) => bail!("either the peak reduction or the annual savings is required"),
        };
        let financials = model.evaluate_savings(self.cost, first_year);
        println!("{}", build_financials_table(&financials));

        let irr = financials.internal_rate_of_return;
        let score = viability_score(
            financials.simple_payback,
            financials.roi,
            financials.net_present_value,
            self.cost,
        );
        info!(
            npv = %financials.net_present_value,
            irr = irr.rate_percent,
            irr_converged = irr.converged,
            simple_payback = financials.simple_payback,
            adjusted_payback = financials.adjusted_payback,
            roi = financials.roi,
            "evaluated",
        );
        let recommendation =
            recommend(true, financials.simple_payback, financials.net_present_value);
        info!(score, %recommendation, "graded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command};

    #[test]
    fn test_parse() {
        let args = Args::parse_from([
            "peak-shaver",
            "finance",
            "--cost",
            "1000",
            "--annual-savings",
            "300",
        ]);
        let Command::Finance(args) = args.command else { unreachable!() };
        assert_eq!(args.analysis_period, 10);
        assert_eq!(args.annual_savings, Some(Cost::from(300.0)));
        assert!(args.run().is_ok());
    }

    #[test]
    fn test_requires_savings() {
        let args = Args::parse_from(["peak-shaver", "finance", "--cost", "1000"]);
        let Command::Finance(args) = args.command else { unreachable!() };
        assert!(args.run().is_err());
    }
}
