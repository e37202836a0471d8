use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use comfy_table::Color;
use serde::Serialize;

use crate::{
    core::{
        configuration::BatteryConfiguration,
        dispatch::{DispatchOutcome, Simulator},
        finance::{FinancialAnalysis, FinancialParameters},
        profile::LoadProfile,
        scenario::ScenarioSpec,
    },
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts, rate::DemandRate},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Recommended,
    Marginal,
    NotRecommended,
}

impl Recommendation {
    pub const fn color(self) -> Color {
        match self {
            Self::Recommended => Color::Green,
            Self::Marginal => Color::DarkYellow,
            Self::NotRecommended => Color::Red,
        }
    }
}

impl Display for Recommendation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recommended => write!(f, "recommended"),
            Self::Marginal => write!(f, "marginal"),
            Self::NotRecommended => write!(f, "not recommended"),
        }
    }
}

/// How the demand reduction turns into money.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct SavingsModel {
    /// Demand charge per kilowatt of the monthly peak.
    pub demand_rate: DemandRate,

    /// Yearly decline of the demand credit as the battery degrades.
    #[builder(default = 0.02)]
    pub degradation_rate: f64,

    #[builder(default)]
    pub financial: FinancialParameters,
}

impl SavingsModel {
    pub fn first_year_savings(&self, peak_reduction: Kilowatts) -> Cost {
        peak_reduction * self.demand_rate * 12.0
    }

    pub fn evaluate(&self, initial_cost: Cost, peak_reduction: Kilowatts) -> FinancialAnalysis {
        self.evaluate_savings(initial_cost, self.first_year_savings(peak_reduction))
    }

    /// Evaluate the investment given the savings of the first year.
    pub fn evaluate_savings(&self, initial_cost: Cost, first_year: Cost) -> FinancialAnalysis {
        let yearly_savings = self.financial.project_savings(first_year, self.degradation_rate);
        FinancialAnalysis::evaluate(initial_cost, &yearly_savings, self.financial.discount_rate)
    }
}

/// Composite 0 to 100 score of a feasible configuration.
#[must_use]
pub fn viability_score(payback_years: f64, roi_percent: f64, npv: Cost, cost: Cost) -> f64 {
    let payback_points = if payback_years <= 5.0 {
        40.0
    } else if payback_years <= 10.0 {
        30.0
    } else if payback_years <= 15.0 {
        20.0
    } else {
        10.0
    };
    let roi_points = if roi_percent > 200.0 {
        30.0
    } else if roi_percent > 100.0 {
        20.0
    } else if roi_percent > 50.0 {
        10.0
    } else {
        0.0
    };
    let npv_points = if npv > cost {
        30.0
    } else if npv > Cost::ZERO {
        20.0
    } else {
        10.0
    };
    payback_points + roi_points + npv_points
}

/// Partial credit of an infeasible configuration for the reduction it still achieves.
#[must_use]
pub fn partial_score(peak_reduction: Kilowatts, target_reduction: Kilowatts) -> f64 {
    if target_reduction <= Kilowatts::ZERO {
        return 0.0;
    }
    (30.0 * (peak_reduction / target_reduction)).clamp(0.0, 30.0)
}

pub fn recommend(feasible: bool, payback_years: f64, npv: Cost) -> Recommendation {
    if feasible && payback_years <= 7.0 && npv > Cost::ZERO {
        Recommendation::Recommended
    } else if feasible && payback_years <= 12.0 {
        Recommendation::Marginal
    } else {
        Recommendation::NotRecommended
    }
}

/// Outcome of a single configuration in a single scenario.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct BatteryScenarioResult {
    pub configuration: BatteryConfiguration,
    pub feasible: bool,
    pub new_peak: Kilowatts,
    pub peak_reduction: Kilowatts,
    pub energy_discharged: KilowattHours,
    pub min_soc: f64,
    pub failure_reason: Option<String>,

    /// Financial figures, unavailable when the battery achieves no reduction.
    pub estimated_annual_savings: Option<Cost>,
    pub payback_years: Option<f64>,
    pub roi: Option<f64>,
    pub npv: Option<Cost>,

    pub viability_score: Option<f64>,
    pub recommendation: Recommendation,

    #[serde(skip)]
    pub financials: Option<FinancialAnalysis>,
}

impl BatteryScenarioResult {
    /// Dispatch the configuration against the scenario cap and score the outcome.
    pub fn evaluate(
        profile: &LoadProfile,
        scenario: &ScenarioSpec,
        configuration: BatteryConfiguration,
        savings_model: &SavingsModel,
    ) -> Self {
        let outcome = Simulator::builder()
            .profile(profile)
            .battery(&configuration.combined)
            .target_cap(scenario.target_cap)
            .simulate();
        Self::score(scenario, configuration, &outcome, savings_model)
    }

    fn score(
        scenario: &ScenarioSpec,
        configuration: BatteryConfiguration,
        outcome: &DispatchOutcome,
        savings_model: &SavingsModel,
    ) -> Self {
        let peak_reduction = outcome.peak_reduction();
        let financials = (peak_reduction > Kilowatts::ZERO)
            .then(|| savings_model.evaluate(configuration.total_cost, peak_reduction));

        let viability_score = match &financials {
            Some(financials) if outcome.feasible => Some(viability_score(
                financials.simple_payback,
                financials.roi,
                financials.net_present_value,
                configuration.total_cost,
            )),
            Some(_) => Some(partial_score(
                peak_reduction,
                scenario.original_peak - scenario.target_cap,
            )),
            None => None,
        };
        let recommendation =
            financials.as_ref().map_or(Recommendation::NotRecommended, |financials| {
                recommend(outcome.feasible, financials.simple_payback, financials.net_present_value)
            });

        Self {
            feasible: outcome.feasible,
            new_peak: outcome.new_peak,
            peak_reduction,
            energy_discharged: outcome.energy_discharged,
            min_soc: outcome.min_soc,
            failure_reason: outcome.failure_reason(),
            estimated_annual_savings: financials
                .as_ref()
                .and_then(|financials| financials.year_by_year.first())
                .map(|year| year.savings),
            payback_years: financials.as_ref().map(|financials| financials.simple_payback),
            roi: financials.as_ref().map(|financials| financials.roi),
            npv: financials.as_ref().map(|financials| financials.net_present_value),
            viability_score,
            recommendation,
            financials,
            configuration,
        }
    }

    fn score_or_zero(&self) -> f64 {
        self.viability_score.unwrap_or(0.0)
    }

    fn npv_or_zero(&self) -> Cost {
        self.npv.unwrap_or(Cost::ZERO)
    }

    /// Index of the best result.
    ///
    /// Feasible results compete on the score and then on the net present value.
    /// When nothing is feasible, the largest reduction wins, and then the lowest cost.
    /// Remaining ties go to the earlier result.
    #[must_use]
    pub fn pick_best(results: &[Self]) -> Option<usize> {
        let pick = |compare: fn(&Self, &Self) -> Ordering, feasible_only: bool| {
            results
                .iter()
                .enumerate()
                .filter(|(_, result)| !feasible_only || result.feasible)
                .reduce(|best, candidate| {
                    if compare(candidate.1, best.1) == Ordering::Greater { candidate } else { best }
                })
                .map(|(index, _)| index)
        };
        pick(Self::compare_feasible, true).or_else(|| pick(Self::compare_infeasible, false))
    }

    fn compare_feasible(lhs: &Self, rhs: &Self) -> Ordering {
        lhs.score_or_zero()
            .total_cmp(&rhs.score_or_zero())
            .then_with(|| lhs.npv_or_zero().0.total_cmp(&rhs.npv_or_zero().0))
    }

    fn compare_infeasible(lhs: &Self, rhs: &Self) -> Ordering {
        lhs.peak_reduction
            .0
            .total_cmp(&rhs.peak_reduction.0)
            .then_with(|| rhs.configuration.total_cost.0.total_cmp(&lhs.configuration.total_cost.0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::{
        baseline::{BaselineAnalysis, tests::daily_spikes},
        catalog::{Catalog, tests::model},
        configuration::SearchOptions,
        profile::tests::quarter_hourly,
        scenario::ScenarioTier,
        spike::{DetectedSpike, SpikeOptions},
    };

    fn savings_model() -> SavingsModel {
        SavingsModel::builder().demand_rate(DemandRate::from(15.0)).build()
    }

    fn evaluate_all() -> Vec<BatteryScenarioResult> {
        let profile = quarter_hourly(daily_spikes());
        let baseline = BaselineAnalysis::analyze(&profile);
        let spikes = DetectedSpike::detect(&profile, &baseline, SpikeOptions::default());
        // The light scenario leaves 40 kW of headroom to recharge:
        let scenario =
            ScenarioSpec::generate(&profile, &spikes, &baseline, ScenarioTier::Light.into())
                .into_iter()
                .next()
                .unwrap();
        let catalog = Catalog::from_rows(vec![model("Cabinet", 100.0, 50.0, 40_000.0)]);
        BatteryConfiguration::generate(
            &catalog,
            scenario.required_power,
            scenario.required_capacity,
            SearchOptions::default(),
        )
        .into_iter()
        .map(|configuration| {
            BatteryScenarioResult::evaluate(&profile, &scenario, configuration, &savings_model())
        })
        .collect()
    }

    #[test]
    fn test_bands() {
        let cost = Cost::from(100.0);
        assert_abs_diff_eq!(viability_score(4.0, 250.0, Cost::from(200.0), cost), 100.0);
        assert_abs_diff_eq!(viability_score(8.0, 150.0, Cost::from(50.0), cost), 70.0);
        assert_abs_diff_eq!(viability_score(12.0, 60.0, Cost::from(-1.0), cost), 40.0);
        assert_abs_diff_eq!(viability_score(20.0, 10.0, Cost::from(-1.0), cost), 20.0);
    }

    #[test]
    fn test_lower_payback_and_higher_npv_never_score_lower() {
        let cost = Cost::from(100_000.0);
        let paybacks = [1.0, 4.0, 5.0, 6.0, 9.0, 10.0, 11.0, 15.0, 16.0, 30.0];
        let npvs = [-50_000.0, 0.0, 10_000.0, 100_000.0, 200_000.0];
        for (better_payback, worse_payback) in
            paybacks.iter().flat_map(|lhs| paybacks.iter().map(move |rhs| (*lhs, *rhs)))
        {
            for (better_npv, worse_npv) in
                npvs.iter().flat_map(|lhs| npvs.iter().map(move |rhs| (*lhs, *rhs)))
            {
                if better_payback >= worse_payback || better_npv <= worse_npv {
                    continue;
                }
                let better = viability_score(better_payback, 80.0, Cost::from(better_npv), cost);
                let worse = viability_score(worse_payback, 80.0, Cost::from(worse_npv), cost);
                assert!(better >= worse);
            }
        }
    }

    #[test]
    fn test_partial_score() {
        assert_abs_diff_eq!(partial_score(Kilowatts::from(40.0), Kilowatts::from(80.0)), 15.0);
        assert_abs_diff_eq!(partial_score(Kilowatts::from(100.0), Kilowatts::from(80.0)), 30.0);
        assert_abs_diff_eq!(partial_score(Kilowatts::from(10.0), Kilowatts::ZERO), 0.0);
    }

    #[test]
    fn test_recommend() {
        assert_eq!(recommend(true, 5.0, Cost::from(1.0)), Recommendation::Recommended);
        assert_eq!(recommend(true, 5.0, Cost::from(-1.0)), Recommendation::Marginal);
        assert_eq!(recommend(true, 11.0, Cost::from(1.0)), Recommendation::Marginal);
        assert_eq!(recommend(true, 13.0, Cost::from(1.0)), Recommendation::NotRecommended);
        assert_eq!(recommend(false, 1.0, Cost::from(1.0)), Recommendation::NotRecommended);
    }

    #[test]
    fn test_first_year_savings() {
        let savings = savings_model().first_year_savings(Kilowatts::from(80.0));
        assert_abs_diff_eq!(savings.0, 80.0 * 15.0 * 12.0);
    }

    #[test]
    fn test_evaluate() {
        let results = evaluate_all();
        assert!(!results.is_empty());
        for result in &results {
            if result.feasible {
                assert!(result.failure_reason.is_none());
                assert!(result.new_peak <= Kilowatts::from(140.0) + Simulator::TOLERANCE);
                assert!(result.viability_score.is_some());
            } else {
                assert!(result.failure_reason.is_some());
                assert!(result.viability_score.is_none_or(|score| score <= 30.0));
                assert_ne!(result.recommendation, Recommendation::Recommended);
            }
        }
    }

    #[test]
    fn test_pick_best_prefers_feasible() {
        let results = evaluate_all();
        assert!(results.iter().any(|result| result.feasible));
        let best = BatteryScenarioResult::pick_best(&results).unwrap();
        assert!(results[best].feasible);
        for result in results.iter().filter(|result| result.feasible) {
            assert!(result.viability_score <= results[best].viability_score);
        }
    }

    #[test]
    fn test_pick_best_tie_breaks() {
        let template = evaluate_all().swap_remove(0);
        let result = |feasible: bool, score: f64, npv: f64, reduction: f64, cost: f64| {
            let mut result = template.clone();
            result.feasible = feasible;
            result.viability_score = Some(score);
            result.npv = Some(Cost::from(npv));
            result.peak_reduction = Kilowatts::from(reduction);
            result.configuration.total_cost = Cost::from(cost);
            result
        };

        let results = [
            result(true, 70.0, 10.0, 50.0, 100.0),
            result(true, 70.0, 20.0, 50.0, 100.0),
            result(true, 70.0, 20.0, 50.0, 100.0),
            result(false, 90.0, 90.0, 80.0, 10.0),
        ];
        assert_eq!(BatteryScenarioResult::pick_best(&results), Some(1));

        let results = [
            result(false, 10.0, 0.0, 30.0, 200.0),
            result(false, 10.0, 0.0, 40.0, 300.0),
            result(false, 10.0, 0.0, 40.0, 250.0),
        ];
        assert_eq!(BatteryScenarioResult::pick_best(&results), Some(2));
    }

    #[test]
    fn test_pick_best_empty() {
        assert_eq!(BatteryScenarioResult::pick_best(&[]), None);
    }
}
