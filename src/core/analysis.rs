use enumset::EnumSet;
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    core::{
        baseline::BaselineAnalysis,
        catalog::Catalog,
        configuration::{BatteryConfiguration, SearchOptions},
        profile::LoadProfile,
        scenario::{ScenarioSpec, ScenarioTier},
        scoring::{BatteryScenarioResult, Recommendation, SavingsModel},
        spike::{DetectedSpike, SpikeOptions},
    },
    prelude::*,
};

#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct AnalysisOptions {
    #[builder(default)]
    pub spikes: SpikeOptions,

    #[builder(default)]
    pub search: SearchOptions,

    pub savings: SavingsModel,

    #[builder(default = EnumSet::all())]
    pub tiers: EnumSet<ScenarioTier>,
}

/// Configuration results of a single scenario.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioAnalysis {
    /// Identifier of the analyzed [`ScenarioSpec`].
    pub scenario_id: usize,

    pub results: Vec<BatteryScenarioResult>,

    /// Index of the best result.
    pub best: Option<usize>,
}

impl ScenarioAnalysis {
    #[instrument(skip_all, fields(scenario_id = scenario.id, tier = %scenario.tier))]
    pub fn run(
        profile: &LoadProfile,
        catalog: &Catalog,
        scenario: &ScenarioSpec,
        options: &AnalysisOptions,
    ) -> Self {
        let configurations = BatteryConfiguration::generate(
            catalog,
            scenario.required_power,
            scenario.required_capacity,
            options.search,
        );
        let results: Vec<_> = configurations
            .into_par_iter()
            .map(|configuration| {
                BatteryScenarioResult::evaluate(profile, scenario, configuration, &options.savings)
            })
            .collect();
        let best = BatteryScenarioResult::pick_best(&results);
        info!(
            n_results = results.len(),
            n_feasible = results.iter().filter(|result| result.feasible).count(),
            ?best,
            "evaluated",
        );
        Self { scenario_id: scenario.id, results, best }
    }

    #[must_use]
    pub fn best_result(&self) -> Option<&BatteryScenarioResult> {
        self.best.map(|index| &self.results[index])
    }

    /// Scenarios without any configuration to try are not recommended.
    #[must_use]
    pub fn recommendation(&self) -> Recommendation {
        self.best_result().map_or(Recommendation::NotRecommended, |result| result.recommendation)
    }
}

/// Scenario identifiers grouped by the recommendation of their best configuration.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Recommendations {
    pub best_scenario: Option<usize>,
    pub viable_scenarios: Vec<usize>,
    pub marginal_scenarios: Vec<usize>,
    pub not_recommended: Vec<usize>,
    pub summary: Vec<String>,
}

/// Complete analysis of a load profile against a catalog.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct HolisticAnalysis {
    pub baseline: BaselineAnalysis,
    pub spikes: Vec<DetectedSpike>,
    pub scenarios: Vec<ScenarioSpec>,
    pub analyses: Vec<ScenarioAnalysis>,
    pub recommendations: Recommendations,
}

impl HolisticAnalysis {
    #[instrument(skip_all, fields(n_samples = profile.len(), n_models = catalog.len()))]
    pub fn run(profile: &LoadProfile, catalog: &Catalog, options: &AnalysisOptions) -> Self {
        let baseline = BaselineAnalysis::analyze(profile);
        let spikes = DetectedSpike::detect(profile, &baseline, options.spikes);
        let scenarios = ScenarioSpec::generate(profile, &spikes, &baseline, options.tiers);
        let analyses = scenarios
            .iter()
            .map(|scenario| ScenarioAnalysis::run(profile, catalog, scenario, options))
            .collect_vec();
        let recommendations = Self::recommend(&baseline, &scenarios, &analyses);
        Self { baseline, spikes, scenarios, analyses, recommendations }
    }

    /// Look up the analysis of the scenario.
    #[must_use]
    pub fn analysis_of(&self, scenario_id: usize) -> Option<&ScenarioAnalysis> {
        self.analyses.iter().find(|analysis| analysis.scenario_id == scenario_id)
    }

    #[must_use]
    pub fn scenario(&self, scenario_id: usize) -> Option<&ScenarioSpec> {
        self.scenarios.iter().find(|scenario| scenario.id == scenario_id)
    }

    fn recommend(
        baseline: &BaselineAnalysis,
        scenarios: &[ScenarioSpec],
        analyses: &[ScenarioAnalysis],
    ) -> Recommendations {
        let mut recommendations = Recommendations::default();
        for analysis in analyses {
            match analysis.recommendation() {
                Recommendation::Recommended => {
                    recommendations.viable_scenarios.push(analysis.scenario_id);
                }
                Recommendation::Marginal => {
                    recommendations.marginal_scenarios.push(analysis.scenario_id);
                }
                Recommendation::NotRecommended => {
                    recommendations.not_recommended.push(analysis.scenario_id);
                }
            }
        }

        // The first of equally scored scenarios wins:
        recommendations.best_scenario = analyses
            .iter()
            .filter(|analysis| analysis.recommendation() != Recommendation::NotRecommended)
            .filter_map(|analysis| {
                let score = analysis.best_result()?.viability_score.unwrap_or(0.0);
                Some((analysis.scenario_id, score))
            })
            .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
            .map(|(scenario_id, _)| scenario_id);

        recommendations.summary = Self::summarize(baseline, scenarios, analyses, &recommendations);
        info!(
            n_viable = recommendations.viable_scenarios.len(),
            n_marginal = recommendations.marginal_scenarios.len(),
            n_not_recommended = recommendations.not_recommended.len(),
            best_scenario = ?recommendations.best_scenario,
            "categorized",
        );
        recommendations
    }

    fn summarize(
        baseline: &BaselineAnalysis,
        scenarios: &[ScenarioSpec],
        analyses: &[ScenarioAnalysis],
        recommendations: &Recommendations,
    ) -> Vec<String> {
        if baseline.is_degenerate() {
            return vec!["No usable demand data: the baseline could not be established".to_string()];
        }
        if scenarios.is_empty() {
            return vec![format!(
                "No significant demand spikes above the typical {}: peak shaving is not needed",
                baseline.typical_operating,
            )];
        }

        let mut summary = vec![format!(
            "{} viable, {} marginal, {} not recommended out of {} scenario(s)",
            recommendations.viable_scenarios.len(),
            recommendations.marginal_scenarios.len(),
            recommendations.not_recommended.len(),
            scenarios.len(),
        )];
        let best = recommendations.best_scenario.and_then(|scenario_id| {
            let scenario = scenarios.iter().find(|scenario| scenario.id == scenario_id)?;
            let analysis = analyses.iter().find(|analysis| analysis.scenario_id == scenario_id)?;
            Some((scenario, analysis.best_result()?))
        });
        if let Some((scenario, result)) = best {
            summary.push(format!(
                "Best: {} with {}, capping demand at {} for {}",
                scenario.name,
                result.configuration.description,
                scenario.target_cap,
                result.configuration.total_cost,
            ));
            if let (Some(savings), Some(payback)) =
                (result.estimated_annual_savings, result.payback_years)
            {
                summary.push(format!(
                    "Saves about {savings} in the first year, paying back in {payback:.1} years",
                ));
            }
        } else if analyses.iter().all(|analysis| analysis.results.is_empty()) {
            summary.push("No catalog configuration matches the requirements".to_string());
        } else {
            summary.push("No configuration is financially viable".to_string());
        }
        summary
    }
}
