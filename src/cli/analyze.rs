use std::path::PathBuf;

use clap::Parser;
use enumset::EnumSet;

use crate::{
    cli::{catalog::CatalogArgs, economics::SavingsArgs},
    core::{
        analysis::{AnalysisOptions, HolisticAnalysis},
        configuration::SearchOptions,
        scenario::ScenarioTier,
        spike::SpikeOptions,
    },
    ingest::read_profile_file,
    prelude::*,
    quantity::{power::Kilowatts, time::Hours},
    tables::{
        build_baseline_table,
        build_catalog_table,
        build_financials_table,
        build_results_table,
        build_scenarios_table,
        build_spikes_table,
    },
};

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Load profile CSV with the `timestamp` and `kw` columns.
    #[clap(long = "profile", env = "PROFILE_PATH")]
    pub profile: PathBuf,

    /// Analysis horizon in years.
    #[clap(long = "analysis-period", env = "ANALYSIS_PERIOD", default_value = "15")]
    pub analysis_period: u32,

    /// Scenario tiers to generate.
    #[clap(
        long = "tiers",
        env = "SCENARIO_TIERS",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "aggressive,moderate,light",
    )]
    pub tiers: Vec<ScenarioTier>,

    /// Print the complete analysis as JSON instead of the tables.
    #[clap(long)]
    pub json: bool,

    /// Number of the largest spikes to print.
    #[clap(long = "n-spikes", default_value = "10")]
    pub n_spikes: usize,

    /// Print the catalog before the analysis.
    #[clap(long = "show-catalog")]
    pub show_catalog: bool,

    #[clap(flatten)]
    pub catalog: CatalogArgs,

    #[clap(flatten)]
    pub savings: SavingsArgs,

    #[clap(flatten)]
    pub detection: DetectionArgs,

    #[clap(flatten)]
    pub search: SearchArgs,
}

impl AnalyzeArgs {
    #[must_use]
    pub fn tiers(&self) -> EnumSet<ScenarioTier> {
        self.tiers.iter().copied().collect()
    }

    #[instrument(skip_all, fields(profile = %self.profile.display()))]
    pub async fn run(&self) -> Result {
        let options = AnalysisOptions::builder()
            .spikes(self.detection.options())
            .search(self.search.options())
            .savings(self.savings.try_model(self.analysis_period)?)
            .tiers(self.tiers())
            .build();
        let profile = read_profile_file(&self.profile)?;
        let catalog = self.catalog.provider()?.fetch().await?;
        info!(n_models = catalog.len(), n_active = catalog.active().count(), "fetched catalog");
        if self.show_catalog && !self.json {
            println!("{}", build_catalog_table(&catalog));
        }

        let analysis = HolisticAnalysis::run(&profile, &catalog, &options);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            print_analysis(&analysis, self.n_spikes);
        }
        Ok(())
    }
}

fn print_analysis(analysis: &HolisticAnalysis, n_spikes: usize) {
    println!("{}", build_baseline_table(&analysis.baseline));
    for reason in &analysis.baseline.reasoning {
        info!("{reason}");
    }
    if !analysis.spikes.is_empty() {
        let n_spikes = n_spikes.min(analysis.spikes.len());
        info!(n_spikes = analysis.spikes.len(), n_shown = n_spikes, "detected spikes");
        println!("{}", build_spikes_table(&analysis.spikes[..n_spikes]));
    }
    if !analysis.scenarios.is_empty() {
        for scenario_analysis in &analysis.analyses {
            if let Some(scenario) = analysis.scenario(scenario_analysis.scenario_id) {
                info!(id = scenario.id, name = %scenario.name, "scenario");
                for reason in &scenario.reasoning {
                    info!("{reason}");
                }
            }
            println!("{}", build_results_table(&scenario_analysis.results, scenario_analysis.best));
        }
        println!("{}", build_scenarios_table(analysis));
    }
    let best_financials = analysis
        .recommendations
        .best_scenario
        .and_then(|scenario_id| analysis.analysis_of(scenario_id))
        .and_then(|scenario_analysis| scenario_analysis.best_result())
        .and_then(|result| result.financials.as_ref());
    if let Some(financials) = best_financials {
        println!("{}", build_financials_table(financials));
    }
    for line in &analysis.recommendations.summary {
        info!("{line}");
    }
}

/// Spike qualification thresholds.
#[derive(Copy, Clone, Parser)]
pub struct DetectionArgs {
    /// Shorter excursions are not spikes.
    #[clap(long = "min-spike-hours", env = "MIN_SPIKE_HOURS", default_value = "0.25")]
    pub min_duration: Hours,

    /// Minimal rise above the baseline in kilowatts.
    #[clap(long = "min-spike-kw", env = "MIN_SPIKE_KW", default_value = "15")]
    pub min_absolute: Kilowatts,

    /// Minimal rise above the baseline relative to it.
    #[clap(long = "min-spike-ratio", env = "MIN_SPIKE_RATIO", default_value = "0.2")]
    pub min_magnitude_ratio: f64,
}

impl DetectionArgs {
    pub fn options(&self) -> SpikeOptions {
        SpikeOptions::builder()
            .min_duration(self.min_duration)
            .min_absolute(self.min_absolute)
            .min_magnitude_ratio(self.min_magnitude_ratio)
            .build()
    }
}

/// Bounds of the configuration search.
#[derive(Copy, Clone, Parser)]
pub struct SearchArgs {
    #[clap(long = "max-units", env = "MAX_UNITS", default_value = "10")]
    pub max_units: u32,

    /// Quantities beyond the single-model minimum to try.
    #[clap(long = "extra-units", env = "EXTRA_UNITS", default_value = "5")]
    pub extra_units: u32,

    /// Number of leading catalog models paired up in two-model combinations.
    #[clap(long = "combination-breadth", env = "COMBINATION_BREADTH", default_value = "5")]
    pub combination_breadth: usize,
}

impl SearchArgs {
    pub fn options(&self) -> SearchOptions {
        SearchOptions::builder()
            .max_units(self.max_units)
            .extra_units(self.extra_units)
            .combination_breadth(self.combination_breadth)
            .build()
    }
}
