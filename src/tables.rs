use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        analysis::HolisticAnalysis,
        baseline::BaselineAnalysis,
        catalog::Catalog,
        dispatch::DispatchOutcome,
        finance::FinancialAnalysis,
        profile::LoadProfile,
        scoring::BatteryScenarioResult,
        spike::DetectedSpike,
    },
    quantity::cost::Cost,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn optional<T>(value: Option<T>, format: impl FnOnce(T) -> String) -> Cell {
    let cell = match value {
        Some(value) => Cell::new(format(value)),
        None => Cell::new("-").add_attribute(Attribute::Dim),
    };
    cell.set_alignment(CellAlignment::Right)
}

fn feasibility_color(feasible: bool) -> Color {
    if feasible { Color::Green } else { Color::Red }
}

fn npv_color(npv: Cost) -> Color {
    if npv.0 > 0.0 { Color::Green } else { Color::Red }
}

#[must_use]
pub fn build_baseline_table(baseline: &BaselineAnalysis) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Typical", "Threshold", "Mean", "Median", "Std. dev.", "At typical"]);
    table.add_row(vec![
        Cell::new(baseline.typical_operating).fg(Color::Green),
        Cell::new(baseline.baseline),
        Cell::new(baseline.mean),
        Cell::new(baseline.median),
        Cell::new(baseline.std_dev).add_attribute(Attribute::Dim),
        Cell::new(format!("{:.1}%", 100.0 * baseline.baseline_percentage)),
    ]);
    table
}

/// Catalog models, with the retired ones dimmed.
#[must_use]
pub fn build_catalog_table(catalog: &Catalog) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Manufacturer",
        "Model",
        "Capacity",
        "Power",
        "Efficiency",
        "Warranty",
        "Unit price",
    ]);
    for model in catalog.models() {
        let row = vec![
            Cell::new(&model.manufacturer),
            Cell::new(&model.model_name),
            Cell::new(model.capacity).set_alignment(CellAlignment::Right),
            Cell::new(model.power).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}%", 100.0 * model.efficiency))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} y", model.warranty_years)).set_alignment(CellAlignment::Right),
            Cell::new(model.prices.unit_price(1)).set_alignment(CellAlignment::Right),
        ];
        if model.active {
            table.add_row(row);
        } else {
            table.add_row(row.into_iter().map(|cell| cell.add_attribute(Attribute::Dim)));
        }
    }
    table
}

#[must_use]
pub fn build_spikes_table(spikes: &[DetectedSpike]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Start",
        "End",
        "Duration",
        "Peak",
        "Average",
        "Excess",
        "Excess energy",
        "Severity",
    ]);
    for spike in spikes {
        table.add_row(vec![
            Cell::new(spike.start.format("%Y-%m-%d %H:%M")),
            Cell::new(spike.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(spike.duration).set_alignment(CellAlignment::Right),
            Cell::new(spike.peak).set_alignment(CellAlignment::Right).fg(Color::Red),
            Cell::new(spike.average).set_alignment(CellAlignment::Right),
            Cell::new(spike.excess).set_alignment(CellAlignment::Right),
            Cell::new(spike.excess_energy).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}σ", spike.severity)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Scenarios along with the best configuration of each.
#[must_use]
pub fn build_scenarios_table(analysis: &HolisticAnalysis) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "#",
        "Tier",
        "Cap",
        "Shave",
        "Power",
        "Capacity",
        "Best configuration",
        "Cost",
        "Score",
        "Verdict",
    ]);
    for scenario in &analysis.scenarios {
        let scenario_analysis = analysis.analysis_of(scenario.id);
        let best = scenario_analysis.and_then(|analysis| analysis.best_result());
        let recommendation = scenario_analysis.map(|analysis| analysis.recommendation());
        let id = Cell::new(scenario.id);
        let id = if analysis.recommendations.best_scenario == Some(scenario.id) {
            id.add_attribute(Attribute::Bold).fg(Color::Green)
        } else {
            id
        };
        table.add_row(vec![
            id,
            Cell::new(scenario.tier).fg(scenario.tier.color()),
            Cell::new(scenario.target_cap).set_alignment(CellAlignment::Right),
            Cell::new(scenario.excess_above_baseline).set_alignment(CellAlignment::Right),
            Cell::new(scenario.required_power).set_alignment(CellAlignment::Right),
            Cell::new(scenario.required_capacity).set_alignment(CellAlignment::Right),
            best.map_or_else(
                || Cell::new("none").add_attribute(Attribute::Dim),
                |result| {
                    Cell::new(&result.configuration.description)
                        .fg(feasibility_color(result.feasible))
                },
            ),
            optional(best.map(|result| result.configuration.total_cost), |cost| cost.to_string()),
            optional(best.and_then(|result| result.viability_score), |score| format!("{score:.0}")),
            recommendation.map_or_else(
                || Cell::new("-"),
                |recommendation| Cell::new(recommendation).fg(recommendation.color()),
            ),
        ]);
    }
    table
}

/// Configurations evaluated in a single scenario.
#[must_use]
pub fn build_results_table(results: &[BatteryScenarioResult], best: Option<usize>) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Configuration",
        "Cost",
        "Power",
        "Capacity",
        "New peak",
        "Reduction",
        "Min SoC",
        "Savings/year",
        "Payback",
        "NPV",
        "Score",
        "Verdict",
    ]);
    for (index, result) in results.iter().enumerate() {
        let configuration = Cell::new(&result.configuration.description);
        let configuration = if Some(index) == best {
            configuration.add_attribute(Attribute::Bold)
        } else {
            configuration
        };
        table.add_row(vec![
            configuration.fg(feasibility_color(result.feasible)),
            Cell::new(result.configuration.total_cost).set_alignment(CellAlignment::Right),
            Cell::new(result.configuration.total_power).set_alignment(CellAlignment::Right),
            Cell::new(result.configuration.total_capacity).set_alignment(CellAlignment::Right),
            Cell::new(result.new_peak).set_alignment(CellAlignment::Right),
            Cell::new(result.peak_reduction).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}%", 100.0 * result.min_soc))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            optional(result.estimated_annual_savings, |savings| savings.to_string()),
            optional(result.payback_years, |payback| format!("{payback:.1} y")),
            optional(result.npv, |npv| npv.to_string())
                .fg(result.npv.map_or(Color::Reset, npv_color)),
            optional(result.viability_score, |score| format!("{score:.0}")),
            Cell::new(result.recommendation).fg(result.recommendation.color()),
        ]);
    }
    table
}

#[must_use]
pub fn build_financials_table(financials: &FinancialAnalysis) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Year", "Savings", "Cumulative", "Present value", "Cumulative NPV"]);
    for year in &financials.year_by_year {
        table.add_row(vec![
            Cell::new(year.year),
            Cell::new(year.savings).set_alignment(CellAlignment::Right),
            Cell::new(year.cumulative_savings).set_alignment(CellAlignment::Right),
            Cell::new(year.present_value)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(year.cumulative_npv)
                .set_alignment(CellAlignment::Right)
                .fg(npv_color(year.cumulative_npv)),
        ]);
    }
    table
}

#[must_use]
pub fn build_dispatch_table(outcome: &DispatchOutcome) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Original peak", "New peak", "Reduction", "Discharged", "Min SoC"]);
    table.add_row(vec![
        Cell::new(outcome.original_peak).set_alignment(CellAlignment::Right),
        Cell::new(outcome.new_peak)
            .set_alignment(CellAlignment::Right)
            .fg(feasibility_color(outcome.feasible)),
        Cell::new(outcome.peak_reduction()).set_alignment(CellAlignment::Right),
        Cell::new(outcome.energy_discharged).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.0}%", 100.0 * outcome.min_soc)).set_alignment(CellAlignment::Right),
    ]);
    table
}

/// Per-interval served load and state of charge.
#[must_use]
pub fn build_trace_table(profile: &LoadProfile, outcome: &DispatchOutcome) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Timestamp", "Demand", "Served", "SoC"]);
    let trace = profile.intervals().iter().zip(&outcome.served_load).zip(&outcome.soc_history);
    for ((interval, served), soc) in trace {
        let served_cell = Cell::new(served).set_alignment(CellAlignment::Right);
        let served_cell = if *served < interval.demand {
            served_cell.fg(Color::Green)
        } else {
            served_cell
        };
        table.add_row(vec![
            Cell::new(interval.timestamp.format("%Y-%m-%d %H:%M")),
            Cell::new(interval.demand).set_alignment(CellAlignment::Right),
            served_cell,
            Cell::new(format!("{:.1}%", 100.0 * soc))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            baseline::tests::daily_spikes,
            catalog::tests::model,
            configuration::CombinedBattery,
            dispatch::Simulator,
            profile::tests::quarter_hourly,
        },
        quantity::{energy::KilowattHours, power::Kilowatts},
    };

    #[test]
    fn test_catalog_table() {
        let mut retired = model("Retired", 100.0, 50.0, 1000.0);
        retired.active = false;
        let catalog = Catalog::from_rows(vec![model("Current", 215.0, 100.0, 90000.0), retired]);
        let table = build_catalog_table(&catalog);
        assert_eq!(table.row_count(), 2);
        assert!(table.to_string().contains("Retired"));
    }

    #[test]
    fn test_trace_table() {
        let profile = quarter_hourly(daily_spikes().into_iter().take(96));
        let battery = CombinedBattery::builder()
            .capacity(KilowattHours::from(500.0))
            .max_power(Kilowatts::from(100.0))
            .build();
        let outcome = Simulator::builder()
            .profile(&profile)
            .battery(&battery)
            .target_cap(Kilowatts::from(110.0))
            .simulate();
        assert_eq!(build_trace_table(&profile, &outcome).row_count(), 96);
    }
}
