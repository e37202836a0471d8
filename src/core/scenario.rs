use std::fmt::{Display, Formatter};

use comfy_table::Color;
use enumset::EnumSet;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{
    core::{baseline::BaselineAnalysis, profile::LoadProfile, spike::DetectedSpike},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, time::Hours},
};

#[derive(Debug, Serialize, clap::ValueEnum, enumset::EnumSetType)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTier {
    /// Shave the entire excess of the worst spike.
    Aggressive,

    /// Shave three quarters of the worst excess.
    Moderate,

    /// Shave half of the worst excess.
    Light,
}

impl ScenarioTier {
    /// Generation order.
    const ORDER: [Self; 3] = [Self::Aggressive, Self::Light, Self::Moderate];

    /// Share of the worst spike excess to shave.
    pub const fn shave_ratio(self) -> f64 {
        match self {
            Self::Aggressive => 1.0,
            Self::Moderate => 0.75,
            Self::Light => 0.5,
        }
    }

    pub const fn color(self) -> Color {
        match self {
            Self::Aggressive => Color::Red,
            Self::Moderate => Color::DarkYellow,
            Self::Light => Color::Green,
        }
    }
}

impl Display for ScenarioTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggressive => write!(f, "Aggressive"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Light => write!(f, "Light"),
        }
    }
}

/// Demand-shaving target.
///
/// Immutable: the evaluation results live in [`crate::core::analysis::ScenarioAnalysis`].
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioSpec {
    /// Position in the generated sequence, used to join the scenario with its analysis.
    pub id: usize,

    pub tier: ScenarioTier,
    pub name: String,

    /// Demand cap to enforce.
    pub target_cap: Kilowatts,

    pub original_peak: Kilowatts,

    /// Demand to shave off the worst spike.
    pub excess_above_baseline: Kilowatts,

    /// Typical operating level.
    pub baseline: Kilowatts,

    pub required_power: Kilowatts,
    pub required_capacity: KilowattHours,
    pub reasoning: Vec<String>,
}

impl ScenarioSpec {
    /// Shaving less than this is not worth a battery.
    const MIN_SHAVE: Kilowatts = Kilowatts::new(10.0);

    const POWER_MARGIN: f64 = 1.10;
    const ENERGY_MARGIN: f64 = 1.2;

    /// Margin for same-day repeat events without a full recharge in between.
    const REPEAT_MARGIN: f64 = 1.1;

    /// Assumed event duration when there are no spikes to learn it from.
    const FALLBACK_EVENT_DURATION: Hours = Hours::new(2.0);

    /// Two targets closer than this are considered the same.
    const CAP_TOLERANCE: Kilowatts = Kilowatts::new(0.01);

    /// Generate up to three shaving scenarios.
    #[instrument(skip_all, fields(n_spikes = spikes.len()))]
    pub fn generate(
        profile: &LoadProfile,
        spikes: &[DetectedSpike],
        baseline: &BaselineAnalysis,
        tiers: EnumSet<ScenarioTier>,
    ) -> Vec<Self> {
        if baseline.is_degenerate() {
            warn!("degenerate baseline, no scenarios to generate");
            return Vec::new();
        }
        let original_peak = profile.peak();
        let typical = baseline.typical_operating;

        let Some(max_excess) =
            spikes.iter().map(|spike| spike.excess).max_by_key(|excess| OrderedFloat(excess.0))
        else {
            let excess = original_peak - typical;
            if excess <= Self::MIN_SHAVE || !tiers.contains(ScenarioTier::Aggressive) {
                info!(?excess, "no spikes and no significant excess");
                return Vec::new();
            }
            let required_capacity = excess * Self::FALLBACK_EVENT_DURATION;
            let scenario = Self {
                id: 0,
                tier: ScenarioTier::Aggressive,
                name: "Shave to baseline".to_string(),
                target_cap: typical,
                original_peak,
                excess_above_baseline: excess,
                baseline: typical,
                required_power: excess * Self::POWER_MARGIN,
                required_capacity,
                reasoning: vec![
                    format!(
                        "No qualifying spikes, but the peak of {original_peak} exceeds the typical {typical} by {excess}",
                    ),
                    format!(
                        "Assuming a {} event: {required_capacity}",
                        Self::FALLBACK_EVENT_DURATION,
                    ),
                ],
            };
            return vec![scenario];
        };

        let mut scenarios: Vec<Self> = Vec::new();
        for tier in ScenarioTier::ORDER {
            let shave = max_excess * tier.shave_ratio();
            if shave <= Self::MIN_SHAVE {
                debug!(%tier, ?shave, "skipped: insignificant shave");
                continue;
            }
            let target_cap = typical + max_excess - shave;
            if scenarios
                .iter()
                .any(|scenario| (scenario.target_cap - target_cap).abs() < Self::CAP_TOLERANCE)
            {
                debug!(%tier, ?target_cap, "skipped: duplicate target");
                continue;
            }
            if !tiers.contains(tier) {
                continue;
            }
            let (required_capacity, capacity_reasoning) =
                Self::required_capacity(spikes, target_cap, shave);
            let name = if tier == ScenarioTier::Aggressive {
                "Shave to baseline".to_string()
            } else {
                format!("Shave {:.0}% of the worst excess", 100.0 * tier.shave_ratio())
            };
            let mut reasoning = vec![format!(
                "Worst spike exceeds the typical {typical} by {max_excess}, shaving {shave} caps demand at {target_cap}"
            )];
            reasoning.extend(capacity_reasoning);
            scenarios.push(Self {
                id: scenarios.len(),
                tier,
                name,
                target_cap,
                original_peak,
                excess_above_baseline: shave,
                baseline: typical,
                required_power: shave * Self::POWER_MARGIN,
                required_capacity,
                reasoning,
            });
        }

        info!(n_scenarios = scenarios.len(), "generated");
        scenarios
    }

    /// Estimate the energy needed to hold the cap.
    ///
    /// Takes the worst spike above the cap, pads its excess energy, and scales it up
    /// when several such spikes hit on the same calendar day.
    fn required_capacity(
        spikes: &[DetectedSpike],
        target_cap: Kilowatts,
        shave: Kilowatts,
    ) -> (KilowattHours, Vec<String>) {
        let qualifying = spikes.iter().filter(|spike| spike.peak > target_cap).collect_vec();
        let Some(worst) =
            qualifying.iter().max_by_key(|spike| OrderedFloat((spike.excess * spike.duration).0))
        else {
            let energy = shave * Self::FALLBACK_EVENT_DURATION;
            return (energy, vec![format!("No spike exceeds the cap, assuming {energy}")]);
        };
        let event_energy = worst.excess * worst.duration * Self::ENERGY_MARGIN;
        let spikes_per_day = qualifying
            .iter()
            .into_group_map_by(|spike| spike.start.date())
            .into_values()
            .map(|spikes| spikes.len())
            .max()
            .unwrap_or(1);
        #[expect(clippy::cast_precision_loss)]
        let multiplier = (spikes_per_day.saturating_sub(1).max(1) as f64) * Self::REPEAT_MARGIN;
        let energy = event_energy * multiplier;
        let reasoning = vec![
            format!(
                "Worst event: {} above typical for {}, {event_energy} with margin",
                worst.excess, worst.duration,
            ),
            format!(
                "Up to {spikes_per_day} qualifying spike(s) per day, ×{multiplier:.2}: {energy}",
            ),
        ];
        (energy, reasoning)
    }
}
