use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{
    core::{
        baseline::BaselineAnalysis,
        profile::{LoadProfile, Step},
    },
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, time::Hours},
};

/// Spike qualification thresholds.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct SpikeOptions {
    /// Shorter excursions are discarded.
    #[builder(default = Hours::QUARTER)]
    pub min_duration: Hours,

    /// Minimal absolute rise above the baseline.
    #[builder(default = Kilowatts::new(15.0))]
    pub min_absolute: Kilowatts,

    /// Minimal relative rise above the baseline.
    #[builder(default = 0.20)]
    pub min_magnitude_ratio: f64,
}

impl Default for SpikeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SpikeOptions {
    /// Demand level that a sample must strictly exceed to be part of a spike.
    pub fn threshold(&self, baseline: Kilowatts) -> Kilowatts {
        (baseline + self.min_absolute).max(baseline * (1.0 + self.min_magnitude_ratio))
    }
}

/// Contiguous demand excursion above the spike threshold.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct DetectedSpike {
    pub start: NaiveDateTime,

    /// Exclusive: the end of the last sample in the spike.
    pub end: NaiveDateTime,

    pub peak: Kilowatts,
    pub average: Kilowatts,
    pub duration: Hours,

    /// Energy above the typical operating level.
    pub excess_energy: KilowattHours,

    /// Typical operating level the excess is measured against.
    pub baseline: Kilowatts,

    /// Peak rise in baseline standard deviations.
    ///
    /// Infinite or `NaN` for a perfectly flat baseline.
    pub severity: f64,

    /// Peak rise above the typical operating level.
    pub excess: Kilowatts,
}

impl DetectedSpike {
    #[instrument(skip_all, fields(n_samples = profile.len()))]
    pub fn detect(
        profile: &LoadProfile,
        baseline: &BaselineAnalysis,
        options: SpikeOptions,
    ) -> Vec<Self> {
        if baseline.is_degenerate() {
            return Vec::new();
        }
        let threshold = options.threshold(baseline.baseline);
        debug!(?threshold, "scanning…");

        let mut spikes = Vec::new();
        let mut window: Option<Window> = None;

        for step in profile.steps() {
            if step.follows_gap
                && let Some(closed) = window.take()
            {
                spikes.extend(closed.finish(baseline, options));
            }
            if step.interval.demand > threshold {
                match &mut window {
                    Some(window) => window.push(step, baseline.typical_operating),
                    None => window = Some(Window::open(step, baseline.typical_operating)),
                }
            } else if let Some(closed) = window.take() {
                spikes.extend(closed.finish(baseline, options));
            }
        }
        if let Some(closed) = window {
            spikes.extend(closed.finish(baseline, options));
        }

        // Stable sort keeps the chronological order among equal peaks:
        spikes.sort_by_key(|spike: &Self| std::cmp::Reverse(OrderedFloat(spike.peak.0)));
        info!(n_spikes = spikes.len(), ?threshold, "detected");
        spikes
    }
}

/// Open spike being accumulated.
struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
    peak: Kilowatts,
    total: Kilowatts,
    n_samples: u32,
    duration: Hours,
    excess_energy: KilowattHours,
}

impl Window {
    fn open(step: Step, typical_operating: Kilowatts) -> Self {
        let mut window = Self {
            start: step.interval.timestamp,
            end: step.interval.timestamp,
            peak: step.interval.demand,
            total: Kilowatts::ZERO,
            n_samples: 0,
            duration: Hours::ZERO,
            excess_energy: KilowattHours::ZERO,
        };
        window.push(step, typical_operating);
        window
    }

    fn push(&mut self, step: Step, typical_operating: Kilowatts) {
        let demand = step.interval.demand;
        self.peak = self.peak.max(demand);
        self.total += demand;
        self.n_samples += 1;
        self.duration += step.duration;
        self.excess_energy += (demand - typical_operating).max(Kilowatts::ZERO) * step.duration;
        self.end = step.interval.timestamp + step.span;
    }

    fn finish(self, baseline: &BaselineAnalysis, options: SpikeOptions) -> Option<DetectedSpike> {
        if self.duration < options.min_duration {
            trace!(?self.start, ?self.duration, "discarded a short excursion");
            return None;
        }
        Some(DetectedSpike {
            start: self.start,
            end: self.end,
            peak: self.peak,
            average: self.total / f64::from(self.n_samples),
            duration: self.duration,
            excess_energy: self.excess_energy,
            baseline: baseline.typical_operating,
            severity: (self.peak - baseline.typical_operating) / baseline.std_dev,
            excess: self.peak - baseline.typical_operating,
        })
    }
}
