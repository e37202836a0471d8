use std::collections::BTreeMap;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{core::profile::LoadProfile, prelude::*, quantity::power::Kilowatts};

/// Statistical baseline of a load profile.
///
/// The analysis is a function of the demand multiset only: permuting the samples
/// never changes any of the fields.
#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BaselineAnalysis {
    /// Level at which the site spends most of its time.
    pub typical_operating: Kilowatts,

    /// Detection threshold: typical level plus a small margin.
    pub baseline: Kilowatts,

    pub mean: Kilowatts,
    pub median: Kilowatts,

    /// Population standard deviation.
    pub std_dev: Kilowatts,

    /// Fraction of samples within one histogram bin of the typical level.
    pub baseline_percentage: f64,

    pub reasoning: Vec<String>,
}

impl BaselineAnalysis {
    /// Histogram bin width.
    pub const BIN_WIDTH: Kilowatts = Kilowatts::new(5.0);

    /// The histogram mode only counts as typical when its bin holds more than this share.
    const MIN_MODE_SHARE: f64 = 0.10;

    const MARGIN_RATIO: f64 = 0.10;
    const MAX_MARGIN: Kilowatts = Kilowatts::new(10.0);

    fn empty(reason: impl Into<String>) -> Self {
        Self {
            typical_operating: Kilowatts::ZERO,
            baseline: Kilowatts::ZERO,
            mean: Kilowatts::ZERO,
            median: Kilowatts::ZERO,
            std_dev: Kilowatts::ZERO,
            baseline_percentage: 0.0,
            reasoning: vec![reason.into()],
        }
    }

    /// Detection threshold margin above the typical level.
    pub fn margin(typical_operating: Kilowatts) -> Kilowatts {
        (typical_operating * Self::MARGIN_RATIO).min(Self::MAX_MARGIN)
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.baseline <= Kilowatts::ZERO
    }

    #[allow(clippy::cast_precision_loss)]
    #[instrument(skip_all, fields(n_samples = profile.len()))]
    pub fn analyze(profile: &LoadProfile) -> Self {
        // Sorting first makes every sum below independent of the input order:
        let values = profile
            .intervals()
            .iter()
            .map(|interval| interval.demand.0)
            .filter(|demand| demand.is_finite() && *demand >= 0.0)
            .sorted_unstable_by_key(|demand| OrderedFloat(*demand))
            .collect_vec();
        if values.is_empty() {
            warn!("no valid demand samples");
            return Self::empty("No valid demand samples: the baseline cannot be established");
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let median = median_of_sorted(&values);
        let std_dev = (values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n).sqrt();

        let histogram = histogram(&values, Self::BIN_WIDTH.0);
        let mut reasoning = Vec::new();
        let typical_operating = match mode(&histogram) {
            Some((bin, count)) if count as f64 > Self::MIN_MODE_SHARE * n => {
                let level = bin_center(bin, Self::BIN_WIDTH.0);
                reasoning.push(format!(
                    "Most common operating level is {level:.0} kW ({:.1}% of samples)",
                    100.0 * count as f64 / n,
                ));
                level
            }
            _ => {
                reasoning.push(format!(
                    "No dominant operating level, falling back to the median of {median:.1} kW"
                ));
                median
            }
        };
        let typical_operating = Kilowatts::from(typical_operating);
        let baseline = typical_operating + Self::margin(typical_operating);
        reasoning.push(format!(
            "Spike detection threshold is {baseline} ({typical_operating} plus {})",
            Self::margin(typical_operating),
        ));

        let n_near_typical = values
            .iter()
            .filter(|value| (*value - typical_operating.0).abs() <= Self::BIN_WIDTH.0)
            .count();
        let baseline_percentage = n_near_typical as f64 / n;
        reasoning.push(format!(
            "{:.1}% of samples lie within {} of the typical level",
            100.0 * baseline_percentage,
            Self::BIN_WIDTH,
        ));

        let analysis = Self {
            typical_operating,
            baseline,
            mean: Kilowatts::from(mean),
            median: Kilowatts::from(median),
            std_dev: Kilowatts::from(std_dev),
            baseline_percentage,
            reasoning,
        };
        info!(?analysis.typical_operating, ?analysis.baseline, ?analysis.std_dev, "analyzed");
        analysis
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let middle = values.len() / 2;
    if values.len() % 2 == 1 {
        values[middle]
    } else {
        (values[middle - 1] + values[middle]) / 2.0
    }
}

/// Count samples per bin, rounding each sample to the nearest bin center.
#[expect(clippy::cast_possible_truncation)]
fn histogram(values: &[f64], bin_width: f64) -> BTreeMap<i64, usize> {
    values.iter().map(|value| (value / bin_width).round() as i64).counts().into_iter().collect()
}

/// Fullest bin; ties go to the lowest bin so that the result is deterministic.
fn mode(histogram: &BTreeMap<i64, usize>) -> Option<(i64, usize)> {
    histogram
        .iter()
        .map(|(bin, count)| (*bin, *count))
        .max_by(|(lhs_bin, lhs_count), (rhs_bin, rhs_count)| {
            lhs_count.cmp(rhs_count).then_with(|| rhs_bin.cmp(lhs_bin))
        })
}

#[expect(clippy::cast_precision_loss)]
fn bin_center(bin: i64, bin_width: f64) -> f64 {
    bin as f64 * bin_width
}

#[cfg(test)]
pub mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::profile::tests::quarter_hourly;

    /// 30 days at 100 kW with a daily 3-hour excursion to 180 kW.
    pub fn daily_spikes() -> Vec<f64> {
        (0..30)
            .flat_map(|_| {
                (0..96).map(|quarter| if (56..68).contains(&quarter) { 180.0 } else { 100.0 })
            })
            .collect()
    }

    #[test]
    fn test_typical_level_from_mode() {
        let analysis = BaselineAnalysis::analyze(&quarter_hourly(daily_spikes()));
        assert_abs_diff_eq!(analysis.typical_operating.0, 100.0);
        assert_abs_diff_eq!(analysis.baseline.0, 110.0);
        assert_abs_diff_eq!(analysis.median.0, 100.0);
        assert_abs_diff_eq!(analysis.mean.0, 110.0);
        assert_abs_diff_eq!(analysis.baseline_percentage, 0.875);
        assert!(analysis.std_dev.0 > 0.0);
    }

    #[test]
    fn test_falls_back_to_median_without_dominant_mode() {
        // Every sample lands in its own bin, so no bin exceeds 10%:
        let demands = (0..20).map(|index| f64::from(index) * 10.0);
        let analysis = BaselineAnalysis::analyze(&quarter_hourly(demands));
        assert_abs_diff_eq!(analysis.typical_operating.0, 95.0);
        assert_abs_diff_eq!(analysis.baseline.0, 104.5);
    }

    #[test]
    fn test_small_typical_level_margin() {
        let analysis = BaselineAnalysis::analyze(&quarter_hourly([20.0; 10]));
        assert_abs_diff_eq!(analysis.baseline.0, 22.0);
    }

    #[test]
    fn test_empty_profile() {
        let analysis = BaselineAnalysis::analyze(&LoadProfile::default());
        assert!(analysis.is_degenerate());
        assert_eq!(analysis.reasoning.len(), 1);
    }

    #[test]
    fn test_invalid_samples_are_ignored() {
        let analysis = BaselineAnalysis::analyze(&quarter_hourly([f64::NAN, -5.0, 50.0, 50.0]));
        assert_abs_diff_eq!(analysis.typical_operating.0, 50.0);
    }

    #[test]
    fn test_permutation_stable() {
        let demands = daily_spikes();
        let forward = BaselineAnalysis::analyze(&quarter_hourly(demands.iter().copied()));
        // Same timestamps, reversed values: a different order of the very same multiset.
        let backward = BaselineAnalysis::analyze(&quarter_hourly(demands.into_iter().rev()));
        assert_eq!(forward, backward);
    }
}
