use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::quantity::{power::Kilowatts, time::Hours};

/// Single demand sample.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadInterval {
    pub timestamp: NaiveDateTime,
    pub demand: Kilowatts,
}

impl LoadInterval {
    pub const fn new(timestamp: NaiveDateTime, demand: Kilowatts) -> Self {
        Self { timestamp, demand }
    }
}

/// Ordered demand time series.
///
/// Samples are kept in ascending timestamp order. The nominal cadence is commonly 15 minutes,
/// but the spacing is not enforced: each sample carries its own duration instead.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct LoadProfile {
    intervals: Vec<LoadInterval>,

    #[serde(skip)]
    cadence: TimeDelta,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self { intervals: Vec::new(), cadence: Self::DEFAULT_CADENCE }
    }
}

impl FromIterator<LoadInterval> for LoadProfile {
    /// Sort the samples and merge those sharing a timestamp, keeping the highest demand.
    fn from_iter<T: IntoIterator<Item = LoadInterval>>(iter: T) -> Self {
        let intervals = iter
            .into_iter()
            .sorted_by_key(|interval| interval.timestamp)
            .coalesce(|lhs, rhs| {
                if lhs.timestamp == rhs.timestamp {
                    Ok(if rhs.demand > lhs.demand { rhs } else { lhs })
                } else {
                    Err((lhs, rhs))
                }
            })
            .collect_vec();
        let cadence = Self::estimate_cadence(&intervals);
        Self { intervals, cadence }
    }
}

impl LoadProfile {
    pub const DEFAULT_CADENCE: TimeDelta = TimeDelta::minutes(15);

    /// A step longer than 1.5 nominal cadences is treated as missing data.
    const GAP_FACTOR: i32 = 3;

    #[must_use]
    pub const fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    #[must_use]
    pub fn intervals(&self) -> &[LoadInterval] {
        &self.intervals
    }

    /// Nominal sampling cadence: the median step between consecutive samples.
    #[must_use]
    pub const fn cadence(&self) -> TimeDelta {
        self.cadence
    }

    pub fn peak(&self) -> Kilowatts {
        self.intervals.iter().map(|interval| interval.demand).fold(Kilowatts::ZERO, Kilowatts::max)
    }

    /// Iterate over the samples together with their own durations
    /// and whether a data gap precedes the sample.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        let gap_threshold = self.cadence * Self::GAP_FACTOR / 2;
        self.intervals.iter().enumerate().map(move |(index, interval)| {
            let follows_gap = index
                .checked_sub(1)
                .is_some_and(|previous| {
                    interval.timestamp - self.intervals[previous].timestamp > gap_threshold
                });
            let duration = self.intervals.get(index + 1).map_or(self.cadence, |next| {
                (next.timestamp - interval.timestamp).min(self.cadence)
            });
            Step {
                interval: *interval,
                span: duration,
                duration: Hours::from(duration),
                follows_gap,
            }
        })
    }

    fn estimate_cadence(intervals: &[LoadInterval]) -> TimeDelta {
        let mut deltas = intervals
            .iter()
            .tuple_windows()
            .map(|(lhs, rhs)| rhs.timestamp - lhs.timestamp)
            .filter(|delta| *delta > TimeDelta::zero())
            .collect_vec();
        if deltas.is_empty() {
            return Self::DEFAULT_CADENCE;
        }
        let middle = deltas.len() / 2;
        *deltas.select_nth_unstable(middle).1
    }
}

/// Sample annotated with its effective duration.
#[derive(Copy, Clone, Debug)]
pub struct Step {
    pub interval: LoadInterval,

    /// Effective duration of the sample.
    pub span: TimeDelta,

    /// Same as [`Step::span`], in hours.
    pub duration: Hours,

    /// There is missing data between the previous sample and this one.
    pub follows_gap: bool,
}

#[cfg(test)]
pub mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;

    pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    /// Build a quarter-hourly profile starting at midnight of July 1st.
    pub fn quarter_hourly(demands: impl IntoIterator<Item = f64>) -> LoadProfile {
        let start = at(1, 0, 0);
        demands
            .into_iter()
            .enumerate()
            .map(|(index, demand)| {
                LoadInterval::new(
                    start + TimeDelta::minutes(15) * i32::try_from(index).unwrap(),
                    Kilowatts::from(demand),
                )
            })
            .collect()
    }

    #[test]
    fn test_sorts_samples() {
        let profile: LoadProfile = [
            LoadInterval::new(at(1, 0, 15), Kilowatts::from(2.0)),
            LoadInterval::new(at(1, 0, 0), Kilowatts::from(1.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(profile.intervals()[0].demand, Kilowatts::from(1.0));
        assert_eq!(profile.cadence(), TimeDelta::minutes(15));
    }

    #[test]
    fn test_merges_repeated_timestamps() {
        let profile: LoadProfile = [
            LoadInterval::new(at(1, 0, 0), Kilowatts::from(100.0)),
            LoadInterval::new(at(1, 0, 15), Kilowatts::from(150.0)),
            LoadInterval::new(at(1, 0, 15), Kilowatts::from(200.0)),
            LoadInterval::new(at(1, 0, 30), Kilowatts::from(100.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(profile.len(), 3);
        assert_eq!(profile.intervals()[1].demand, Kilowatts::from(200.0));
        assert!(profile.steps().all(|step| step.duration.0 > 0.0));
    }

    #[test]
    fn test_steps_with_gap() {
        let profile: LoadProfile = [
            LoadInterval::new(at(1, 0, 0), Kilowatts::from(1.0)),
            LoadInterval::new(at(1, 0, 15), Kilowatts::from(1.0)),
            LoadInterval::new(at(1, 0, 30), Kilowatts::from(1.0)),
            LoadInterval::new(at(1, 2, 0), Kilowatts::from(1.0)),
        ]
        .into_iter()
        .collect();
        let steps = profile.steps().collect_vec();
        assert!(!steps[1].follows_gap);
        assert!(steps[3].follows_gap);

        // The step before the gap is capped at the nominal cadence:
        assert_abs_diff_eq!(steps[2].duration.0, 0.25);
        assert_abs_diff_eq!(steps[3].duration.0, 0.25);
    }

    #[test]
    fn test_empty_profile() {
        let profile = LoadProfile::default();
        assert!(profile.is_empty());
        assert_eq!(profile.peak(), Kilowatts::ZERO);
        assert_eq!(profile.steps().count(), 0);
    }
}
