//! Load profile CSV reader.
//!
//! Expects a `timestamp,kw` header. Rows may come in any order.

use std::{io::Read, path::Path};

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::{
    core::profile::{LoadInterval, LoadProfile},
    prelude::*,
    quantity::power::Kilowatts,
};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Deserialize)]
struct Record {
    timestamp: String,

    #[serde(alias = "demand_kw", alias = "kW")]
    kw: f64,
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_profile_file(path: &Path) -> Result<LoadProfile> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open `{}`", path.display()))?;
    read_profile(file)
}

pub fn read_profile(reader: impl Read) -> Result<LoadProfile> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let intervals = reader
        .deserialize::<Record>()
        .enumerate()
        .map(|(index, record)| {
            // Line numbers are 1-based and the header takes the first line:
            let line = index + 2;
            let record = record.with_context(|| format!("failed to read line {line}"))?;
            let timestamp = parse_timestamp(&record.timestamp)
                .with_context(|| format!("bad timestamp on line {line}"))?;
            Ok(LoadInterval::new(timestamp, Kilowatts::from(record.kw)))
        })
        .collect::<Result<Vec<_>>>()?;
    let n_rows = intervals.len();
    let profile: LoadProfile = intervals.into_iter().collect();
    if profile.is_empty() {
        warn!("the load profile has no samples");
    } else {
        info!(n_rows, n_intervals = profile.len(), cadence = %profile.cadence(), "read");
    }
    Ok(profile)
}

/// Parse an RFC 3339 timestamp into the local wall time it denotes, or a naive one as is.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(timestamp.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .with_context(|| format!("`{text}` matches none of the supported formats"))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeDelta;

    use super::*;
    use crate::core::profile::tests::at;

    #[test]
    fn test_read_profile() -> Result {
        let profile = read_profile(
            "timestamp,kw\n\
             2025-07-01 00:15,120.5\n\
             2025-07-01T00:00:00+02:00, 100\n\
             2025-07-01 00:30:00,110\n"
                .as_bytes(),
        )?;
        assert_eq!(profile.len(), 3);
        assert_eq!(profile.intervals()[0].timestamp, at(1, 0, 0));
        assert_abs_diff_eq!(profile.intervals()[1].demand.0, 120.5);
        assert_eq!(profile.cadence(), TimeDelta::minutes(15));
        Ok(())
    }

    #[test]
    fn test_alias_header() -> Result {
        let profile = read_profile("timestamp,demand_kw\n2025-07-01T00:00:00,1\n".as_bytes())?;
        assert_eq!(profile.len(), 1);
        Ok(())
    }

    #[test]
    fn test_bad_timestamp() {
        let error = read_profile("timestamp,kw\n07/01/2025,1\n".as_bytes()).unwrap_err();
        assert!(format!("{error:#}").contains("line 2"));
    }

    #[test]
    fn test_daylight_saving_fall_back() -> Result {
        // The repeated wall-clock quarter collapses into a single sample:
        let profile = read_profile(
            "timestamp,kw\n\
             2025-10-26T02:15:00+02:00,100\n\
             2025-10-26T02:30:00+02:00,200\n\
             2025-10-26T02:30:00+01:00,150\n\
             2025-10-26T02:45:00+01:00,100\n"
                .as_bytes(),
        )?;
        assert_eq!(profile.len(), 3);
        assert_abs_diff_eq!(profile.intervals()[1].demand.0, 200.0);
        assert_eq!(profile.cadence(), TimeDelta::minutes(15));
        Ok(())
    }

    #[test]
    fn test_header_only() -> Result {
        assert!(read_profile("timestamp,kw\n".as_bytes())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_demand() {
        assert!(read_profile("timestamp,kw\n2025-07-01 00:00,lots\n".as_bytes()).is_err());
    }
}
