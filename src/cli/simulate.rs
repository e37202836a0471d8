use std::path::PathBuf;

use clap::Parser;

use crate::{
    core::{configuration::CombinedBattery, dispatch::Simulator},
    ingest::read_profile_file,
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
    tables::{build_dispatch_table, build_trace_table},
};

#[derive(Parser)]
pub struct SimulateArgs {
    /// Load profile CSV with the `timestamp` and `kw` columns.
    #[clap(long = "profile", env = "PROFILE_PATH")]
    pub profile: PathBuf,

    /// Demand cap to enforce.
    #[clap(long = "target-cap-kw")]
    pub target_cap: Kilowatts,

    #[clap(long = "capacity-kwh")]
    pub capacity: KilowattHours,

    #[clap(long = "power-kw")]
    pub power: Kilowatts,

    #[clap(long = "round-trip-efficiency", default_value = "0.9")]
    pub round_trip_efficiency: f64,

    #[clap(long = "min-soc", default_value = "0.1")]
    pub min_soc: f64,

    #[clap(long = "max-soc", default_value = "0.9")]
    pub max_soc: f64,

    /// Print the outcome with the per-interval traces as JSON instead of the tables.
    #[clap(long)]
    pub json: bool,

    /// Also print the served load and state of charge of every interval.
    #[clap(long)]
    pub trace: bool,
}

impl SimulateArgs {
    pub fn battery(&self) -> Result<CombinedBattery> {
        ensure!(self.capacity > KilowattHours::ZERO, "the capacity must be positive");
        ensure!(self.power > Kilowatts::ZERO, "the power must be positive");
        ensure!(
            self.round_trip_efficiency > 0.0 && self.round_trip_efficiency <= 1.0,
            "the round-trip efficiency must be within (0, 1]",
        );
        ensure!(
            (0.0..=1.0).contains(&self.min_soc)
                && (0.0..=1.0).contains(&self.max_soc)
                && self.min_soc < self.max_soc,
            "the state-of-charge limits must satisfy 0 ≤ min < max ≤ 1",
        );
        Ok(CombinedBattery::builder()
            .capacity(self.capacity)
            .max_power(self.power)
            .round_trip_efficiency(self.round_trip_efficiency)
            .min_soc(self.min_soc)
            .max_soc(self.max_soc)
            .depth_of_discharge(self.max_soc - self.min_soc)
            .build())
    }

    #[instrument(skip_all, fields(target_cap = %self.target_cap))]
    pub fn run(&self) -> Result {
        let battery = self.battery()?;
        debug!(usable_capacity = %battery.usable_capacity(), "battery");
        let profile = read_profile_file(&self.profile)?;
        let outcome = Simulator::builder()
            .profile(&profile)
            .battery(&battery)
            .target_cap(self.target_cap)
            .simulate();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }
        if self.trace {
            println!("{}", build_trace_table(&profile, &outcome));
        }
        println!("{}", build_dispatch_table(&outcome));
        match outcome.failure_reason() {
            Some(reason) => warn!("{reason}"),
            None => info!("the cap holds"),
        }
        Ok(())
    }
}
