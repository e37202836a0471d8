mod battery;

use bon::Builder;
use chrono::NaiveDateTime;
use serde::Serialize;

pub use self::battery::Battery;
use crate::{
    core::{configuration::CombinedBattery, profile::LoadProfile},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    /// The battery had the energy but could not deliver it fast enough.
    PowerLimit,

    /// The battery reached its minimum state of charge.
    EnergyDepleted,
}

impl ViolationReason {
    pub const fn describe(self) -> &'static str {
        match self {
            Self::PowerLimit => "insufficient power",
            Self::EnergyDepleted => "insufficient energy",
        }
    }
}

/// First interval where the cap could not be held.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct Violation {
    pub timestamp: NaiveDateTime,
    pub reason: ViolationReason,

    /// Served load in excess of the cap.
    pub shortfall: Kilowatts,
}

/// Result of holding a demand cap with a battery.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct DispatchOutcome {
    pub original_peak: Kilowatts,

    /// Peak of the served load.
    pub new_peak: Kilowatts,

    pub feasible: bool,
    pub energy_discharged: KilowattHours,

    /// Lowest state of charge reached.
    pub min_soc: f64,

    /// State of charge after each interval of the profile.
    pub soc_history: Vec<f64>,

    /// Grid demand after the battery, aligned with the profile.
    pub served_load: Vec<Kilowatts>,

    pub first_violation: Option<Violation>,
}

impl DispatchOutcome {
    pub fn peak_reduction(&self) -> Kilowatts {
        (self.original_peak - self.new_peak).max(Kilowatts::ZERO)
    }

    /// Human-readable failure reason of an infeasible dispatch.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.first_violation.map(|violation| {
            format!(
                "Cap exceeded by {} at {} due to {}",
                violation.shortfall,
                violation.timestamp,
                violation.reason.describe(),
            )
        })
    }
}

/// Peak-shaving dispatch simulator.
///
/// Starts at the maximum state of charge, discharges whenever the demand exceeds the cap,
/// and recharges from the headroom under the cap otherwise.
#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct Simulator<'a> {
    profile: &'a LoadProfile,
    battery: &'a CombinedBattery,
    target_cap: Kilowatts,
}

impl<S: simulator_builder::IsComplete> SimulatorBuilder<'_, S> {
    pub fn simulate(self) -> DispatchOutcome {
        self.build().simulate()
    }
}

impl Simulator<'_> {
    /// Tolerated cap overshoot.
    pub const TOLERANCE: Kilowatts = Kilowatts::new(1e-6);

    fn simulate(self) -> DispatchOutcome {
        let mut battery = Battery::full(self.battery);
        let initial_soc = battery.state_of_charge();

        let mut new_peak = Kilowatts::ZERO;
        let mut energy_discharged = KilowattHours::ZERO;
        let mut min_soc = initial_soc;
        let mut first_violation = None;
        let mut soc_history = Vec::with_capacity(self.profile.len());
        let mut served_load = Vec::with_capacity(self.profile.len());

        for step in self.profile.steps() {
            let demand = step.interval.demand;
            let served = if demand > self.target_cap {
                let needed = demand - self.target_cap;
                let delivered = battery.discharge(needed, step.duration);
                energy_discharged += delivered * step.duration;
                let served = demand - delivered;
                if served > self.target_cap + Self::TOLERANCE && first_violation.is_none() {
                    let reason = if delivered >= battery.max_power() - Self::TOLERANCE {
                        ViolationReason::PowerLimit
                    } else {
                        ViolationReason::EnergyDepleted
                    };
                    debug!(timestamp = %step.interval.timestamp, ?reason, "cap violated");
                    first_violation = Some(Violation {
                        timestamp: step.interval.timestamp,
                        reason,
                        shortfall: served - self.target_cap,
                    });
                }
                served
            } else {
                // Charging never lifts the served load over the cap:
                demand + battery.charge(self.target_cap - demand, step.duration)
            };
            new_peak = new_peak.max(served);
            let soc = battery.state_of_charge();
            min_soc = min_soc.min(soc);
            soc_history.push(soc);
            served_load.push(served);
        }

        DispatchOutcome {
            original_peak: self.profile.peak(),
            new_peak,
            feasible: first_violation.is_none(),
            energy_discharged,
            min_soc,
            soc_history,
            served_load,
            first_violation,
        }
    }
}
