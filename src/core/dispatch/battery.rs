use crate::{
    core::configuration::CombinedBattery,
    quantity::{energy::KilowattHours, power::Kilowatts, time::Hours},
};

/// Battery state during the dispatch.
///
/// The round-trip loss is split evenly between the charging and discharging legs.
#[derive(Copy, Clone, Debug)]
pub struct Battery {
    capacity: KilowattHours,

    /// Minimally allowed residual energy.
    min_residual_energy: KilowattHours,

    /// Maximally allowed residual energy.
    max_residual_energy: KilowattHours,

    /// Current residual energy.
    residual_energy: KilowattHours,

    max_power: Kilowatts,

    /// Efficiency of a single leg.
    leg_efficiency: f64,
}

impl Battery {
    /// Battery charged up to its maximum state of charge.
    pub fn full(combined: &CombinedBattery) -> Self {
        let max_residual_energy = combined.capacity * combined.max_soc;
        Self {
            capacity: combined.capacity,
            min_residual_energy: combined.capacity * combined.min_soc,
            max_residual_energy,
            residual_energy: max_residual_energy,
            max_power: combined.max_power,
            leg_efficiency: combined.round_trip_efficiency.sqrt(),
        }
    }

    pub const fn max_power(&self) -> Kilowatts {
        self.max_power
    }

    #[must_use]
    pub fn state_of_charge(&self) -> f64 {
        if self.capacity > KilowattHours::ZERO {
            self.residual_energy / self.capacity
        } else {
            0.0
        }
    }

    /// Discharge at up to the requested external power.
    ///
    /// # Returns
    ///
    /// Actually delivered external power. A zero-length step delivers nothing.
    pub fn discharge(&mut self, requested: Kilowatts, for_: Hours) -> Kilowatts {
        if for_ <= Hours::ZERO {
            return Kilowatts::ZERO;
        }
        let available = (self.residual_energy - self.min_residual_energy).max(KilowattHours::ZERO);
        let delivered = requested
            .clamp(Kilowatts::ZERO, self.max_power)
            .min(available * self.leg_efficiency / for_);
        self.residual_energy = (self.residual_energy - delivered * for_ / self.leg_efficiency)
            .max(self.min_residual_energy.min(self.residual_energy));
        delivered
    }

    /// Charge at up to the requested external power.
    ///
    /// # Returns
    ///
    /// Actually consumed external power. A zero-length step consumes nothing.
    pub fn charge(&mut self, requested: Kilowatts, for_: Hours) -> Kilowatts {
        if for_ <= Hours::ZERO {
            return Kilowatts::ZERO;
        }
        let headroom = (self.max_residual_energy - self.residual_energy).max(KilowattHours::ZERO);
        let consumed = requested
            .clamp(Kilowatts::ZERO, self.max_power)
            .min(headroom / self.leg_efficiency / for_);
        self.residual_energy = (self.residual_energy + consumed * for_ * self.leg_efficiency)
            .min(self.max_residual_energy.max(self.residual_energy));
        consumed
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn battery(round_trip_efficiency: f64) -> Battery {
        Battery::full(
            &CombinedBattery::builder()
                .capacity(KilowattHours::from(100.0))
                .max_power(Kilowatts::from(50.0))
                .round_trip_efficiency(round_trip_efficiency)
                .build(),
        )
    }

    #[test]
    fn test_starts_full() {
        assert_abs_diff_eq!(battery(1.0).state_of_charge(), 0.9);
    }

    #[test]
    fn test_discharge_power_limit() {
        let mut battery = battery(1.0);
        let delivered = battery.discharge(Kilowatts::from(80.0), Hours::from(1.0));
        assert_abs_diff_eq!(delivered.0, 50.0);
        assert_abs_diff_eq!(battery.state_of_charge(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_discharge_stops_at_min_soc() {
        let mut battery = battery(1.0);
        let delivered = battery.discharge(Kilowatts::from(50.0), Hours::from(2.0));
        // Only 80 kWh between 90% and 10%:
        assert_abs_diff_eq!(delivered.0, 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(battery.state_of_charge(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(battery.discharge(Kilowatts::from(10.0), Hours::QUARTER).0, 0.0);
    }

    #[test]
    fn test_efficiency_legs() {
        let mut battery = battery(0.81);
        let delivered = battery.discharge(Kilowatts::from(9.0), Hours::from(1.0));
        assert_abs_diff_eq!(delivered.0, 9.0);
        // 9 kWh delivered costs 10 kWh of the residual energy:
        assert_abs_diff_eq!(battery.state_of_charge(), 0.8, epsilon = 1e-12);

        let consumed = battery.charge(Kilowatts::from(50.0), Hours::from(1.0));
        // 10 kWh of headroom takes 10 / 0.9 kWh from the grid:
        assert_abs_diff_eq!(consumed.0, 10.0 / 0.9, epsilon = 1e-9);
        assert_abs_diff_eq!(battery.state_of_charge(), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_charge_when_full() {
        let mut battery = battery(1.0);
        assert_abs_diff_eq!(battery.charge(Kilowatts::from(10.0), Hours::QUARTER).0, 0.0);
    }

    #[test]
    fn test_zero_length_step_moves_nothing() {
        let mut battery = battery(1.0);
        assert_abs_diff_eq!(battery.discharge(Kilowatts::from(50.0), Hours::ZERO).0, 0.0);
        assert_abs_diff_eq!(battery.state_of_charge(), 0.9);

        battery.discharge(Kilowatts::from(50.0), Hours::from(1.0));
        assert_abs_diff_eq!(battery.charge(Kilowatts::from(50.0), Hours::ZERO).0, 0.0);
        assert_abs_diff_eq!(battery.state_of_charge(), 0.4, epsilon = 1e-12);
    }
}
