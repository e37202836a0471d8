use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{
    core::catalog::{BatteryModel, Catalog},
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
};

/// Bounds of the configuration search.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct SearchOptions {
    /// Maximum total number of units in a configuration.
    #[builder(default = 10)]
    pub max_units: u32,

    /// Quantities beyond the single-model minimum to enumerate.
    #[builder(default = 5)]
    pub extra_units: u32,

    /// Number of leading active catalog models paired up for two-model combinations.
    #[builder(default = 5)]
    pub combination_breadth: usize,

    /// Maximum units of each model in a two-model combination.
    #[builder(default = 3)]
    pub max_units_per_model: u32,

    /// Share of the power and energy requirements a combination must reach.
    #[builder(default = 0.8)]
    pub min_combination_coverage: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Units of a single catalog model within a configuration.
#[derive(Clone, Debug, Serialize)]
pub struct Component {
    pub model_name: String,
    pub manufacturer: String,
    pub quantity: u32,
    pub unit_cost: Cost,
}

/// Aggregate parameters of the installed units acting as one battery.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, bon::Builder)]
pub struct CombinedBattery {
    pub capacity: KilowattHours,
    pub max_power: Kilowatts,

    /// Capacity-weighted round-trip efficiency.
    #[builder(default = 1.0)]
    pub round_trip_efficiency: f64,

    /// Yearly capacity loss.
    #[builder(default = 0.02)]
    pub degradation_rate: f64,

    #[builder(default = 0.1)]
    pub min_soc: f64,

    #[builder(default = 0.9)]
    pub max_soc: f64,

    #[builder(default = 0.9)]
    pub depth_of_discharge: f64,
}

impl CombinedBattery {
    /// Combine the units.
    ///
    /// Only power, capacity and efficiency depend on the units, the rest are fixed defaults.
    fn of(units: &[(&BatteryModel, u32)]) -> Self {
        let capacity: KilowattHours =
            units.iter().map(|(model, quantity)| model.capacity * f64::from(*quantity)).sum();
        let max_power =
            units.iter().map(|(model, quantity)| model.power * f64::from(*quantity)).sum();
        let weighted_efficiency: KilowattHours = units
            .iter()
            .map(|(model, quantity)| model.capacity * (f64::from(*quantity) * model.efficiency))
            .sum();
        Self::builder()
            .capacity(capacity)
            .max_power(max_power)
            .round_trip_efficiency(weighted_efficiency / capacity)
            .build()
    }

    /// Energy that may be stored between the state-of-charge limits.
    pub fn usable_capacity(&self) -> KilowattHours {
        self.capacity * (self.max_soc - self.min_soc)
    }
}

/// Candidate hardware configuration.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct BatteryConfiguration {
    pub components: Vec<Component>,
    pub combined: CombinedBattery,
    pub total_cost: Cost,
    pub total_power: Kilowatts,
    pub total_capacity: KilowattHours,
    pub description: String,
}

impl BatteryConfiguration {
    fn new(units: &[(&BatteryModel, u32)], price_quantity: impl Fn(u32) -> u32) -> Self {
        let components = units
            .iter()
            .map(|(model, quantity)| Component {
                model_name: model.model_name.clone(),
                manufacturer: model.manufacturer.clone(),
                quantity: *quantity,
                unit_cost: model.prices.unit_price(price_quantity(*quantity)),
            })
            .collect_vec();
        let total_cost = components
            .iter()
            .map(|component| component.unit_cost * f64::from(component.quantity))
            .sum();
        let description = components
            .iter()
            .map(|component| {
                let Component { quantity, manufacturer, model_name, .. } = component;
                format!("{quantity} × {manufacturer} {model_name}")
            })
            .join(" + ");
        let combined = CombinedBattery::of(units);
        Self {
            components,
            total_cost,
            total_power: combined.max_power,
            total_capacity: combined.capacity,
            combined,
            description,
        }
    }

    /// Enumerate candidate configurations meeting the requirements, cheapest first.
    ///
    /// This is a bounded heuristic search: single-model configurations near the minimal
    /// quantity, and small two-model blends among the leading catalog entries.
    #[instrument(skip_all, fields(?required_power, ?required_capacity))]
    pub fn generate(
        catalog: &Catalog,
        required_power: Kilowatts,
        required_capacity: KilowattHours,
        options: SearchOptions,
    ) -> Vec<Self> {
        let mut configurations =
            Self::single_model(catalog, required_power, required_capacity, options)
                .chain(Self::two_model(catalog, required_power, required_capacity, options))
                .collect_vec();

        // Stable sort keeps the generation order among equally priced configurations:
        configurations.sort_by_key(|configuration| OrderedFloat(configuration.total_cost.0));
        info!(n_configurations = configurations.len(), "generated");
        configurations
    }

    fn single_model(
        catalog: &Catalog,
        required_power: Kilowatts,
        required_capacity: KilowattHours,
        options: SearchOptions,
    ) -> impl Iterator<Item = Self> {
        catalog.active().flat_map(move |model| {
            let min_quantity = min_units(required_power / model.power)
                .max(min_units(required_capacity / model.capacity))
                .max(1);
            let max_quantity =
                options.max_units.min(min_quantity.saturating_add(options.extra_units));
            if min_quantity > max_quantity {
                trace!(model = %model.model_name, min_quantity, "too many units needed");
            }
            (min_quantity..=max_quantity)
                .map(move |quantity| Self::new(&[(model, quantity)], std::convert::identity))
        })
    }

    fn two_model(
        catalog: &Catalog,
        required_power: Kilowatts,
        required_capacity: KilowattHours,
        options: SearchOptions,
    ) -> impl Iterator<Item = Self> {
        let min_power = required_power * options.min_combination_coverage;
        let min_capacity = required_capacity * options.min_combination_coverage;
        let quantities = move || 1..=options.max_units_per_model;
        catalog
            .active()
            .take(options.combination_breadth)
            .tuple_combinations()
            .flat_map(move |(lhs, rhs)| {
                quantities()
                    .cartesian_product(quantities())
                    .filter(move |(n_lhs, n_rhs)| n_lhs + n_rhs <= options.max_units)
                    .filter(move |(n_lhs, n_rhs)| {
                        lhs.power * f64::from(*n_lhs) + rhs.power * f64::from(*n_rhs) >= min_power
                            && lhs.capacity * f64::from(*n_lhs) + rhs.capacity * f64::from(*n_rhs)
                                >= min_capacity
                    })
                    .map(move |(n_lhs, n_rhs)| {
                        // Blends only ever qualify for the first two price breaks:
                        Self::new(&[(lhs, n_lhs), (rhs, n_rhs)], |quantity| {
                            if quantity >= 11 { 11 } else { 1 }
                        })
                    })
            })
    }
}

/// Units needed to cover the requirement-to-unit ratio.
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn min_units(ratio: f64) -> u32 {
    if ratio.is_finite() && ratio > 0.0 { ratio.ceil() as u32 } else { 0 }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::catalog::tests::model;

    fn catalog() -> Catalog {
        Catalog::from_rows(vec![
            model("Cabinet", 100.0, 50.0, 40_000.0),
            model("Rack", 50.0, 25.0, 22_000.0),
            model("Container", 1000.0, 500.0, 350_000.0),
        ])
    }

    #[test]
    fn test_cost_is_non_decreasing() {
        let configurations = BatteryConfiguration::generate(
            &catalog(),
            Kilowatts::from(88.0),
            KilowattHours::from(316.8),
            SearchOptions::default(),
        );
        assert!(!configurations.is_empty());
        for (lhs, rhs) in configurations.iter().tuple_windows() {
            assert!(lhs.total_cost <= rhs.total_cost);
        }
    }

    #[test]
    fn test_single_model_quantities() {
        let catalog = Catalog::from_rows(vec![model("Cabinet", 100.0, 50.0, 40_000.0)]);
        let configurations = BatteryConfiguration::generate(
            &catalog,
            Kilowatts::from(88.0),
            KilowattHours::from(316.8),
            SearchOptions::default(),
        );
        // Energy dominates: 4 units minimum, enumerated up to the 9 units:
        let quantities = configurations
            .iter()
            .map(|configuration| configuration.components[0].quantity)
            .collect_vec();
        assert_eq!(quantities, [4, 5, 6, 7, 8, 9]);
        assert_eq!(configurations[0].total_cost, Cost::from(160_000.0));
        assert_eq!(configurations[0].total_power, Kilowatts::from(200.0));
        assert_eq!(configurations[0].description, "4 × Acme Cabinet");
    }

    #[test]
    fn test_max_units_caps_enumeration() {
        let catalog = Catalog::from_rows(vec![model("Rack", 50.0, 25.0, 22_000.0)]);
        let options = SearchOptions::builder().max_units(8).build();
        let generate = |options| {
            BatteryConfiguration::generate(
                &catalog,
                Kilowatts::from(88.0),
                KilowattHours::from(316.8),
                options,
            )
        };
        // 7 units minimum, capped at 8:
        assert_eq!(generate(options).len(), 2);
        assert!(generate(SearchOptions::builder().max_units(6).build()).is_empty());
    }

    #[test]
    fn test_two_model_combinations() {
        let catalog = Catalog::from_rows(vec![
            model("Cabinet", 100.0, 50.0, 40_000.0),
            model("Rack", 50.0, 25.0, 22_000.0),
        ]);
        let configurations = BatteryConfiguration::generate(
            &catalog,
            Kilowatts::from(100.0),
            KilowattHours::from(200.0),
            SearchOptions::default(),
        );
        let blends = configurations
            .iter()
            .filter(|configuration| configuration.components.len() == 2)
            .collect_vec();
        assert!(!blends.is_empty());
        for blend in blends {
            assert!(blend.total_power >= Kilowatts::from(80.0));
            assert!(blend.total_capacity >= KilowattHours::from(160.0));
            assert!(blend.components.iter().all(|component| (1..=3).contains(&component.quantity)));
        }
    }

    #[test]
    fn test_combined_efficiency_is_capacity_weighted() {
        let mut lhs = model("A", 300.0, 100.0, 1.0);
        lhs.efficiency = 0.9;
        let mut rhs = model("B", 100.0, 100.0, 1.0);
        rhs.efficiency = 0.8;
        let combined = CombinedBattery::of(&[(&lhs, 1), (&rhs, 1)]);
        assert_abs_diff_eq!(combined.round_trip_efficiency, 0.875, epsilon = 1e-12);
        assert_abs_diff_eq!(combined.capacity.0, 400.0);
        assert_abs_diff_eq!(combined.min_soc, 0.1);
        assert_abs_diff_eq!(combined.max_soc, 0.9);
        assert_abs_diff_eq!(combined.degradation_rate, 0.02);
    }

    #[test]
    fn test_combination_breadth() {
        let rows = (0..8).map(|index| model(&format!("M{index}"), 100.0, 50.0, 1000.0)).collect();
        let catalog = Catalog::from_rows(rows);
        let options = SearchOptions::builder().combination_breadth(2).build();
        let configurations = BatteryConfiguration::generate(
            &catalog,
            Kilowatts::from(50.0),
            KilowattHours::from(100.0),
            options,
        );
        let blends = configurations
            .iter()
            .filter(|configuration| configuration.components.len() == 2)
            .collect_vec();
        assert!(!blends.is_empty());
        for blend in blends {
            assert_eq!(blend.components[0].model_name, "M0");
            assert_eq!(blend.components[1].model_name, "M1");
        }
    }
}
