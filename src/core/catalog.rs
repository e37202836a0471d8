use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
};

/// Unit price by order quantity.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTiers {
    /// 1 to 10 units.
    pub up_to_10: Cost,

    /// 11 to 20 units.
    pub up_to_20: Cost,

    /// 21 to 50 units.
    pub up_to_50: Cost,

    /// More than 50 units.
    pub above_50: Cost,
}

impl PriceTiers {
    pub const fn unit_price(&self, quantity: u32) -> Cost {
        match quantity {
            0..=10 => self.up_to_10,
            11..=20 => self.up_to_20,
            21..=50 => self.up_to_50,
            _ => self.above_50,
        }
    }
}

/// Storage product as listed in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryModel {
    pub model_name: String,
    pub manufacturer: String,

    #[serde(rename = "capacityKwh")]
    pub capacity: KilowattHours,

    #[serde(rename = "powerKw")]
    pub power: Kilowatts,

    #[serde(default)]
    pub c_rate: f64,

    /// Round-trip efficiency.
    pub efficiency: f64,

    #[serde(default)]
    pub warranty_years: u32,

    pub prices: PriceTiers,

    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl BatteryModel {
    fn rejection_reason(&self) -> Option<&'static str> {
        if !(self.capacity.0 > 0.0) {
            Some("non-positive capacity")
        } else if !(self.power.0 > 0.0) {
            Some("non-positive power")
        } else if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            Some("efficiency outside (0, 1]")
        } else {
            None
        }
    }
}

/// Serialized catalog document.
#[derive(Serialize, Deserialize)]
pub struct CatalogDocument {
    pub batteries: Vec<BatteryModel>,
}

/// Validated storage product catalog.
#[must_use]
#[derive(Clone, Debug, Default)]
pub struct Catalog(Vec<BatteryModel>);

impl From<CatalogDocument> for Catalog {
    fn from(document: CatalogDocument) -> Self {
        Self::from_rows(document.batteries)
    }
}

impl Catalog {
    /// Build the catalog, dropping invalid and duplicate rows.
    ///
    /// The first occurrence of a manufacturer and model pair wins.
    #[instrument(skip_all, fields(n_rows = rows.len()))]
    pub fn from_rows(rows: Vec<BatteryModel>) -> Self {
        let mut seen = HashSet::new();
        let models: Vec<_> = rows
            .into_iter()
            .filter(|model| {
                if let Some(reason) = model.rejection_reason() {
                    warn!(
                        manufacturer = %model.manufacturer,
                        model = %model.model_name,
                        reason,
                        "dropped",
                    );
                    false
                } else if !seen.insert((model.manufacturer.clone(), model.model_name.clone())) {
                    warn!(
                        manufacturer = %model.manufacturer,
                        model = %model.model_name,
                        "dropped a duplicate",
                    );
                    false
                } else {
                    true
                }
            })
            .collect();
        debug!(n_models = models.len(), "validated");
        Self(models)
    }

    #[must_use]
    pub fn models(&self) -> &[BatteryModel] {
        &self.0
    }

    /// Models available for new installations, in catalog order.
    pub fn active(&self) -> impl Iterator<Item = &BatteryModel> + Clone {
        self.0.iter().filter(|model| model.active)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}
