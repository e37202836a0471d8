use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Demand charge per kilowatt of monthly billed peak.
pub type DemandRate = Quantity<-1, 0, 1>;

impl Display for DemandRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}/kW·month", self.0)
    }
}

impl Debug for DemandRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}$/kW", self.0)
    }
}
