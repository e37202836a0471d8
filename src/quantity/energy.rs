use std::{
    fmt::{Debug, Display, Formatter},
    ops::Div,
};

use crate::quantity::{Quantity, power::Kilowatts, time::Hours};

pub type KilowattHours = Quantity<1, 1, 0>;

impl Display for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} kWh", self.0)
    }
}

impl Debug for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}kWh", self.0)
    }
}

impl Div<Hours> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: Hours) -> Self::Output {
        Quantity(self.0 / rhs.0)
    }
}

impl Div<Kilowatts> for KilowattHours {
    type Output = Hours;

    fn div(self, rhs: Kilowatts) -> Self::Output {
        Quantity(self.0 / rhs.0)
    }
}
