use std::fmt::{Debug, Display, Formatter};

use chrono::TimeDelta;

use crate::quantity::Quantity;

pub type Hours = Quantity<0, 1, 0>;

impl Hours {
    pub const QUARTER: Self = Self(0.25);
}

impl From<TimeDelta> for Hours {
    fn from(time_delta: TimeDelta) -> Self {
        Self(time_delta.as_seconds_f64() / 3600.0)
    }
}

impl Display for Hours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} h", self.0)
    }
}

impl Debug for Hours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}h", self.0)
    }
}
