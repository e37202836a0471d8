use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Money in the tariff currency.
pub type Cost = Quantity<0, 0, 1>;

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0.0 {
            write!(f, "-${:.0}", -self.0)
        } else {
            write!(f, "${:.0}", self.0)
        }
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}$", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_negative() {
        assert_eq!(Cost::from(-1500.4).to_string(), "-$1500");
    }
}
