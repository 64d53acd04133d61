use std::ops::Mul;

use crate::quantity::{energy::WattHours, time::Hours};

quantity!(Watts, "W", 0);

impl Mul<Hours> for Watts {
    type Output = WattHours;

    fn mul(self, rhs: Hours) -> Self::Output {
        WattHours(self.0 * rhs.0)
    }
}
