use std::ops::{Div, Mul};

use crate::quantity::{cost::Cost, power::Watts, rate::KilowattHourRate, time::Hours};

quantity!(WattHours, "Wh", 0);

impl Div<Hours> for WattHours {
    type Output = Watts;

    fn div(self, rhs: Hours) -> Self::Output {
        Watts(self.0 / rhs.0)
    }
}

impl Div<Watts> for WattHours {
    type Output = Hours;

    fn div(self, rhs: Watts) -> Self::Output {
        Hours(self.0 / rhs.0)
    }
}

/// The rate is per **kilo**watt-hour.
impl Mul<KilowattHourRate> for WattHours {
    type Output = Cost;

    fn mul(self, rhs: KilowattHourRate) -> Self::Output {
        Cost(self.0 * 0.001 * rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_over_time_is_power() {
        assert_eq!(WattHours(1500.0) / Hours(0.5), Watts(3000.0));
    }

    #[test]
    fn energy_at_rate_is_cost() {
        assert_eq!(WattHours(2000.0) * KilowattHourRate(0.25), Cost(0.5));
    }
}
