quantity!(KilowattHourRate, "€/kWh", 3);

impl KilowattHourRate {
    /// Round to tenths of a cent, the feed's own resolution.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self((self.0 * 1000.0).round() / 1000.0)
    }
}
