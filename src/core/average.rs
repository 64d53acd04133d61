use std::collections::VecDeque;

use crate::quantity::{Zero, power::Watts};

/// Rolling mean over the most recent samples.
#[derive(Clone, Debug)]
pub struct RollingAverage {
    window: usize,
    samples: VecDeque<Watts>,
}

impl RollingAverage {
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self { window, samples: VecDeque::with_capacity(window) }
    }

    pub fn push(&mut self, sample: Watts) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[must_use]
    pub fn value(&self) -> Watts {
        if self.samples.is_empty() {
            return Watts::ZERO;
        }
        #[expect(clippy::cast_precision_loss)]
        let count = self.samples.len() as f64;
        self.samples.iter().copied().sum::<Watts>() / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(RollingAverage::new(2).value(), Watts::ZERO);
    }

    #[test]
    fn oldest_samples_fall_out_of_the_window() {
        let mut average = RollingAverage::new(2);
        average.push(Watts(1000.0));
        average.push(Watts(2000.0));
        average.push(Watts(4000.0));
        assert_eq!(average.value(), Watts(3000.0));
    }
}
