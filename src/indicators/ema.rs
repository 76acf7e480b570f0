use super::Indicator;

/// Exponential moving average seeded with the simple average of the first
/// `period` values.
#[derive(Debug, Clone)]
pub struct EMA {
    period: usize,
    multiplier: f64,
    value: Option<f64>,
    count: usize,
    sum: f64,
}

impl EMA {
    pub fn new(period: usize) -> Self {
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self {
            period,
            multiplier,
            value: None,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        self.count += 1;

        if self.count < self.period {
            self.sum += price;
            return None;
        } else if self.count == self.period {
            self.sum += price;
            self.value = Some(self.sum / self.period as f64);
            return self.value;
        }

        if let Some(prev_ema) = self.value {
            self.value = Some((price - prev_ema) * self.multiplier + prev_ema);
        }

        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for EMA {
    fn is_ready(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeds_with_sma() {
        let mut ema = EMA::new(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        assert_eq!(ema.update(3.0), Some(2.0));

        // multiplier = 0.5
        assert_eq!(ema.update(4.0), Some(3.0));
        assert!(ema.is_ready());
    }
}
