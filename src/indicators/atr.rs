use super::Indicator;

#[derive(Debug, Clone)]
pub struct ATR {
    period: usize,
    prev_close: Option<f64>,
    true_ranges: Vec<f64>,
    value: Option<f64>,
}

impl ATR {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            true_ranges: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = self.true_range(high, low);
        self.prev_close = Some(close);

        self.true_ranges.push(tr);

        if self.true_ranges.len() < self.period {
            return None;
        }

        if self.true_ranges.len() == self.period && self.value.is_none() {
            self.value = Some(self.true_ranges.iter().sum::<f64>() / self.period as f64);
        } else if let Some(prev_atr) = self.value {
            let n = self.period as f64;
            self.value = Some((prev_atr * (n - 1.0) + tr) / n);
        }

        if self.true_ranges.len() > self.period {
            self.true_ranges.remove(0);
        }

        self.value
    }

    fn true_range(&self, high: f64, low: f64) -> f64 {
        let hl = high - low;

        match self.prev_close {
            Some(prev_close) => {
                let hc = (high - prev_close).abs();
                let lc = (low - prev_close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for ATR {
    fn is_ready(&self) -> bool {
        self.value.is_some()
    }
}

pub fn atr_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut atr = ATR::new(period);
    highs
        .iter()
        .zip(lows)
        .zip(closes)
        .map(|((h, l), c)| atr.update(*h, *l, *c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_range() {
        let highs = vec![102.0; 20];
        let lows = vec![98.0; 20];
        let closes = vec![100.0; 20];

        let series = atr_series(&highs, &lows, &closes, 14);

        assert!(series[..13].iter().all(Option::is_none));
        for value in series[13..].iter() {
            assert!((value.unwrap() - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gap_widens_true_range() {
        let mut atr = ATR::new(2);
        atr.update(101.0, 99.0, 100.0);
        // gap up: |high - prev_close| = 10 beats high - low = 2
        let value = atr.update(110.0, 108.0, 109.0).unwrap();
        assert!((value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_atr_is_positive() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();

        for value in atr_series(&highs, &lows, &closes, 14).into_iter().flatten() {
            assert!(value > 0.0);
        }
    }
}
