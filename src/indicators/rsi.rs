use super::Indicator;

/// Relative strength index with Wilder smoothing.
///
/// The first value appears after `period` price changes, i.e. at row
/// index `period` of the input.
#[derive(Debug, Clone)]
pub struct RSI {
    period: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
    prev_price: Option<f64>,
    gains: Vec<f64>,
    losses: Vec<f64>,
    value: Option<f64>,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            avg_gain: None,
            avg_loss: None,
            prev_price: None,
            gains: Vec::with_capacity(period),
            losses: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price {
            let change = price - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            if self.gains.len() < self.period {
                self.gains.push(gain);
                self.losses.push(loss);

                if self.gains.len() == self.period {
                    let n = self.period as f64;
                    self.avg_gain = Some(self.gains.iter().sum::<f64>() / n);
                    self.avg_loss = Some(self.losses.iter().sum::<f64>() / n);
                    self.value = self.calculate_rsi();
                }
            } else if let (Some(avg_gain), Some(avg_loss)) = (self.avg_gain, self.avg_loss) {
                let n = self.period as f64;
                self.avg_gain = Some((avg_gain * (n - 1.0) + gain) / n);
                self.avg_loss = Some((avg_loss * (n - 1.0) + loss) / n);
                self.value = self.calculate_rsi();
            }
        }

        self.prev_price = Some(price);
        self.value
    }

    fn calculate_rsi(&self) -> Option<f64> {
        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                if avg_loss == 0.0 {
                    Some(100.0)
                } else {
                    let rs = avg_gain / avg_loss;
                    Some(100.0 - 100.0 / (1.0 + rs))
                }
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for RSI {
    fn is_ready(&self) -> bool {
        self.value.is_some()
    }
}

pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut rsi = RSI::new(period);
    prices.iter().map(|p| rsi.update(*p)).collect()
}
