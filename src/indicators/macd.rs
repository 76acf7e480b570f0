use super::{ema::EMA, Indicator};

#[derive(Debug, Clone)]
pub struct MACD {
    fast_ema: EMA,
    slow_ema: EMA,
    signal_ema: EMA,
    macd_line: Option<f64>,
    histogram: Option<f64>,
}

impl MACD {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_ema: EMA::new(fast_period),
            slow_ema: EMA::new(slow_period),
            signal_ema: EMA::new(signal_period),
            macd_line: None,
            histogram: None,
        }
    }

    /// Feeds one price. The MACD line is available as soon as the slow EMA
    /// has warmed up; the full output also needs the signal EMA.
    pub fn update(&mut self, price: f64) -> Option<MACDOutput> {
        let fast = self.fast_ema.update(price);
        let slow = self.slow_ema.update(price);

        if let (Some(f), Some(s)) = (fast, slow) {
            let macd_line = f - s;
            self.macd_line = Some(macd_line);

            if let Some(signal) = self.signal_ema.update(macd_line) {
                let histogram = macd_line - signal;
                self.histogram = Some(histogram);

                return Some(MACDOutput {
                    macd_line,
                    signal_line: signal,
                    histogram,
                });
            }
        }

        None
    }

    pub fn macd_line(&self) -> Option<f64> {
        self.macd_line
    }
}

impl Indicator for MACD {
    fn is_ready(&self) -> bool {
        self.histogram.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MACDOutput {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Row-aligned `(macd_line, histogram)` columns
pub fn macd_series(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut macd = MACD::new(fast_period, slow_period, signal_period);
    let mut lines = Vec::with_capacity(prices.len());
    let mut hists = Vec::with_capacity(prices.len());

    for &price in prices {
        let output = macd.update(price);
        // macd_line() keeps the previous value, so read it only on rows where
        // the slow EMA produced one
        lines.push(if macd.slow_ema.is_ready() { macd.macd_line() } else { None });
        hists.push(output.map(|o| o.histogram));
    }

    (lines, hists)
}
