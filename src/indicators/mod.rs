pub mod ema;
pub mod rsi;
pub mod macd;
pub mod atr;

pub use ema::*;
pub use rsi::*;
pub use macd::*;
pub use atr::*;

pub trait Indicator {
    fn is_ready(&self) -> bool;
}

/// Natural log return per row; the first row has no predecessor
pub fn log_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;
    for &close in closes {
        out.push(prev.and_then(|p| {
            let r = (close / p).ln();
            r.is_finite().then_some(r)
        }));
        prev = Some(close);
    }
    out
}
