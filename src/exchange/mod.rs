pub mod binance;

pub use binance::*;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::DataError;
use crate::types::{HistoryPeriod, PriceSeries, TimeFrame};

/// What to download: a symbol, a bar size and a window
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: TimeFrame,
    /// Explicit first day; when set, `period` is ignored
    pub start_date: Option<NaiveDate>,
    pub period: HistoryPeriod,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>, interval: TimeFrame) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start_date: None,
            period: HistoryPeriod::default(),
        }
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_period(mut self, period: HistoryPeriod) -> Self {
        self.period = period;
        self
    }

    /// `[start, now]` for this request
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self.start_date {
            Some(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|d| d.and_utc())
                .unwrap_or_else(|| self.period.start_from(now)),
            None => self.period.start_from(now),
        };
        (start, now)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Sorted, de-duplicated OHLCV history. Fails with
    /// [`DataError::Unavailable`] when nothing usable comes back.
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<PriceSeries, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_prefers_start_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let request = HistoryRequest::new("BTCUSDT", TimeFrame::H1)
            .with_period(HistoryPeriod::Days(7))
            .with_start_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

        let (start, end) = request.window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(end, now);
    }

    #[test]
    fn test_window_from_period() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let request = HistoryRequest::new("BTCUSDT", TimeFrame::H1).with_period(HistoryPeriod::Days(7));

        let (start, _) = request.window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 25, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_mock_source_passes_request_through() {
        let mut source = MockPriceSource::new();
        source
            .expect_fetch_history()
            .withf(|req| req.symbol == "ETHUSDT" && req.interval == TimeFrame::H4)
            .times(1)
            .returning(|_| Ok(PriceSeries::default()));

        let request = HistoryRequest::new("ETHUSDT", TimeFrame::H4);
        let series = tokio_test::block_on(source.fetch_history(&request)).unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_mock_source_reports_unavailable() {
        let mut source = MockPriceSource::new();
        source.expect_fetch_history().returning(|req| {
            Err(DataError::Unavailable {
                symbol: req.symbol.clone(),
                interval: req.interval.to_string(),
            })
        });

        let err = source
            .fetch_history(&HistoryRequest::new("NOPE", TimeFrame::D1))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Unavailable { ref symbol, .. } if symbol == "NOPE"));
    }
}
