use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use tracing::{debug, info};

use super::{HistoryRequest, PriceSource};
use crate::errors::DataError;
use crate::types::{Candle, PriceSeries};

pub const BINANCE_API: &str = "https://api.binance.com";
const KLINES_PER_PAGE: usize = 1000;
const PAGE_PAUSE_MS: u64 = 50;

/// Public market-data client for the Binance klines endpoint
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn public_only() -> Self {
        Self::new(BINANCE_API)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(
        &self,
        request: &HistoryRequest,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<Vec<serde_json::Value>>, DataError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
            self.base_url,
            request.symbol,
            request.interval.as_str(),
            start_millis,
            end_millis,
            KLINES_PER_PAGE
        );
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::public_only()
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    /// Walks the window page by page; Binance caps a klines response at 1000 rows
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<PriceSeries, DataError> {
        let (start, end) = request.window(Utc::now());
        let mut current_start = start.timestamp_millis();
        let end_millis = end.timestamp_millis();
        let step = request.interval.to_milliseconds() as i64;

        info!(
            "Fetching {} {} candles from {} to {}",
            request.symbol, request.interval, start, end
        );

        let mut all_candles = Vec::new();
        loop {
            let page = self.fetch_page(request, current_start, end_millis).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            let candles = parse_klines(&page)?;
            if let Some(last) = candles.last() {
                current_start = last.open_time.timestamp_millis() + step;
            }
            all_candles.extend(candles);

            if page_len < KLINES_PER_PAGE || current_start >= end_millis {
                break;
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(PAGE_PAUSE_MS)).await;
        }

        let raw = all_candles.len();
        let series = PriceSeries::from_candles(all_candles);
        if series.is_empty() {
            return Err(DataError::Unavailable {
                symbol: request.symbol.clone(),
                interval: request.interval.to_string(),
            });
        }

        info!(
            "Fetched {} candles for {} ({} dropped as duplicate or incomplete)",
            series.len(),
            request.symbol,
            raw - series.len()
        );
        Ok(series)
    }
}

fn price_field(kline: &[serde_json::Value], idx: usize) -> f64 {
    match kline.get(idx) {
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(f64::NAN),
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Keeps open time and OHLCV from raw kline arrays. Unparsable numbers become
/// NaN so the row is dropped when the series is built; a missing or invalid
/// open time makes the whole payload malformed.
pub fn parse_klines(page: &[Vec<serde_json::Value>]) -> Result<Vec<Candle>, DataError> {
    page.iter()
        .map(|k| {
            let millis = k.first().and_then(|v| v.as_i64()).ok_or_else(|| DataError::Malformed {
                reason: format!("kline without open time: {:?}", k.first()),
            })?;
            let open_time = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| DataError::Malformed {
                    reason: format!("open time out of range: {}", millis),
                })?;

            Ok(Candle {
                open_time,
                open: price_field(k, 1),
                high: price_field(k, 2),
                low: price_field(k, 3),
                close: price_field(k, 4),
                volume: price_field(k, 5),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kline(open_time: i64, close: &str) -> Vec<serde_json::Value> {
        json!([
            open_time,
            "100.0",
            "102.5",
            "99.5",
            close,
            "12.5",
            open_time + 3_599_999,
            "1250.0",
            42,
            "6.0",
            "600.0",
            "0"
        ])
        .as_array()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_parse_klines_keeps_ohlcv() {
        let candles = parse_klines(&[kline(1_704_067_200_000, "101.25")]).unwrap();

        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.open_time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 102.5);
        assert_eq!(c.low, 99.5);
        assert_eq!(c.close, 101.25);
        assert_eq!(c.volume, 12.5);
    }

    #[test]
    fn test_unparsable_price_dropped_by_series() {
        let hour = 3_600_000;
        let start = 1_704_067_200_000;
        let page = vec![
            kline(start + hour, "101.0"),
            kline(start, "100.0"),
            kline(start + 2 * hour, "n/a"),
            kline(start + hour, "999.0"),
        ];

        let series = PriceSeries::from_candles(parse_klines(&page).unwrap());

        assert_eq!(series.closes(), vec![100.0, 101.0]);
    }

    #[test]
    fn test_missing_open_time_is_malformed() {
        let page = vec![json!(["oops", "1", "1", "1", "1", "1"]).as_array().unwrap().clone()];
        assert!(matches!(parse_klines(&page), Err(DataError::Malformed { .. })));
    }

    #[test]
    fn test_base_url_normalised() {
        let client = BinanceClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(BinanceClient::default().base_url(), BINANCE_API);
    }
}
