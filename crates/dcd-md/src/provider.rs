//! Provider boundary for per-ticker series ingestion.
//!
//! A provider never fails a whole fetch: every series carries its own
//! [`FetchStatus`], and exclusion decides later what to drop.
//!
//! [`EodhdProvider`] talks to the EODHD REST API:
//!
//! | Series       | Endpoint                                   |
//! |--------------|--------------------------------------------|
//! | prices       | `eod/{ticker}?from&to`                     |
//! | dividends    | `div/{ticker}?from&to`                     |
//! | earnings     | `calendar/earnings?from&to&symbols`        |
//! | market caps  | `historical-market-cap/{ticker}?from&to`   |
//!
//! Responses can be cached on disk ([`ResponseCache`]); a cache hit never
//! touches the network.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::normalizer::micros_from_json;
use crate::{FetchStatus, MarketCapSeries, PriceSeries, TickerBundle};

pub const EODHD_BASE_URL: &str = "https://eodhd.com/api";

/// Tickers and the inclusive date window to fetch.
#[derive(Debug, Clone)]
pub struct FetchSeriesRequest {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Pluggable series provider.
#[async_trait::async_trait]
pub trait SeriesProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_ticker(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> TickerBundle;
}

/// Fetch every requested ticker, one at a time, in request order.
pub async fn fetch_all(
    provider: &dyn SeriesProvider,
    req: &FetchSeriesRequest,
) -> BTreeMap<String, TickerBundle> {
    let mut out = BTreeMap::new();
    for ticker in &req.tickers {
        info!(source = provider.source_name(), ticker = %ticker, "fetching series");
        let bundle = provider.fetch_ticker(ticker, req.start, req.end).await;
        out.insert(ticker.clone(), bundle);
    }
    out
}

// ---------------------------------------------------------------------------
// Disk cache
// ---------------------------------------------------------------------------

/// JSON response cache laid out as `<root>/<ticker>/<api_path>/<query>.json`.
///
/// The API token is never part of the key.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, ticker: &str, api_path: &str, query: &[(&str, String)]) -> PathBuf {
        let key = query
            .iter()
            .map(|(k, v)| format!("{k}_{v}"))
            .collect::<Vec<_>>()
            .join("_");
        self.root
            .join(sanitize(ticker))
            .join(sanitize(&api_path.replace('/', "_")))
            .join(format!("{}.json", sanitize(&key)))
    }

    pub fn load(&self, path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("read cache file {}", path.display()))?;
        let v = serde_json::from_slice(&bytes)
            .with_context(|| format!("decode cache file {}", path.display()))?;
        Ok(Some(v))
    }

    pub fn store(&self, path: &Path, value: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {}", parent.display()))?;
        }
        let bytes = serde_json::to_vec(value).context("encode cache entry")?;
        std::fs::write(path, bytes).with_context(|| format!("write cache file {}", path.display()))
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// EODHD
// ---------------------------------------------------------------------------

/// EODHD-backed provider.
///
/// API key is read by the caller (CLI) and passed in; do not log it.
#[derive(Debug, Clone)]
pub struct EodhdProvider {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    cache: Option<ResponseCache>,
    market_cap_aliases: BTreeMap<String, String>,
}

impl EodhdProvider {
    pub fn new(api_key: String) -> Self {
        Self::new_with_base_url(api_key, EODHD_BASE_URL.to_string())
    }

    pub fn new_with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
            base_url,
            cache: None,
            market_cap_aliases: BTreeMap::new(),
        }
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Request market caps for `ticker` under `alias` instead (e.g. a foreign
    /// listing whose capitalization is only published for its ADR).
    pub fn with_market_cap_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.market_cap_aliases = aliases;
        self
    }

    fn url(&self, api_path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), api_path)
    }

    /// GET one endpoint, consulting the cache first.
    async fn get_json(
        &self,
        cache_ticker: &str,
        api_path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, FetchStatus> {
        let cache_path = self
            .cache
            .as_ref()
            .map(|c| (c, c.path_for(cache_ticker, api_path, query)));

        if let Some((cache, path)) = &cache_path {
            match cache.load(path) {
                Ok(Some(v)) => {
                    debug!(path = %path.display(), "cache hit");
                    return Ok(v);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %format!("{e:#}"), "ignoring unreadable cache entry"),
            }
        }

        let mut params: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        params.push(("api_token", self.api_key.as_str()));
        params.push(("fmt", "json"));

        debug!(api_path, ticker = cache_ticker, "downloading");
        let resp = self
            .http
            .get(self.url(api_path))
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchStatus::failed(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchStatus::failed(
                Some(status.as_u16()),
                format!("http status {}", status.as_u16()),
            ));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchStatus::failed(Some(status.as_u16()), e.to_string()))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            FetchStatus::failed(Some(status.as_u16()), format!("response is not json: {e}"))
        })?;

        if let Some((cache, path)) = &cache_path {
            if let Err(e) = cache.store(path, &value) {
                warn!(error = %format!("{e:#}"), "failed to write cache entry");
            }
        }
        Ok(value)
    }

    fn window(start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("from", start.format("%Y-%m-%d").to_string()),
            ("to", end.format("%Y-%m-%d").to_string()),
        ]
    }

    async fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (PriceSeries, FetchStatus) {
        let api_path = format!("eod/{ticker}");
        match self.get_json(ticker, &api_path, &Self::window(start, end)).await {
            Ok(v) => {
                let prices = parse_eod(ticker, &v);
                let status = FetchStatus::from_rows(!prices.is_empty());
                (prices, status)
            }
            Err(status) => {
                warn!(ticker, ?status, "price fetch failed");
                (PriceSeries::new(), status)
            }
        }
    }

    async fn fetch_dividends(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (BTreeSet<NaiveDate>, FetchStatus) {
        let api_path = format!("div/{ticker}");
        match self.get_json(ticker, &api_path, &Self::window(start, end)).await {
            Ok(v) => {
                let dates = parse_dates(array_rows(&v), "date");
                let status = FetchStatus::from_rows(!dates.is_empty());
                (dates, status)
            }
            Err(status) => {
                warn!(ticker, ?status, "dividend fetch failed");
                (BTreeSet::new(), status)
            }
        }
    }

    async fn fetch_earnings(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (BTreeSet<NaiveDate>, FetchStatus) {
        let mut query = Self::window(start, end);
        query.push(("symbols", ticker.to_string()));
        match self.get_json(ticker, "calendar/earnings", &query).await {
            Ok(v) => {
                let rows = v.get("earnings").map(array_rows).unwrap_or_default();
                let dates = parse_dates(rows, "report_date");
                let status = FetchStatus::from_rows(!dates.is_empty());
                (dates, status)
            }
            Err(status) => {
                warn!(ticker, ?status, "earnings fetch failed");
                (BTreeSet::new(), status)
            }
        }
    }

    async fn fetch_market_caps(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (MarketCapSeries, FetchStatus) {
        let requested = self
            .market_cap_aliases
            .get(ticker)
            .map(String::as_str)
            .unwrap_or(ticker);
        let api_path = format!("historical-market-cap/{requested}");
        match self
            .get_json(requested, &api_path, &Self::window(start, end))
            .await
        {
            Ok(v) => {
                let caps = parse_market_caps(ticker, &v);
                let status = FetchStatus::from_rows(!caps.is_empty());
                (caps, status)
            }
            Err(status) => {
                warn!(ticker, requested, ?status, "market cap fetch failed");
                (MarketCapSeries::new(), status)
            }
        }
    }
}

#[async_trait::async_trait]
impl SeriesProvider for EodhdProvider {
    fn source_name(&self) -> &'static str {
        "eodhd"
    }

    async fn fetch_ticker(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> TickerBundle {
        let (prices, price_status) = self.fetch_prices(ticker, start, end).await;
        let (earnings, earnings_status) = self.fetch_earnings(ticker, start, end).await;
        let (dividends, dividends_status) = self.fetch_dividends(ticker, start, end).await;
        let (market_caps, market_cap_status) = self.fetch_market_caps(ticker, start, end).await;

        let mut bundle = TickerBundle::empty(ticker);
        bundle.series.prices = prices;
        bundle.series.dividends = dividends;
        bundle.series.earnings = earnings;
        bundle.market_caps = market_caps;
        bundle.price_status = price_status;
        bundle.dividends_status = dividends_status;
        bundle.earnings_status = earnings_status;
        bundle.market_cap_status = market_cap_status;
        bundle
    }
}

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// Rows of a payload that is either a JSON array or an index-keyed object.
fn array_rows(v: &Value) -> Vec<&Value> {
    match v {
        Value::Array(a) => a.iter().collect(),
        Value::Object(m) => m.values().collect(),
        _ => Vec::new(),
    }
}

fn row_date(row: &Value, key: &str) -> Option<NaiveDate> {
    let s = row.get(key)?.as_str()?;
    NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()
}

fn parse_dates(rows: Vec<&Value>, key: &str) -> BTreeSet<NaiveDate> {
    rows.into_iter().filter_map(|r| row_date(r, key)).collect()
}

fn parse_eod(ticker: &str, v: &Value) -> PriceSeries {
    let mut out = PriceSeries::new();
    for row in array_rows(v) {
        let Some(date) = row_date(row, "date") else {
            warn!(ticker, "skipping eod row without a date");
            continue;
        };
        let raw = row.get("adjusted_close").unwrap_or(&Value::Null);
        match micros_from_json(raw, "adjusted_close") {
            Ok(px) => {
                out.insert(date, px);
            }
            Err(e) => warn!(ticker, %date, error = %e, "skipping eod row"),
        }
    }
    out
}

fn parse_market_caps(ticker: &str, v: &Value) -> MarketCapSeries {
    let mut out = MarketCapSeries::new();
    for row in array_rows(v) {
        let (Some(date), Some(value)) = (
            row_date(row, "date"),
            row.get("value").and_then(Value::as_f64),
        ) else {
            warn!(ticker, "skipping malformed market cap row");
            continue;
        };
        if value.is_finite() && value >= 0.0 {
            out.insert(date, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_path_excludes_token_and_sanitizes() {
        let cache = ResponseCache::new("/tmp/c");
        let p = cache.path_for(
            "AAPL.US",
            "calendar/earnings",
            &[("from", "2024-01-01".to_string()), ("symbols", "AAPL.US".to_string())],
        );
        assert_eq!(
            p,
            PathBuf::from("/tmp/c/AAPL_US/calendar_earnings/from_2024-01-01_symbols_AAPL_US.json")
        );
    }

    #[test]
    fn market_caps_accept_index_keyed_object() {
        let v = json!({
            "0": {"date": "2024-01-02", "value": 1.5e9},
            "1": {"date": "2024-01-09", "value": 1.6e9},
        });
        let caps = parse_market_caps("X", &v);
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn eod_skips_rows_without_price() {
        let v = json!([
            {"date": "2024-01-02", "adjusted_close": 10.0},
            {"date": "2024-01-03"},
        ]);
        assert_eq!(parse_eod("X", &v).len(), 1);
    }
}
