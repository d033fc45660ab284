//! TCBS public API client
//!
//! Price bars come from the stock-insight service, company profiles from
//! the tcanalysis service.

use crate::error::OrchestrationError;
use crate::market_data::{Candle, HistoryRequest, Interval, MarketDataProvider, Records};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://apipubaws.tcbs.com.vn";
const VN_OFFSET_SECS: i32 = 7 * 3600;
/// Continuous trading minutes in one HOSE session day
const SESSION_MINUTES: i64 = 270;

#[derive(Clone)]
pub struct TcbsProvider {
    client: Client,
    base_url: String,
}

impl TcbsProvider {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "TCBS request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::MarketData(format!("TCBS request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::MarketData(format!(
                "TCBS returned {} for {}: {}",
                status, path, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OrchestrationError::MarketData(format!("Invalid JSON response: {}", e)))
    }

    async fn company_records(&self, symbol: &str, endpoint: &str, list_key: &str) -> Result<Records> {
        let path = format!(
            "/tcanalysis/v1/company/{}/{}",
            normalize_symbol(symbol),
            endpoint
        );
        let body = self
            .get_json(&path, &[("page", "0".to_string()), ("size", "100".to_string())])
            .await?;

        extract_records(&body, list_key)
    }
}

#[async_trait]
impl MarketDataProvider for TcbsProvider {
    async fn history(&self, request: &HistoryRequest) -> Result<Vec<Candle>> {
        if request.start > request.end {
            return Ok(Vec::new());
        }

        let path = if request.interval.is_intraday() {
            "/stock-insight/v2/stock/bars"
        } else {
            "/stock-insight/v2/stock/bars-long-term"
        };

        let body = self.get_json(path, &history_query(request)).await?;
        parse_bars(&body, request)
    }

    async fn shareholders(&self, symbol: &str) -> Result<Records> {
        self.company_records(symbol, "large-share-holders", "listShareHolder")
            .await
    }

    async fn officers(&self, symbol: &str) -> Result<Records> {
        self.company_records(symbol, "key-officers", "listKeyOfficer")
            .await
    }

    async fn subsidiaries(&self, symbol: &str) -> Result<Records> {
        self.company_records(symbol, "sub-companies", "listSubCompany")
            .await
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn resolution(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1",
        Interval::FiveMinutes => "5",
        Interval::FifteenMinutes => "15",
        Interval::ThirtyMinutes => "30",
        Interval::OneHour => "60",
        Interval::OneDay => "D",
        Interval::OneWeek => "W",
        Interval::OneMonth => "M",
    }
}

/// The bars endpoints page backwards from `to`; rows before `start` are
/// dropped again in `parse_bars`.
fn history_query(request: &HistoryRequest) -> Vec<(&'static str, String)> {
    vec![
        ("ticker", normalize_symbol(&request.symbol)),
        ("type", "stock".to_string()),
        ("resolution", resolution(request.interval).to_string()),
        ("to", unix_end(request.end).to_string()),
        ("countBack", count_back(request).to_string()),
    ]
}

/// Bars needed to cover `start..=end` at the requested interval
fn count_back(request: &HistoryRequest) -> i64 {
    let trading_days = request
        .start
        .iter_days()
        .take_while(|day| *day <= request.end)
        .filter(|day| day.weekday().number_from_monday() <= 5)
        .count() as i64;

    let bars = match request.interval {
        Interval::OneDay => trading_days,
        Interval::OneWeek => trading_days / 5 + 1,
        Interval::OneMonth => {
            (request.end.year() - request.start.year()) as i64 * 12
                + request.end.month() as i64
                - request.start.month() as i64
                + 1
        }
        intraday => {
            let minutes = match intraday {
                Interval::OneMinute => 1,
                Interval::FiveMinutes => 5,
                Interval::FifteenMinutes => 15,
                Interval::ThirtyMinutes => 30,
                _ => 60,
            };
            trading_days * ((SESSION_MINUTES + minutes - 1) / minutes)
        }
    };

    bars.max(1)
}

fn vn_offset() -> Result<FixedOffset> {
    FixedOffset::east_opt(VN_OFFSET_SECS).ok_or_else(|| {
        OrchestrationError::MarketData("Invalid Vietnam UTC offset".to_string())
    })
}

fn unix_start(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() - VN_OFFSET_SECS as i64
}

fn unix_end(date: NaiveDate) -> i64 {
    unix_start(date) + 24 * 3600 - 1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trading_date: String,
}

fn parse_bars(body: &Value, request: &HistoryRequest) -> Result<Vec<Candle>> {
    let data = match body.get("data") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(OrchestrationError::MarketData(format!(
                "Unexpected bars payload: {}",
                other
            )))
        }
    };

    let offset = vn_offset()?;
    let mut candles = Vec::with_capacity(data.len());

    for item in data {
        let bar: RawBar = serde_json::from_value(item)
            .map_err(|e| OrchestrationError::MarketData(format!("Malformed bar: {}", e)))?;

        let timestamp = DateTime::parse_from_rfc3339(&bar.trading_date)
            .map_err(|e| {
                OrchestrationError::MarketData(format!(
                    "Malformed trading date '{}': {}",
                    bar.trading_date, e
                ))
            })?
            .with_timezone(&offset);

        let day = timestamp.date_naive();
        if day < request.start || day > request.end {
            continue;
        }

        let time = if request.interval.is_intraday() {
            timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            day.format(crate::market_data::DATE_FORMAT).to_string()
        };

        candles.push(Candle {
            time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume.max(0.0).round() as u64,
        });
    }

    Ok(candles)
}

fn extract_records(body: &Value, list_key: &str) -> Result<Records> {
    match body.get(list_key) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(OrchestrationError::MarketData(format!(
            "Unexpected '{}' payload: {}",
            list_key, other
        ))),
    }
}
