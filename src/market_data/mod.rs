//! Market data collaborator
//!
//! Every call is a fresh fetch against the upstream provider. No caching,
//! no retries.

use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub mod tcbs;
pub use tcbs::TcbsProvider;

/// JSON record set as returned by company lookups
pub type Records = Vec<Map<String, Value>>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 8] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1H",
            Interval::OneDay => "1D",
            Interval::OneWeek => "1W",
            Interval::OneMonth => "1M",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Interval::OneMinute
                | Interval::FiveMinutes
                | Interval::FifteenMinutes
                | Interval::ThirtyMinutes
                | Interval::OneHour
        )
    }

    /// Comma-separated list used in validation messages
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Interval {
    type Err = ();

    // Case-sensitive: "1m" is a minute, "1M" a month.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Inclusive date range request for price history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        crate::error::OrchestrationError::InvalidParameter(format!(
            "Ngày '{}' không đúng định dạng YYYY-MM-DD",
            raw
        ))
    })
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Ordered bars in `[start, end]`; empty when nothing is listed.
    async fn history(&self, request: &HistoryRequest) -> Result<Vec<Candle>>;

    async fn shareholders(&self, symbol: &str) -> Result<Records>;

    async fn officers(&self, symbol: &str) -> Result<Records>;

    async fn subsidiaries(&self, symbol: &str) -> Result<Records>;
}
