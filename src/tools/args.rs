//! Argument schemas and validation shared by the market tools
//!
//! Validation happens before any collaborator call. Every failure is a
//! Vietnamese message handed back to the model as the tool result.

use crate::market_data::{parse_date, HistoryRequest, Interval};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_START: &str = "2024-01-01";
pub const DEFAULT_END: &str = "2024-12-31";
pub const DEFAULT_INTERVAL: &str = "1D";
pub const OHLCV_COLUMNS: [&str; 6] = ["time", "open", "high", "low", "close", "volume"];

fn default_start() -> String {
    DEFAULT_START.to_string()
}

fn default_end() -> String {
    DEFAULT_END.to_string()
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeArgs {
    pub symbol: String,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub period: Option<f64>,
}

/// Range arguments that passed validation
#[derive(Debug, Clone)]
pub struct ValidRange {
    pub request: HistoryRequest,
    /// Original strings, echoed back in messages
    pub start: String,
    pub end: String,
}

/// Deserialize tool arguments; `null` counts as an empty object.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, String> {
    let args = if args.is_null() { json!({}) } else { args.clone() };

    serde_json::from_value(args)
        .map_err(|e| format!("Tham số không hợp lệ cho công cụ {}: {}", tool, e))
}

pub fn require_symbol(tool: &str, symbol: &str) -> Result<String, String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(format!(
            "Tham số không hợp lệ cho công cụ {}: mã cổ phiếu không được để trống",
            tool
        ));
    }
    Ok(symbol.to_uppercase())
}

pub fn validate_interval(raw: &str) -> Result<Interval, String> {
    raw.parse::<Interval>().map_err(|_| {
        format!(
            "Khung thời gian không hợp lệ. Các khung thời gian có sẵn: {}",
            Interval::available()
        )
    })
}

pub fn validate_columns(columns: &[String]) -> Result<(), String> {
    let invalid: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| !OHLCV_COLUMNS.contains(c))
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Cột không hợp lệ: {}. Các cột có sẵn: {}",
            invalid.join(", "),
            OHLCV_COLUMNS.join(", ")
        ))
    }
}

/// `label` is SMA or RSI
pub fn validate_period(label: &str, period: f64) -> Result<usize, String> {
    if period <= 0.0 {
        return Err(format!(
            "Chu kỳ {} phải là số dương. Giá trị nhận được: {}",
            label, period
        ));
    }
    if period.fract() != 0.0 {
        return Err(format!(
            "Chu kỳ {} phải là số nguyên. Giá trị nhận được: {}",
            label, period
        ));
    }
    Ok(period as usize)
}

pub fn validate_range(tool: &str, args: &RangeArgs) -> Result<ValidRange, String> {
    let symbol = require_symbol(tool, &args.symbol)?;
    let interval = validate_interval(&args.interval)?;
    let start = parse_date(&args.start).map_err(|_| invalid_date(&args.start))?;
    let end = parse_date(&args.end).map_err(|_| invalid_date(&args.end))?;

    Ok(ValidRange {
        request: HistoryRequest {
            symbol,
            start,
            end,
            interval,
        },
        start: args.start.clone(),
        end: args.end.clone(),
    })
}

fn invalid_date(raw: &str) -> String {
    format!("Ngày không hợp lệ: '{}'. Định dạng đúng là YYYY-MM-DD", raw)
}

pub fn no_ohlcv_message(range: &ValidRange) -> String {
    format!(
        "Không tìm thấy dữ liệu OHLCV cho mã {} từ {} đến {} với khung thời gian {}",
        range.request.symbol, range.start, range.end, range.request.interval
    )
}

//
// ================= JSON Schemas =================
//

pub fn symbol_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": {
                "type": "string",
                "description": "Stock symbol of the Vietnamese company (e.g., 'VIC', 'VCB')"
            }
        },
        "required": ["symbol"]
    })
}

/// Schema for range-based tools; `extra` adds tool-specific properties.
pub fn range_schema(extra: Value) -> Value {
    let mut properties = json!({
        "symbol": {
            "type": "string",
            "description": "Mã cổ phiếu (ví dụ: VCB, VIC, FPT)"
        },
        "start": {
            "type": "string",
            "description": format!("Ngày bắt đầu (YYYY-MM-DD), mặc định {}", DEFAULT_START)
        },
        "end": {
            "type": "string",
            "description": format!("Ngày kết thúc (YYYY-MM-DD), mặc định {}", DEFAULT_END)
        },
        "interval": {
            "type": "string",
            "description": format!("Khung thời gian, mặc định {}", DEFAULT_INTERVAL),
            "enum": Interval::ALL.iter().map(|i| i.as_str()).collect::<Vec<_>>()
        }
    });

    if let (Some(target), Value::Object(additions)) = (properties.as_object_mut(), extra) {
        target.extend(additions);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": ["symbol"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_defaults() {
        let args: RangeArgs = parse_args("view_ohlcv", &json!({"symbol": "vcb"})).unwrap();
        assert_eq!(args.start, DEFAULT_START);
        assert_eq!(args.end, DEFAULT_END);
        assert_eq!(args.interval, DEFAULT_INTERVAL);
        assert!(args.columns.is_none());

        let valid = validate_range("view_ohlcv", &args).unwrap();
        assert_eq!(valid.request.symbol, "VCB");
        assert_eq!(valid.request.interval, Interval::OneDay);
    }

    #[test]
    fn test_missing_symbol_is_rejected() {
        let err = parse_args::<SymbolArgs>("view_shareholders", &Value::Null).unwrap_err();
        assert!(err.starts_with("Tham số không hợp lệ cho công cụ view_shareholders"));

        let err = require_symbol("view_shareholders", "  ").unwrap_err();
        assert!(err.contains("mã cổ phiếu"));
    }

    #[test]
    fn test_invalid_interval_message() {
        let err = validate_interval("2H").unwrap_err();
        assert_eq!(
            err,
            "Khung thời gian không hợp lệ. Các khung thời gian có sẵn: 1m, 5m, 15m, 30m, 1H, 1D, 1W, 1M"
        );
    }

    #[test]
    fn test_invalid_columns_message() {
        let columns = vec!["close".to_string(), "vwap".to_string()];
        let err = validate_columns(&columns).unwrap_err();
        assert_eq!(
            err,
            "Cột không hợp lệ: vwap. Các cột có sẵn: time, open, high, low, close, volume"
        );
        assert!(validate_columns(&["open".to_string()]).is_ok());
    }

    #[test]
    fn test_period_validation() {
        assert_eq!(validate_period("SMA", 20.0), Ok(20));
        assert_eq!(
            validate_period("SMA", 0.0).unwrap_err(),
            "Chu kỳ SMA phải là số dương. Giá trị nhận được: 0"
        );
        assert!(validate_period("RSI", -3.0).unwrap_err().contains("-3"));
        assert!(validate_period("RSI", 2.5).is_err());
    }

    #[test]
    fn test_range_schema_merges_extra_properties() {
        let schema = range_schema(json!({"period": {"type": "integer"}}));
        assert!(schema["properties"]["period"].is_object());
        assert_eq!(schema["properties"]["interval"]["enum"][7], "1M");
    }
}
