//! Price history tools and the shared history loader used by indicators

use super::args::{
    no_ohlcv_message, parse_args, range_schema, validate_columns, validate_range, RangeArgs,
    ValidRange,
};
use super::{Tool, ToolOutcome};
use crate::market_data::{Candle, MarketDataProvider, Records};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Parse and validate range arguments for `tool`.
pub(super) fn range_from_args(tool: &str, args: &Value) -> Result<(RangeArgs, ValidRange), ToolOutcome> {
    let parsed: RangeArgs = parse_args(tool, args).map_err(ToolOutcome::rejected)?;
    let range = validate_range(tool, &parsed).map_err(ToolOutcome::rejected)?;
    Ok((parsed, range))
}

/// Fetch candles for a validated range. Empty results and collaborator
/// failures come back as the finished outcome.
pub(super) async fn load_history(
    tool: &str,
    action: &str,
    provider: &dyn MarketDataProvider,
    range: &ValidRange,
) -> Result<Vec<Candle>, ToolOutcome> {
    match provider.history(&range.request).await {
        Ok(candles) if candles.is_empty() => Err(ToolOutcome::ok(no_ohlcv_message(range))),
        Ok(candles) => Ok(candles),
        Err(e) => {
            warn!(tool_name = %tool, symbol = %range.request.symbol, error = %e, "History fetch failed");
            Err(ToolOutcome::ok(failure(action, &range.request.symbol, e)))
        }
    }
}

pub(super) fn failure(action: &str, symbol: &str, detail: impl std::fmt::Display) -> String {
    format!("Lỗi khi {} cho mã {}: {}", action, symbol, detail)
}

pub(super) fn candle_records(candles: &[Candle]) -> Result<Records, serde_json::Error> {
    candles
        .iter()
        .map(|candle| match serde_json::to_value(candle)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        })
        .collect()
}

/// Keep only `columns`, with `time` always first when absent from the list.
/// An empty selection keeps every column.
fn select_columns(records: Records, columns: &[String]) -> Records {
    if columns.is_empty() {
        return records;
    }

    let mut selected: Vec<&str> = Vec::with_capacity(columns.len() + 1);
    if !columns.iter().any(|c| c == "time") {
        selected.push("time");
    }
    selected.extend(columns.iter().map(String::as_str));

    records
        .into_iter()
        .map(|mut record| {
            selected
                .iter()
                .filter_map(|column| record.remove(*column).map(|v| (column.to_string(), v)))
                .collect()
        })
        .collect()
}

pub struct ViewOhlcvTool {
    provider: Arc<dyn MarketDataProvider>,
}

impl ViewOhlcvTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Tool for ViewOhlcvTool {
    fn name(&self) -> &'static str {
        "view_ohlcv"
    }

    fn description(&self) -> &'static str {
        "Get OHLCV (Open, High, Low, Close, Volume) data for a Vietnamese stock symbol with specified timeframe and date range. You can select specific columns like 'open', 'close', 'volume', etc. Use this when you need historical price data, trading volume, or technical analysis data."
    }

    fn parameters(&self) -> Value {
        range_schema(json!({
            "columns": {
                "type": "array",
                "items": {"type": "string", "enum": super::args::OHLCV_COLUMNS},
                "description": "List of columns to return. If not specified, all columns will be returned."
            }
        }))
    }

    async fn run(&self, args: &Value) -> ToolOutcome {
        let (parsed, range) = match range_from_args(self.name(), args) {
            Ok(valid) => valid,
            Err(outcome) => return outcome,
        };

        let columns = parsed.columns.unwrap_or_default();
        if let Err(message) = validate_columns(&columns) {
            return ToolOutcome::rejected(message);
        }

        let action = "lấy dữ liệu OHLCV";
        let candles = match load_history(self.name(), action, self.provider.as_ref(), &range).await {
            Ok(candles) => candles,
            Err(outcome) => return outcome,
        };

        let symbol = &range.request.symbol;
        match candle_records(&candles).and_then(|records| serde_json::to_string(&select_columns(records, &columns))) {
            Ok(json) => ToolOutcome::ok(json),
            Err(e) => ToolOutcome::ok(failure(action, symbol, e)),
        }
    }
}

pub struct CalculateTotalVolumeTool {
    provider: Arc<dyn MarketDataProvider>,
}

impl CalculateTotalVolumeTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Tool for CalculateTotalVolumeTool {
    fn name(&self) -> &'static str {
        "calculate_total_volume"
    }

    fn description(&self) -> &'static str {
        "Tính tổng khối lượng giao dịch của cổ phiếu Việt Nam trong khoảng thời gian chỉ định. Trả về tổng khối lượng."
    }

    fn parameters(&self) -> Value {
        range_schema(json!({}))
    }

    async fn run(&self, args: &Value) -> ToolOutcome {
        let (_, range) = match range_from_args(self.name(), args) {
            Ok(valid) => valid,
            Err(outcome) => return outcome,
        };

        match load_history(self.name(), "tính tổng khối lượng", self.provider.as_ref(), &range).await {
            Ok(candles) => {
                let total: u64 = candles.iter().map(|c| c.volume).sum();
                ToolOutcome::ok(total.to_string())
            }
            Err(outcome) => outcome,
        }
    }
}
