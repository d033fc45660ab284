//! Indicator tools: OHLCV records plus one indicator column

use super::args::{range_schema, validate_period};
use super::price::{candle_records, failure, load_history, range_from_args};
use super::{Tool, ToolOutcome};
use crate::indicators::{self, round2};
use crate::market_data::MarketDataProvider;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indicator {
    Sma,
    Rsi,
}

impl Indicator {
    fn label(self) -> &'static str {
        match self {
            Indicator::Sma => "SMA",
            Indicator::Rsi => "RSI",
        }
    }

    fn default_period(self) -> f64 {
        match self {
            Indicator::Sma => 20.0,
            Indicator::Rsi => 14.0,
        }
    }

    fn compute(self, closes: &[f64], period: usize) -> Vec<Option<f64>> {
        match self {
            Indicator::Sma => indicators::sma(closes, period),
            Indicator::Rsi => indicators::rsi(closes, period),
        }
    }
}

async fn run_indicator(
    tool: &str,
    indicator: Indicator,
    provider: &dyn MarketDataProvider,
    args: &Value,
) -> ToolOutcome {
    let (parsed, range) = match range_from_args(tool, args) {
        Ok(valid) => valid,
        Err(outcome) => return outcome,
    };

    let period = parsed.period.unwrap_or_else(|| indicator.default_period());
    let period = match validate_period(indicator.label(), period) {
        Ok(period) => period,
        Err(message) => return ToolOutcome::rejected(message),
    };

    let action = format!("tính toán {}", indicator.label());
    let candles = match load_history(tool, &action, provider, &range).await {
        Ok(candles) => candles,
        Err(outcome) => return outcome,
    };

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let values = indicator.compute(&closes, period);
    let column = format!("{}_{}", indicator.label(), period);

    let records = candle_records(&candles).map(|records| {
        records
            .into_iter()
            .zip(values)
            .map(|(mut record, value)| {
                record.insert(column.clone(), json!(value.map(round2)));
                record
            })
            .collect::<Vec<_>>()
    });

    match records.and_then(|records| serde_json::to_string(&records)) {
        Ok(json) => ToolOutcome::ok(json),
        Err(e) => ToolOutcome::ok(failure(&action, &range.request.symbol, e)),
    }
}

pub struct CalculateSmaTool {
    provider: Arc<dyn MarketDataProvider>,
}

impl CalculateSmaTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Tool for CalculateSmaTool {
    fn name(&self) -> &'static str {
        "calculate_sma"
    }

    fn description(&self) -> &'static str {
        "Tính toán đường trung bình động đơn giản (SMA) cho cổ phiếu Việt Nam. Trả về dữ liệu OHLCV kèm theo cột SMA."
    }

    fn parameters(&self) -> Value {
        range_schema(json!({
            "period": {
                "type": "integer",
                "description": "Chu kỳ tính SMA (ví dụ: 20 cho SMA 20 ngày), mặc định 20"
            }
        }))
    }

    async fn run(&self, args: &Value) -> ToolOutcome {
        run_indicator(self.name(), Indicator::Sma, self.provider.as_ref(), args).await
    }
}

pub struct CalculateRsiTool {
    provider: Arc<dyn MarketDataProvider>,
}

impl CalculateRsiTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Tool for CalculateRsiTool {
    fn name(&self) -> &'static str {
        "calculate_rsi"
    }

    fn description(&self) -> &'static str {
        "Tính toán chỉ số sức mạnh tương đối (RSI) cho cổ phiếu Việt Nam. Trả về dữ liệu OHLCV kèm theo cột RSI."
    }

    fn parameters(&self) -> Value {
        range_schema(json!({
            "period": {
                "type": "integer",
                "description": "Chu kỳ tính RSI (ví dụ: 14 cho RSI 14 ngày), mặc định 14"
            }
        }))
    }

    async fn run(&self, args: &Value) -> ToolOutcome {
        run_indicator(self.name(), Indicator::Rsi, self.provider.as_ref(), args).await
    }
}
