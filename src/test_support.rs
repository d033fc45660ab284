//! Test doubles: a scripted model and an in-memory market data provider

use crate::error::OrchestrationError;
use crate::llm::{ChatModel, FunctionDeclaration, Message, ModelTurn, ToolCall};
use crate::market_data::{Candle, HistoryRequest, MarketDataProvider, Records};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn tool_call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments,
    }
}

/// Model that replays a fixed list of turns and records every request
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<(Vec<Message>, usize)>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| ModelTurn::text(*t)).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Messages of the `index`-th request
    pub fn request(&self, index: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[index].0.clone()
    }

    /// Number of tool declarations sent with the `index`-th request
    pub fn tools_offered(&self, index: usize) -> usize {
        self.requests.lock().unwrap()[index].1
    }

    /// Last user message of every request, in order
    pub fn user_inputs(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(messages, _)| {
                messages
                    .iter()
                    .rev()
                    .find(|m| m.role == crate::llm::Role::User)
                    .map(|m| m.content.clone())
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[FunctionDeclaration],
    ) -> Result<ModelTurn> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.len()));

        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OrchestrationError::LlmError("script exhausted".to_string()))
    }
}

/// In-memory provider. The same data is served for every symbol.
#[derive(Default)]
pub struct StaticProvider {
    candles: Vec<Candle>,
    shareholders: Records,
    officers: Records,
    subsidiaries: Records,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub const SAMPLE_DAYS: usize = 10;

    /// Ten daily bars from 2024-01-02 with volumes 1000, 1100, ...
    pub fn with_sample_data() -> Self {
        let closes = [80.0, 81.0, 80.5, 82.0, 83.0, 82.5, 84.0, 85.0, 84.0, 86.0];
        let first = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                time: (first + chrono::Duration::days(i as i64))
                    .format("%Y-%m-%d")
                    .to_string(),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1000 + 100 * i as u64,
            })
            .collect();

        Self {
            candles,
            shareholders: records(json!([
                {"no": 1, "name": "Ngân hàng Nhà nước Việt Nam", "ownPercent": 0.748},
                {"no": 2, "name": "Mizuho Bank Limited", "ownPercent": 0.15}
            ])),
            officers: records(json!([
                {"name": "Phạm Quang Dũng", "position": "Chủ tịch HĐQT", "ownPercent": 0.0}
            ])),
            subsidiaries: records(json!([
                {"companyName": "Công ty TNHH Chứng khoán Vietcombank", "ownPercent": 1.0}
            ])),
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(OrchestrationError::MarketData(message.clone())),
            None => Ok(()),
        }
    }
}

fn records(value: Value) -> Records {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn history(&self, request: &HistoryRequest) -> Result<Vec<Candle>> {
        self.enter().await?;

        Ok(self
            .candles
            .iter()
            .filter(|candle| {
                NaiveDate::parse_from_str(&candle.time[..10], "%Y-%m-%d")
                    .map(|day| day >= request.start && day <= request.end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn shareholders(&self, _symbol: &str) -> Result<Records> {
        self.enter().await?;
        Ok(self.shareholders.clone())
    }

    async fn officers(&self, _symbol: &str) -> Result<Records> {
        self.enter().await?;
        Ok(self.officers.clone())
    }

    async fn subsidiaries(&self, _symbol: &str) -> Result<Records> {
        self.enter().await?;
        Ok(self.subsidiaries.clone())
    }
}

/// Agent that echoes its input and records every invocation
#[derive(Default)]
pub struct RecordingAgent {
    inputs: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingAgent {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl crate::agent::QueryAgent for RecordingAgent {
    async fn invoke(&self, input: &str) -> Result<Value> {
        self.inputs.lock().unwrap().push(input.to_string());
        if self.fail {
            return Err(OrchestrationError::LlmError("agent unavailable".to_string()));
        }
        Ok(json!({
            "input": input,
            "output": format!("Trả lời: {}", input),
        }))
    }
}
