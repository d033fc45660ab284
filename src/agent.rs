//! Tool-calling agent
//!
//! START → REASON → INVOKE → REASON ... → FINAL
//!
//! One loop serves both variants. The conversational agent always lets the
//! model write the final answer; the direct agent hands back the last tool
//! result of a turn verbatim when that tool is flagged return-direct.

use crate::llm::{ChatModel, Message, Role};
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const VN_OFFSET_SECS: i32 = 7 * 3600;

/// Anything that turns one query into an agent result object
/// `{input, output, messages}`.
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn invoke(&self, input: &str) -> Result<Value>;
}

/// Final state of one agent pass
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub input: String,
    pub output: String,
    pub messages: Vec<Message>,
    pub steps: usize,
}

impl AgentRun {
    pub fn to_value(&self) -> Value {
        json!({
            "input": self.input,
            "output": self.output,
            "messages": self.messages,
        })
    }
}

pub struct ToolCallingAgent {
    model: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    max_steps: usize,
}

impl ToolCallingAgent {
    pub fn new(model: Arc<dyn ChatModel>, registry: ToolRegistry, max_steps: usize) -> Self {
        Self {
            model,
            registry,
            max_steps,
        }
    }

    /// Model writes the final answer after seeing tool results
    pub fn conversational(model: Arc<dyn ChatModel>, registry: &ToolRegistry, max_steps: usize) -> Self {
        Self::new(model, registry.with_return_direct(false), max_steps)
    }

    /// Tool results are returned unchanged as the answer
    pub fn direct(model: Arc<dyn ChatModel>, registry: &ToolRegistry, max_steps: usize) -> Self {
        Self::new(model, registry.with_return_direct(true), max_steps)
    }

    pub async fn run(&self, input: &str) -> Result<AgentRun> {
        let mut messages = vec![
            Message::system(system_prompt(&today_in_vietnam())),
            Message::user(input),
        ];
        let declarations = self.registry.declarations();

        for step in 1..=self.max_steps {
            let turn = self.model.generate(&messages, &declarations).await?;

            if !turn.has_tool_calls() {
                let output = turn.text.unwrap_or_default();
                messages.push(Message::model(output.clone(), Vec::new()));
                debug!(step, "Agent produced final answer");
                return Ok(self.finish(input, output, messages, step));
            }

            let calls = turn.tool_calls.clone();
            messages.push(Message::model(turn.text.unwrap_or_default(), turn.tool_calls));

            let mut direct_output = None;
            for call in &calls {
                let outcome = self.registry.invoke(&call.name, &call.arguments).await;
                info!(
                    step,
                    tool_name = %call.name,
                    rejected = outcome.rejected,
                    "Agent tool call"
                );

                direct_output = if self.registry.is_return_direct(&call.name) && !outcome.rejected {
                    Some(outcome.content.clone())
                } else {
                    None
                };
                messages.push(Message::tool(&call.name, outcome.content));
            }

            if let Some(output) = direct_output {
                return Ok(self.finish(input, output, messages, step));
            }
        }

        warn!(max_steps = self.max_steps, "Agent step budget exhausted");
        let output = format!(
            "Không thể hoàn thành yêu cầu trong giới hạn {} bước xử lý.",
            self.max_steps
        );
        Ok(self.finish(input, output, messages, self.max_steps))
    }

    fn finish(&self, input: &str, output: String, messages: Vec<Message>, steps: usize) -> AgentRun {
        AgentRun {
            input: input.to_string(),
            output,
            messages,
            steps,
        }
    }
}

#[async_trait]
impl QueryAgent for ToolCallingAgent {
    async fn invoke(&self, input: &str) -> Result<Value> {
        Ok(self.run(input).await?.to_value())
    }
}

pub fn system_prompt(today: &str) -> String {
    format!(
        "Bạn là một trợ lý tài chính thông minh chuyên về thị trường chứng khoán Việt Nam.
Bạn có thể truy cập dữ liệu từ vnstocks.com để cung cấp thông tin chính xác.
Sử dụng các công cụ có sẵn để truy xuất dữ liệu.
Luôn hiển thị kết quả bằng tiếng Việt và định dạng dễ đọc.
Nếu không thể tìm thấy thông tin, hãy nói rõ.
Hôm nay là ngày {}.",
        today
    )
}

/// Today's date (YYYY-MM-DD) in Vietnam time
pub fn today_in_vietnam() -> String {
    let now = Utc::now();
    match FixedOffset::east_opt(VN_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        None => now.format("%Y-%m-%d").to_string(),
    }
}

/// Pull the answer text out of an agent result.
///
/// Tries a string `output` field, then the last non-empty model message,
/// then falls back to a diagnostic that names what was received.
pub fn extract_answer(result: &Value) -> String {
    if let Some(Value::String(output)) = result.get("output") {
        return output.clone();
    }

    if let Some(Value::Array(messages)) = result.get("messages") {
        let last_model_text = messages.iter().rev().find_map(|message| {
            let role = serde_json::from_value::<Role>(message.get("role")?.clone()).ok()?;
            let content = message.get("content")?.as_str()?;
            (role == Role::Model && !content.trim().is_empty()).then(|| content.to_string())
        });
        if let Some(text) = last_model_text {
            return text;
        }
    }

    match result {
        Value::String(text) => text.clone(),
        other => format!(
            "Lỗi khi trích xuất câu trả lời: không tìm thấy trường 'output' hoặc 'messages' (kiểu dữ liệu: {}). Kết quả: {}",
            value_kind(other),
            other
        ),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelTurn;
    use crate::test_support::{tool_call, ScriptedModel, StaticProvider};
    use crate::tools::create_default_registry;
    use std::time::Duration;

    fn registry() -> (ToolRegistry, Arc<StaticProvider>) {
        let provider = Arc::new(StaticProvider::with_sample_data());
        (
            create_default_registry(provider.clone(), Duration::from_secs(5)),
            provider,
        )
    }

    #[tokio::test]
    async fn test_conversational_agent_synthesizes_after_tool() {
        let (registry, provider) = registry();
        let model = Arc::new(ScriptedModel::new(vec![
            ModelTurn::calls(vec![tool_call("view_shareholders", json!({"symbol": "VCB"}))]),
            ModelTurn::text("Cổ đông lớn nhất của VCB là Ngân hàng Nhà nước Việt Nam."),
        ]));
        let agent = ToolCallingAgent::conversational(model.clone(), &registry, 15);

        let run = agent.run("Ai là cổ đông lớn của VCB?").await.unwrap();

        assert_eq!(run.output, "Cổ đông lớn nhất của VCB là Ngân hàng Nhà nước Việt Nam.");
        assert_eq!(run.steps, 2);
        assert_eq!(model.calls(), 2);
        assert_eq!(model.tools_offered(0), 7);
        assert_eq!(provider.calls(), 1);

        // second request carries the tool result back to the model
        let second = model.request(1);
        let tool_message = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_message.tool_name.as_deref(), Some("view_shareholders"));
        assert!(tool_message.content.contains("Ngân hàng Nhà nước Việt Nam"));
    }

    #[tokio::test]
    async fn test_system_prompt_carries_today() {
        let (registry, _) = registry();
        let model = Arc::new(ScriptedModel::texts(&["Xin chào"]));
        let agent = ToolCallingAgent::conversational(model.clone(), &registry, 15);

        agent.run("Chào bạn").await.unwrap();

        let first = model.request(0);
        assert_eq!(first[0].role, Role::System);
        assert!(first[0]
            .content
            .contains(&format!("Hôm nay là ngày {}.", today_in_vietnam())));
        assert_eq!(first[1].content, "Chào bạn");
    }

    #[tokio::test]
    async fn test_direct_agent_returns_tool_output_verbatim() {
        let (registry, _) = registry();
        let model = Arc::new(ScriptedModel::new(vec![ModelTurn::calls(vec![tool_call(
            "calculate_total_volume",
            json!({"symbol": "VCB", "start": "2024-01-02", "end": "2024-01-04"}),
        )])]));
        let agent = ToolCallingAgent::direct(model.clone(), &registry, 15);

        let run = agent.run("Tổng khối lượng VCB đầu tháng 1/2024").await.unwrap();

        assert_eq!(run.output, "3300");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_direct_agent_retries_after_rejected_call() {
        let (registry, provider) = registry();
        let model = Arc::new(ScriptedModel::new(vec![
            ModelTurn::calls(vec![tool_call("calculate_sma", json!({"symbol": "VCB", "period": 0}))]),
            ModelTurn::calls(vec![tool_call("get_price", json!({"symbol": "VCB"}))]),
            ModelTurn::calls(vec![tool_call("view_management", json!({"symbol": "VCB"}))]),
        ]));
        let agent = ToolCallingAgent::direct(model.clone(), &registry, 15);

        let run = agent.run("Ban lãnh đạo VCB").await.unwrap();

        assert_eq!(model.calls(), 3);
        assert_eq!(provider.calls(), 1);
        assert!(run.output.contains("Phạm Quang Dũng"));

        let rejected: Vec<&Message> = run
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert!(rejected[0].content.starts_with("Chu kỳ SMA phải là số dương"));
        assert!(rejected[1].content.starts_with("Công cụ không tồn tại: get_price"));
    }

    #[tokio::test]
    async fn test_direct_agent_surfaces_failure_text() {
        let provider = Arc::new(StaticProvider::failing("connection refused"));
        let registry = create_default_registry(provider, Duration::from_secs(5));
        let model = Arc::new(ScriptedModel::new(vec![ModelTurn::calls(vec![tool_call(
            "view_subsidiaries",
            json!({"symbol": "VIC"}),
        )])]));
        let agent = ToolCallingAgent::direct(model, &registry, 15);

        let run = agent.run("Công ty con của VIC").await.unwrap();

        assert!(run.output.starts_with("Lỗi khi lấy thông tin công ty con cho mã VIC"));
    }

    #[tokio::test]
    async fn test_step_budget_exhaustion_is_an_answer() {
        let (registry, _) = registry();
        let turns = (0..3)
            .map(|_| ModelTurn::calls(vec![tool_call("view_ohlcv", json!({"symbol": "VCB"}))]))
            .collect();
        let model = Arc::new(ScriptedModel::new(turns));
        let agent = ToolCallingAgent::conversational(model.clone(), &registry, 3);

        let run = agent.run("Giá VCB").await.unwrap();

        assert_eq!(model.calls(), 3);
        assert_eq!(run.steps, 3);
        assert!(run.output.starts_with("Không thể hoàn thành yêu cầu"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let (registry, _) = registry();
        let model = Arc::new(ScriptedModel::default());
        let agent = ToolCallingAgent::conversational(model, &registry, 15);

        tokio_test::assert_err!(agent.invoke("Giá VCB").await);
    }

    #[tokio::test]
    async fn test_invoke_shape() {
        let (registry, _) = registry();
        let model = Arc::new(ScriptedModel::texts(&["Giá đóng cửa là 86.0"]));
        let agent = ToolCallingAgent::conversational(model, &registry, 15);

        let value = agent.invoke("Giá VCB").await.unwrap();

        assert_eq!(value["input"], "Giá VCB");
        assert_eq!(value["output"], "Giá đóng cửa là 86.0");
        assert_eq!(value["messages"].as_array().unwrap().len(), 3);
        assert_eq!(extract_answer(&value), "Giá đóng cửa là 86.0");
    }

    #[test]
    fn test_extract_answer_priority() {
        let flat = json!({"output": "A", "messages": [{"role": "model", "content": "B"}]});
        assert_eq!(extract_answer(&flat), "A");

        let messages = json!({
            "messages": [
                {"role": "user", "content": "hỏi"},
                {"role": "model", "content": "B"},
                {"role": "tool", "content": "dữ liệu", "tool_name": "view_ohlcv"},
                {"role": "model", "content": "  "}
            ]
        });
        assert_eq!(extract_answer(&messages), "B");

        assert_eq!(extract_answer(&json!("văn bản")), "văn bản");
    }

    #[test]
    fn test_extract_answer_diagnostic_fallback() {
        let unknown = json!({"result": 42});
        let text = extract_answer(&unknown);
        assert!(text.contains("kiểu dữ liệu: object"));
        assert!(text.contains("{\"result\":42}"));

        let number = extract_answer(&json!(7));
        assert!(number.contains("kiểu dữ liệu: number"));
    }
}
