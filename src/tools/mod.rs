//! Tool trait and registry
//!
//! Tools wrap the market data collaborator. They never fail past their
//! boundary: every error becomes a message the model can read.

use crate::llm::FunctionDeclaration;
use crate::market_data::MarketDataProvider;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub mod args;
pub mod company;
pub mod price;
pub mod technical;

pub use company::CompanyTool;
pub use price::{CalculateTotalVolumeTool, ViewOhlcvTool};
pub use technical::{CalculateRsiTool, CalculateSmaTool};

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    /// Arguments failed validation; the collaborator was not called
    pub rejected: bool,
}

impl ToolOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rejected: false,
        }
    }

    pub fn rejected(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rejected: true,
        }
    }
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    async fn run(&self, args: &Value) -> ToolOutcome;

    /// Blocking entry point with the same behavior as `run`
    fn run_blocking(&self, args: &Value) -> ToolOutcome {
        block_on_scoped(self.name(), || self.run(args))
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for looking up and invoking tools by name
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    return_direct: bool,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            return_direct: false,
            timeout,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Same tools, with every tool flagged return-direct (or not)
    pub fn with_return_direct(&self, return_direct: bool) -> Self {
        Self {
            return_direct,
            ..self.clone()
        }
    }

    pub fn is_return_direct(&self, name: &str) -> bool {
        self.return_direct && self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.declaration())
            .collect()
    }

    /// Look up and run a tool. Unknown names and timeouts become messages.
    pub async fn invoke(&self, name: &str, args: &Value) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            warn!(tool_name = %name, "Unknown tool requested");
            return self.unknown_tool(name);
        };

        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, tool.run(args)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tool_name = %name, "Tool execution timed out");
                ToolOutcome::ok(format!(
                    "Lỗi khi gọi công cụ {}: hết thời gian chờ sau {} giây",
                    name,
                    self.timeout.as_secs_f32()
                ))
            }
        };

        debug!(
            tool_name = %name,
            rejected = outcome.rejected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool invoked"
        );

        outcome
    }

    /// Blocking `invoke`, with the same lookup and timeout
    pub fn invoke_blocking(&self, name: &str, args: &Value) -> ToolOutcome {
        block_on_scoped(name, || self.invoke(name, args))
    }

    fn unknown_tool(&self, name: &str) -> ToolOutcome {
        ToolOutcome::rejected(format!(
            "Công cụ không tồn tại: {}. Các công cụ có sẵn: {}",
            name,
            self.list().join(", ")
        ))
    }
}

/// Drive a tool future to completion on a dedicated thread with its own
/// runtime. Safe to call from inside another runtime.
fn block_on_scoped<F, Fut>(tool_name: &str, make_future: F) -> ToolOutcome
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = ToolOutcome>,
{
    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(make_future()),
                    Err(e) => ToolOutcome::ok(format!(
                        "Lỗi khi khởi tạo môi trường thực thi cho công cụ {}: {}",
                        tool_name, e
                    )),
                }
            })
            .join()
            .unwrap_or_else(|_| ToolOutcome::ok(format!("Công cụ {} bị dừng đột ngột", tool_name)))
    })
}

/// Registry with the seven market tools, in catalog order.
pub fn create_default_registry(
    provider: Arc<dyn MarketDataProvider>,
    timeout: Duration,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new(timeout);

    registry.register(Arc::new(ViewOhlcvTool::new(provider.clone())));
    registry.register(Arc::new(CompanyTool::management(provider.clone())));
    registry.register(Arc::new(CompanyTool::shareholders(provider.clone())));
    registry.register(Arc::new(CompanyTool::subsidiaries(provider.clone())));
    registry.register(Arc::new(CalculateTotalVolumeTool::new(provider.clone())));
    registry.register(Arc::new(CalculateSmaTool::new(provider.clone())));
    registry.register(Arc::new(CalculateRsiTool::new(provider)));

    registry
}
