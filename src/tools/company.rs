//! Company profile tools: shareholders, management, subsidiaries

use super::args::{parse_args, require_symbol, symbol_schema, SymbolArgs};
use super::{Tool, ToolOutcome};
use crate::market_data::{MarketDataProvider, Records};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Which company lookup a tool performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Shareholders,
    Management,
    Subsidiaries,
}

impl Lookup {
    fn tool_name(self) -> &'static str {
        match self {
            Lookup::Shareholders => "view_shareholders",
            Lookup::Management => "view_management",
            Lookup::Subsidiaries => "view_subsidiaries",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Lookup::Shareholders => "Get shareholders information for a Vietnamese stock symbol. Use this when you need to find information about major shareholders, ownership structure of a Vietnamese company.",
            Lookup::Management => "Get management information for a Vietnamese stock symbol. Use this when you need to find information about company officers, management team, executives of a Vietnamese company.",
            Lookup::Subsidiaries => "Get subsidiaries information for a Vietnamese stock symbol. Use this when you need to find information about subsidiary companies, affiliated companies of a Vietnamese company.",
        }
    }

    /// Used in messages: "thông tin {subject}"
    fn subject(self) -> &'static str {
        match self {
            Lookup::Shareholders => "cổ đông",
            Lookup::Management => "ban lãnh đạo",
            Lookup::Subsidiaries => "công ty con",
        }
    }
}

/// Symbol-only lookup against the company profile endpoints
pub struct CompanyTool {
    lookup: Lookup,
    provider: Arc<dyn MarketDataProvider>,
}

impl CompanyTool {
    pub fn new(lookup: Lookup, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { lookup, provider }
    }

    pub fn shareholders(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::new(Lookup::Shareholders, provider)
    }

    pub fn management(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::new(Lookup::Management, provider)
    }

    pub fn subsidiaries(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::new(Lookup::Subsidiaries, provider)
    }

    async fn fetch(&self, symbol: &str) -> crate::Result<Records> {
        match self.lookup {
            Lookup::Shareholders => self.provider.shareholders(symbol).await,
            Lookup::Management => self.provider.officers(symbol).await,
            Lookup::Subsidiaries => self.provider.subsidiaries(symbol).await,
        }
    }

    fn failure(&self, symbol: &str, detail: impl std::fmt::Display) -> String {
        format!(
            "Lỗi khi lấy thông tin {} cho mã {}: {}",
            self.lookup.subject(),
            symbol,
            detail
        )
    }
}

#[async_trait::async_trait]
impl Tool for CompanyTool {
    fn name(&self) -> &'static str {
        self.lookup.tool_name()
    }

    fn description(&self) -> &'static str {
        self.lookup.description()
    }

    fn parameters(&self) -> Value {
        symbol_schema()
    }

    async fn run(&self, args: &Value) -> ToolOutcome {
        let tool = self.name();
        let symbol = match parse_args::<SymbolArgs>(tool, args)
            .and_then(|parsed| require_symbol(tool, &parsed.symbol))
        {
            Ok(symbol) => symbol,
            Err(message) => return ToolOutcome::rejected(message),
        };

        match self.fetch(&symbol).await {
            Ok(records) if records.is_empty() => ToolOutcome::ok(format!(
                "Không tìm thấy thông tin {} cho mã {}",
                self.lookup.subject(),
                symbol
            )),
            Ok(records) => match serde_json::to_string(&records) {
                Ok(json) => ToolOutcome::ok(json),
                Err(e) => ToolOutcome::ok(self.failure(&symbol, e)),
            },
            Err(e) => {
                warn!(tool_name = %tool, %symbol, error = %e, "Company lookup failed");
                ToolOutcome::ok(self.failure(&symbol, e))
            }
        }
    }
}
