//! Core data models for the query workflow

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

//
// ================= Chain Outputs =================
//

/// Structured output whose JSON schema is embedded in the prompt
pub trait StructuredOutput: serde::de::DeserializeOwned {
    fn json_schema() -> Value;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryClassification {
    pub is_complex: bool,
    pub reasoning: String,
}

impl StructuredOutput for QueryClassification {
    fn json_schema() -> Value {
        json!({
            "title": "QueryClassification",
            "type": "object",
            "properties": {
                "is_complex": {
                    "type": "boolean",
                    "description": "True nếu câu hỏi phức tạp, False nếu đơn giản"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Lý do phân loại"
                }
            },
            "required": ["is_complex", "reasoning"]
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDecomposition {
    pub sub_queries: Vec<String>,
    pub reasoning: String,
}

impl StructuredOutput for QueryDecomposition {
    fn json_schema() -> Value {
        json!({
            "title": "QueryDecomposition",
            "type": "object",
            "properties": {
                "sub_queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Danh sách các câu hỏi con được phân tách từ câu hỏi phức tạp"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Lý do phân tách câu hỏi"
                }
            },
            "required": ["sub_queries", "reasoning"]
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombinedResult {
    pub combined_answer: String,
    pub original_query: String,
}

impl StructuredOutput for CombinedResult {
    fn json_schema() -> Value {
        json!({
            "title": "CombinedResult",
            "type": "object",
            "properties": {
                "combined_answer": {
                    "type": "string",
                    "description": "Câu trả lời tổng hợp từ nhiều kết quả con"
                },
                "original_query": {
                    "type": "string",
                    "description": "Câu hỏi gốc"
                }
            },
            "required": ["combined_answer", "original_query"]
        })
    }
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryPath {
    Simple,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub output: String,
    pub path: QueryPath,
    pub classification: QueryClassification,
    /// Empty on the simple path
    pub sub_queries: Vec<String>,
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryPath::Simple => "simple",
            QueryPath::Complex => "complex",
        };
        write!(f, "{}", s)
    }
}
