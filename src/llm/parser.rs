//! Structured output parsing
//!
//! Embeds a JSON schema in the prompt and parses the model's reply back
//! into the target type.

use crate::error::OrchestrationError;
use crate::models::StructuredOutput;
use crate::Result;
use std::marker::PhantomData;

pub struct OutputParser<T> {
    _target: PhantomData<fn() -> T>,
}

impl<T: StructuredOutput> OutputParser<T> {
    pub fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }

    /// Instructions appended to the system prompt
    pub fn format_instructions(&self) -> String {
        let schema = serde_json::to_string(&T::json_schema()).unwrap_or_default();

        format!(
            r#"The output should be formatted as a JSON instance that conforms to the JSON schema below.

As an example, for the schema {{"properties": {{"foo": {{"title": "Foo", "description": "a list of strings", "type": "array", "items": {{"type": "string"}}}}}}, "required": ["foo"]}}
the object {{"foo": ["bar", "baz"]}} is a well-formatted instance of the schema. The object {{"properties": {{"foo": ["bar", "baz"]}}}} is not well-formatted.

Here is the output schema:
```
{}
```"#,
            schema
        )
    }

    pub fn parse(&self, text: &str) -> Result<T> {
        let candidate = extract_json_object(text).ok_or_else(|| OrchestrationError::OutputParse {
            message: "no JSON object found".to_string(),
            raw: text.to_string(),
        })?;

        serde_json::from_str(candidate).map_err(|e| OrchestrationError::OutputParse {
            message: e.to_string(),
            raw: text.to_string(),
        })
    }
}

impl<T: StructuredOutput> Default for OutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip ```json fences and surrounding prose, keeping the outermost object.
fn extract_json_object(text: &str) -> Option<&str> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&cleaned[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QueryClassification, QueryDecomposition};

    #[test]
    fn test_parse_plain_json() {
        let parser = OutputParser::<QueryClassification>::new();
        let parsed = parser
            .parse(r#"{"is_complex": false, "reasoning": "Chỉ cần giá"}"#)
            .unwrap();

        assert!(!parsed.is_complex);
        assert_eq!(parsed.reasoning, "Chỉ cần giá");
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let parser = OutputParser::<QueryDecomposition>::new();
        let raw = "Đây là kết quả:\n```json\n{\"sub_queries\": [\"Xem dữ liệu OHLCV của VIC\", \"Xem dữ liệu OHLCV của VHM\"], \"reasoning\": \"2 mã\"}\n```";

        let parsed = parser.parse(raw).unwrap();
        assert_eq!(parsed.sub_queries.len(), 2);
        assert_eq!(parsed.sub_queries[0], "Xem dữ liệu OHLCV của VIC");
    }

    #[test]
    fn test_parse_failure_keeps_raw_text() {
        let parser = OutputParser::<QueryClassification>::new();

        match parser.parse("tôi không biết") {
            Err(OrchestrationError::OutputParse { raw, .. }) => assert_eq!(raw, "tôi không biết"),
            other => panic!("expected OutputParse, got {:?}", other),
        }

        assert!(parser.parse(r#"{"is_complex": "maybe"}"#).is_err());
    }

    #[test]
    fn test_format_instructions_embed_schema() {
        let parser = OutputParser::<QueryClassification>::new();
        let instructions = parser.format_instructions();

        assert!(instructions.contains("\"is_complex\""));
        assert!(instructions.contains("\"reasoning\""));
    }
}
