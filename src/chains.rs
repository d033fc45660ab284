//! Single round-trip chains: classify, decompose, combine
//!
//! Each chain is a system prompt with embedded format instructions, one
//! human message, one model call, and a structured parse of the reply.
//! Parse failures propagate.

use crate::llm::{ChatModel, Message, OutputParser};
use crate::models::{CombinedResult, QueryClassification, QueryDecomposition, StructuredOutput};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

const CLASSIFIER_PROMPT: &str = "Bạn là một chuyên gia phân loại câu hỏi tài chính.
Nhiệm vụ: Phân loại câu hỏi thành True (phức tạp) hoặc False (đơn giản).

Câu hỏi ĐƠN GIẢN (False): Chỉ cần 1 công cụ để trả lời (ví dụ: giá cổ phiếu, thông tin cơ bản)
Câu hỏi PHỨC TẠP (True): Cần nhiều công cụ hoặc phân tích sâu (ví dụ: so sánh, xu hướng, dự đoán)";

const DECOMPOSITION_PROMPT: &str = "Bạn là một chuyên gia phân tích câu hỏi tài chính.
Nhiệm vụ: Phân tách câu hỏi phức tạp thành các câu hỏi con đơn giản hơn.

Nguyên tắc phân tách:
- Mỗi câu hỏi con chỉ cần 1 công cụ để trả lời
- Các câu hỏi con phải có thứ tự logic
- Đảm bảo câu hỏi con bao phủ toàn bộ câu hỏi gốc
- Sử dụng mã cổ phiếu cụ thể nếu có

Ví dụ:
Câu hỏi: \"So sánh hiệu suất VIC và VHM trong 3 tháng qua\"
Phân tách thành:
1. \"Xem dữ liệu OHLCV của VIC trong 3 tháng qua\"
2. \"Xem dữ liệu OHLCV của VHM trong 3 tháng qua\"
3. \"Tính RSI của VIC\"
4. \"Tính RSI của VHM\"";

const COMBINE_PROMPT: &str = "Bạn là một chuyên gia phân tích tài chính.
Nhiệm vụ: Kết hợp nhiều kết quả từ các câu hỏi con thành một câu trả lời tổng hợp, mạch lạc.

Nguyên tắc kết hợp:
- Tổng hợp thông tin từ tất cả các kết quả
- Tạo câu trả lời mạch lạc, dễ hiểu
- So sánh và phân tích nếu có nhiều mã cổ phiếu
- Đưa ra kết luận và khuyến nghị nếu phù hợp
- Sử dụng tiếng Việt và định dạng dễ đọc";

/// System prompt plus parser for one structured output type
struct StructuredChain<T> {
    model: Arc<dyn ChatModel>,
    instructions: &'static str,
    parser: OutputParser<T>,
}

impl<T: StructuredOutput> StructuredChain<T> {
    fn new(model: Arc<dyn ChatModel>, instructions: &'static str) -> Self {
        Self {
            model,
            instructions,
            parser: OutputParser::new(),
        }
    }

    async fn invoke(&self, human: String) -> Result<T> {
        let messages = [
            Message::system(format!(
                "{}\n\n{}",
                self.instructions,
                self.parser.format_instructions()
            )),
            Message::user(human),
        ];

        let reply = self.model.complete(&messages).await?;
        debug!(reply_len = reply.len(), "Chain reply received");
        self.parser.parse(&reply)
    }
}

/// Labels a query simple (one tool) or complex
pub struct ClassifierChain {
    chain: StructuredChain<QueryClassification>,
}

impl ClassifierChain {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            chain: StructuredChain::new(model, CLASSIFIER_PROMPT),
        }
    }

    pub async fn classify(&self, query: &str) -> Result<QueryClassification> {
        self.chain
            .invoke(format!("Phân loại câu hỏi sau: {}", query))
            .await
    }
}

/// Splits a complex query into ordered single-tool sub-queries
pub struct DecompositionChain {
    chain: StructuredChain<QueryDecomposition>,
}

impl DecompositionChain {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            chain: StructuredChain::new(model, DECOMPOSITION_PROMPT),
        }
    }

    /// Output is forwarded as-is; the list is not validated.
    pub async fn decompose(&self, query: &str) -> Result<QueryDecomposition> {
        self.chain
            .invoke(format!("Phân tách câu hỏi sau: {}", query))
            .await
    }
}

/// Sub-queries only
pub async fn decompose_complex_query(query: &str, model: Arc<dyn ChatModel>) -> Result<Vec<String>> {
    Ok(DecompositionChain::new(model)
        .decompose(query)
        .await?
        .sub_queries)
}

/// Synthesizes labelled sub-results into one answer
pub struct CombineChain {
    chain: StructuredChain<CombinedResult>,
}

impl CombineChain {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            chain: StructuredChain::new(model, COMBINE_PROMPT),
        }
    }

    /// `results` is the output of [`format_sub_results`]
    pub async fn combine(&self, original_query: &str, results: &str) -> Result<CombinedResult> {
        self.chain
            .invoke(format!(
                "Câu hỏi gốc: {}\n\nCác kết quả từ câu hỏi con:\n{}\n\nHãy kết hợp các kết quả trên thành một câu trả lời tổng hợp.",
                original_query, results
            ))
            .await
    }
}

/// `Kết quả {i}:\n{text}\n\n` per result, 1-indexed, in order.
pub fn format_sub_results<S: AsRef<str>>(results: &[S]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Kết quả {}:\n{}\n\n", i + 1, text.as_ref()))
        .collect()
}
