//! Per-request workflow
//!
//! RECEIVED → CLASSIFY → SIMPLE | COMPLEX → RESPOND
//!
//! Simple queries go to the conversational agent once. Complex queries are
//! decomposed, each sub-query runs on the direct agent in order with no
//! shared context, and the labelled results are combined.

use crate::agent::{extract_answer, QueryAgent, ToolCallingAgent};
use crate::chains::{format_sub_results, ClassifierChain, CombineChain, DecompositionChain};
use crate::config::{AppConfig, MarketDataSource};
use crate::llm::{ChatModel, GeminiClient};
use crate::market_data::{MarketDataProvider, TcbsProvider};
use crate::models::{OrchestrationResult, QueryPath};
use crate::tools::{create_default_registry, ToolRegistry};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared, read-only components for answering queries
pub struct Orchestrator {
    classifier: ClassifierChain,
    decomposer: DecompositionChain,
    combiner: CombineChain,
    conversational_agent: Arc<dyn QueryAgent>,
    direct_agent: Arc<dyn QueryAgent>,
}

impl Orchestrator {
    pub fn new(
        classifier: ClassifierChain,
        decomposer: DecompositionChain,
        combiner: CombineChain,
        conversational_agent: Arc<dyn QueryAgent>,
        direct_agent: Arc<dyn QueryAgent>,
    ) -> Self {
        Self {
            classifier,
            decomposer,
            combiner,
            conversational_agent,
            direct_agent,
        }
    }

    /// Every component bound to the same model and registry
    pub fn from_model(model: Arc<dyn ChatModel>, registry: &ToolRegistry, max_steps: usize) -> Self {
        Self::new(
            ClassifierChain::new(model.clone()),
            DecompositionChain::new(model.clone()),
            CombineChain::new(model.clone()),
            Arc::new(ToolCallingAgent::conversational(model.clone(), registry, max_steps)),
            Arc::new(ToolCallingAgent::direct(model, registry, max_steps)),
        )
    }

    /// Build the model client, data provider and registry once at startup
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> =
            Arc::new(GeminiClient::new(&config.model, config.request_timeout)?);

        let provider: Arc<dyn MarketDataProvider> = match config.market_data.source {
            MarketDataSource::Tcbs => Arc::new(TcbsProvider::new(
                config.market_data.base_url.clone(),
                config.request_timeout,
            )?),
        };

        let registry = create_default_registry(provider, config.request_timeout);
        info!(
            tools = registry.list().len(),
            max_steps = config.agent_max_steps,
            "Orchestrator components built"
        );

        Ok(Self::from_model(model, &registry, config.agent_max_steps))
    }

    pub async fn process_query(&self, query: &str) -> Result<OrchestrationResult> {
        let start = Instant::now();

        let classification = self.classifier.classify(query).await?;
        info!(
            is_complex = classification.is_complex,
            reasoning = %classification.reasoning,
            "Query classified"
        );

        let (output, path, sub_queries) = if classification.is_complex {
            let (output, sub_queries) = self.complex_path(query).await?;
            (output, QueryPath::Complex, sub_queries)
        } else {
            (self.simple_path(query).await?, QueryPath::Simple, Vec::new())
        };

        info!(
            path = %path,
            sub_queries = sub_queries.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(OrchestrationResult {
            output,
            path,
            classification,
            sub_queries,
        })
    }

    async fn simple_path(&self, query: &str) -> Result<String> {
        let result = self.conversational_agent.invoke(query).await?;
        Ok(extract_answer(&result))
    }

    async fn complex_path(&self, query: &str) -> Result<(String, Vec<String>)> {
        let decomposition = self.decomposer.decompose(query).await?;
        let sub_queries = decomposition.sub_queries;
        info!(
            count = sub_queries.len(),
            reasoning = %decomposition.reasoning,
            "Query decomposed"
        );

        let mut results = Vec::with_capacity(sub_queries.len());
        for (index, sub_query) in sub_queries.iter().enumerate() {
            info!(index = index + 1, total = sub_queries.len(), %sub_query, "Running sub-query");
            let result = self.direct_agent.invoke(sub_query).await?;
            let answer = extract_answer(&result);
            debug!(index = index + 1, answer_len = answer.len(), "Sub-query finished");
            results.push(answer);
        }

        let combined = self
            .combiner
            .combine(query, &format_sub_results(&results))
            .await?;

        Ok((combined.combined_answer, sub_queries))
    }
}
