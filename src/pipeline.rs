use std::time::Duration;

use anyhow::Result;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::{
    cost::RateTable,
    evaluation::{Relevance, RelevanceEvaluator},
    llm::{GenerationClient, TokenUsage},
    prompt::build_prompt,
    search::{Retriever, SearchMode},
};

/// Everything known about one answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerReport {
    pub answer: String,
    pub latency: Duration,
    pub relevance: Relevance,
    pub relevance_explanation: String,
    pub model_used: String,
    pub usage: TokenUsage,
    pub eval_usage: TokenUsage,
    pub cost: f64,
}

/// Flat wire form of [`AnswerReport`].
#[derive(Serialize)]
struct ReportRecord<'a> {
    answer: &'a str,
    response_time: f64,
    relevance: &'a str,
    relevance_explanation: &'a str,
    model_used: &'a str,
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    eval_prompt_tokens: u64,
    eval_completion_tokens: u64,
    eval_total_tokens: u64,
    openai_cost: f64,
}

impl Serialize for AnswerReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportRecord {
            answer: &self.answer,
            response_time: self.latency.as_secs_f64(),
            relevance: self.relevance.as_str(),
            relevance_explanation: &self.relevance_explanation,
            model_used: &self.model_used,
            prompt_tokens: self.usage.prompt_tokens,
            completion_tokens: self.usage.completion_tokens,
            total_tokens: self.usage.total_tokens,
            eval_prompt_tokens: self.eval_usage.prompt_tokens,
            eval_completion_tokens: self.eval_usage.completion_tokens,
            eval_total_tokens: self.eval_usage.total_tokens,
            openai_cost: self.cost,
        }
        .serialize(serializer)
    }
}

/// Retrieval-augmented question answering over the nutrition-facts index.
///
/// Holds only shared, read-only service handles, so one instance can serve
/// concurrent queries.
#[derive(Clone)]
pub struct NutriChat {
    retriever: Retriever,
    generator: GenerationClient,
    evaluator: RelevanceEvaluator,
    rates: RateTable,
}

impl NutriChat {
    pub fn new(
        retriever: Retriever,
        generator: GenerationClient,
        evaluator: RelevanceEvaluator,
    ) -> Self {
        Self {
            retriever,
            generator,
            evaluator,
            rates: RateTable::default(),
        }
    }

    #[must_use]
    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }

    /// Retrieves, answers, judges and prices a single question.
    ///
    /// # Errors
    ///
    /// Returns an error if the search, encoder or either model call fails.
    pub async fn answer_query(
        &self,
        question: &str,
        category: &str,
        model_id: &str,
        mode: SearchMode,
    ) -> Result<AnswerReport> {
        let records = self.retriever.search(question, category, mode).await?;
        let prompt = build_prompt(question, &records);
        let generation = self.generator.generate(&prompt, model_id).await?;
        let verdict = self
            .evaluator
            .evaluate(question, &generation.answer)
            .await?;
        let cost = self.rates.estimate_cost(model_id, &generation.usage);
        info!("Estimated cost for {model_id}: {cost:.6}");

        Ok(AnswerReport {
            answer: generation.answer,
            latency: generation.latency,
            relevance: verdict.relevance,
            relevance_explanation: verdict.explanation,
            model_used: model_id.to_string(),
            usage: generation.usage,
            eval_usage: verdict.usage,
            cost,
        })
    }
}
