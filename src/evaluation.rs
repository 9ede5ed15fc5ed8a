use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    llm::{GenerationClient, TokenUsage},
    prompt::build_judge_prompt,
};

pub const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-4o-mini";
pub const PARSE_FAILURE_EXPLANATION: &str = "Failed to parse evaluation";

/// Relevance label assigned by the judge model.
///
/// Labels outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Relevance {
    Relevant,
    PartlyRelevant,
    NonRelevant,
    Unknown,
    Other(String),
}

impl Relevance {
    pub fn as_str(&self) -> &str {
        match self {
            Relevance::Relevant => "RELEVANT",
            Relevance::PartlyRelevant => "PARTLY_RELEVANT",
            Relevance::NonRelevant => "NON_RELEVANT",
            Relevance::Unknown => "UNKNOWN",
            Relevance::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for Relevance {
    fn from(label: String) -> Self {
        match label.as_str() {
            "RELEVANT" => Relevance::Relevant,
            "PARTLY_RELEVANT" => Relevance::PartlyRelevant,
            "NON_RELEVANT" => Relevance::NonRelevant,
            "UNKNOWN" => Relevance::Unknown,
            _ => Relevance::Other(label),
        }
    }
}

impl From<Relevance> for String {
    fn from(relevance: Relevance) -> Self {
        relevance.as_str().to_string()
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of reading the judge model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgement {
    Verdict {
        relevance: Relevance,
        explanation: String,
    },
    Malformed,
}

#[derive(Deserialize)]
struct JudgeReply {
    #[serde(rename = "Relevance")]
    relevance: String,
    #[serde(rename = "Explanation")]
    explanation: String,
}

/// Parses the judge's reply, which must be a bare JSON object with
/// `Relevance` and `Explanation` string fields.
pub fn parse_judgement(text: &str) -> Judgement {
    match serde_json::from_str::<JudgeReply>(text) {
        Ok(reply) => Judgement::Verdict {
            relevance: Relevance::from(reply.relevance),
            explanation: reply.explanation,
        },
        Err(_) => Judgement::Malformed,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceVerdict {
    pub relevance: Relevance,
    pub explanation: String,
    pub usage: TokenUsage,
}

/// Grades answers with a fixed judge model, independent of the answering model.
#[derive(Clone)]
pub struct RelevanceEvaluator {
    generator: GenerationClient,
    judge_model: String,
}

impl RelevanceEvaluator {
    pub fn new(generator: GenerationClient) -> Self {
        Self {
            generator,
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_judge_model(mut self, model_id: &str) -> Self {
        self.judge_model = model_id.to_string();
        self
    }

    pub fn judge_model(&self) -> &str {
        &self.judge_model
    }

    /// Asks the judge model how relevant `answer` is to `question`.
    ///
    /// A reply that does not parse becomes [`Relevance::Unknown`]; its token
    /// usage is still reported.
    ///
    /// # Errors
    ///
    /// Returns an error only if the judge call itself fails.
    pub async fn evaluate(&self, question: &str, answer: &str) -> Result<RelevanceVerdict> {
        let prompt = build_judge_prompt(question, answer);
        let result = self.generator.generate(&prompt, &self.judge_model).await?;

        let verdict = match parse_judgement(&result.answer) {
            Judgement::Verdict {
                relevance,
                explanation,
            } => RelevanceVerdict {
                relevance,
                explanation,
                usage: result.usage,
            },
            Judgement::Malformed => {
                warn!("Judge reply is not valid JSON: {}", result.answer);
                RelevanceVerdict {
                    relevance: Relevance::Unknown,
                    explanation: PARSE_FAILURE_EXPLANATION.to_string(),
                    usage: result.usage,
                }
            }
        };
        info!("Judge verdict: {}", verdict.relevance);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        parse_judgement, Judgement, Relevance, RelevanceEvaluator, PARSE_FAILURE_EXPLANATION,
    };
    use crate::llm::{testing::ScriptedChat, GenerationClient, TokenUsage};

    fn evaluator(reply: &str, usage: TokenUsage) -> (RelevanceEvaluator, Arc<ScriptedChat>) {
        let backend = Arc::new(ScriptedChat::default().reply(reply, usage));
        let generator = GenerationClient::new().with_backend("openai", backend.clone());
        (RelevanceEvaluator::new(generator), backend)
    }

    #[test]
    fn parses_well_formed_reply() {
        assert_eq!(
            parse_judgement(r#"{"Relevance":"RELEVANT","Explanation":"ok"}"#),
            Judgement::Verdict {
                relevance: Relevance::Relevant,
                explanation: "ok".to_string(),
            }
        );
    }

    #[test]
    fn unexpected_label_passes_through() {
        let judgement = parse_judgement(r#"{"Relevance":"SOMEWHAT","Explanation":"meh"}"#);
        let Judgement::Verdict { relevance, .. } = judgement else {
            panic!("expected a verdict");
        };
        assert_eq!(relevance, Relevance::Other("SOMEWHAT".to_string()));
        assert_eq!(relevance.as_str(), "SOMEWHAT");
    }

    #[test]
    fn malformed_replies() {
        assert_eq!(parse_judgement("not json"), Judgement::Malformed);
        assert_eq!(
            parse_judgement("```json\n{\"Relevance\":\"RELEVANT\",\"Explanation\":\"ok\"}\n```"),
            Judgement::Malformed
        );
        assert_eq!(
            parse_judgement(r#"{"Relevance":"RELEVANT"}"#),
            Judgement::Malformed
        );
    }

    #[test]
    fn relevance_serializes_as_label() {
        let value = serde_json::to_value(Relevance::PartlyRelevant).unwrap();
        assert_eq!(value, "PARTLY_RELEVANT");
        let other: Relevance = serde_json::from_value("SOMEWHAT".into()).unwrap();
        assert_eq!(other, Relevance::Other("SOMEWHAT".to_string()));
    }

    #[tokio::test]
    async fn evaluate_uses_judge_model() {
        let (evaluator, backend) = evaluator(
            r#"{"Relevance":"RELEVANT","Explanation":"ok"}"#,
            TokenUsage::new(150, 30),
        );
        let verdict = evaluator
            .evaluate("apple calories", "About 95 kcal.")
            .await
            .unwrap();

        assert_eq!(verdict.relevance, Relevance::Relevant);
        assert_eq!(verdict.explanation, "ok");
        assert_eq!(verdict.usage, TokenUsage::new(150, 30));

        let requests = backend.requests();
        assert_eq!(requests[0].0, "gpt-4o-mini");
        assert!(requests[0].1.contains("Generated Answer: About 95 kcal."));
    }

    #[tokio::test]
    async fn evaluate_downgrades_unparsable_reply() {
        let (evaluator, _) = evaluator("not json", TokenUsage::new(150, 7));
        let verdict = evaluator.evaluate("q", "a").await.unwrap();

        assert_eq!(verdict.relevance, Relevance::Unknown);
        assert_eq!(verdict.explanation, PARSE_FAILURE_EXPLANATION);
        assert_eq!(verdict.usage, TokenUsage::new(150, 7));
    }

    #[tokio::test]
    async fn judge_call_failure_propagates() {
        let generator =
            GenerationClient::new().with_backend("openai", Arc::new(ScriptedChat::default()));
        let evaluator = RelevanceEvaluator::new(generator);
        assert!(evaluator.evaluate("q", "a").await.is_err());
    }
}
