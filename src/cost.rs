use std::collections::HashMap;

use crate::llm::TokenUsage;

/// Price per 1000 tokens as `(input, output)`, keyed by provider-qualified model id.
const DEFAULT_RATES: [(&str, Rate); 3] = [
    (
        "openai/gpt-3.5-turbo",
        Rate {
            input: 0.0015,
            output: 0.002,
        },
    ),
    (
        "openai/gpt-4o",
        Rate {
            input: 0.03,
            output: 0.06,
        },
    ),
    (
        "openai/gpt-4o-mini",
        Rate {
            input: 0.03,
            output: 0.06,
        },
    ),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<String, Rate>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            rates: DEFAULT_RATES
                .iter()
                .map(|(model, rate)| ((*model).to_string(), *rate))
                .collect(),
        }
    }
}

impl RateTable {
    /// Adds or replaces the rate for `model_id`.
    #[must_use]
    pub fn with_rate(mut self, model_id: &str, input: f64, output: f64) -> Self {
        self.rates.insert(model_id.to_string(), Rate { input, output });
        self
    }

    pub fn rate(&self, model_id: &str) -> Option<Rate> {
        self.rates.get(model_id).copied()
    }

    /// Estimates the cost of a call to `model_id`.
    ///
    /// Models missing from the table cost nothing.
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_cost(&self, model_id: &str, usage: &TokenUsage) -> f64 {
        match self.rate(model_id) {
            Some(rate) => {
                (usage.prompt_tokens as f64 * rate.input
                    + usage.completion_tokens as f64 * rate.output)
                    / 1000.0
            }
            None => 0.0,
        }
    }
}
