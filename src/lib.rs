//! Retrieval-augmented nutrition-facts assistant.
//!
//! A question is answered by retrieving matching records from the
//! nutrition-facts index, grounding a language-model prompt on them, grading
//! the answer with a second judge call, and estimating the cost of the
//! answering call. See [`NutriChat::answer_query`].

pub mod cost;
pub mod embedder;
pub mod evaluation;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod search;
pub mod settings;

pub use pipeline::{AnswerReport, NutriChat};
pub use search::SearchMode;
