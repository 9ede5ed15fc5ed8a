pub mod elastic;

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

pub use self::elastic::ElasticClient;
use crate::{
    embedder::Encoder,
    record::{NutritionRecord, SOURCE_FIELDS},
};

pub const DEFAULT_INDEX: &str = "nutrition-facts";
pub const DEFAULT_VECTOR_FIELD: &str = "full_vector";

const RESULT_SIZE: usize = 5;
const NUM_CANDIDATES: usize = 10_000;

/// Multi-match fields; `Food` carries a 3x boost.
const KEYWORD_FIELDS: [&str; 9] = [
    "Food^3", "Measure", "Grams", "Calories", "Protein", "Fat", "SatFat", "Fiber", "Carbs",
];

/// Executes a query body against an index and returns the `_source` of each hit.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, index: &str, body: &Value) -> Result<Vec<NutritionRecord>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Keyword,
    Vector,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Vector => "vector",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" | "text" => Ok(SearchMode::Keyword),
            "vector" | "knn" => Ok(SearchMode::Vector),
            other => bail!("unknown search mode '{other}'"),
        }
    }
}

/// Builds a best-fields multi-match query restricted to `category`.
pub fn keyword_query(text: &str, category: &str) -> Value {
    json!({
        "size": RESULT_SIZE,
        "query": {
            "bool": {
                "must": {
                    "multi_match": {
                        "query": text,
                        "fields": KEYWORD_FIELDS,
                        "type": "best_fields",
                    }
                },
                "filter": {"term": {"Category": category}},
            }
        },
    })
}

/// Builds an approximate kNN query over `field` restricted to `category`.
pub fn knn_query(field: &str, vector: &[f32], category: &str) -> Value {
    json!({
        "knn": {
            "field": field,
            "query_vector": vector,
            "k": RESULT_SIZE,
            "num_candidates": NUM_CANDIDATES,
            "filter": {"term": {"Category": category}},
        },
        "_source": SOURCE_FIELDS,
    })
}

/// Category-filtered retrieval over the nutrition-facts index.
#[derive(Clone)]
pub struct Retriever {
    backend: Arc<dyn SearchBackend>,
    encoder: Arc<dyn Encoder>,
    index: String,
    vector_field: String,
}

impl Retriever {
    pub fn new(backend: Arc<dyn SearchBackend>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            backend,
            encoder,
            index: DEFAULT_INDEX.to_string(),
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: &str) -> Self {
        self.index = index.to_string();
        self
    }

    #[must_use]
    pub fn with_vector_field(mut self, field: &str) -> Self {
        self.vector_field = field.to_string();
        self
    }

    /// Returns up to five records in `category` matching `query`, best first.
    ///
    /// A category with no matches yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding the query or the search call fails.
    pub async fn search(
        &self,
        query: &str,
        category: &str,
        mode: SearchMode,
    ) -> Result<Vec<NutritionRecord>> {
        let body = match mode {
            SearchMode::Keyword => keyword_query(query, category),
            SearchMode::Vector => {
                let vector = self.encoder.encode(query).await?;
                knn_query(&self.vector_field, &vector, category)
            }
        };

        let records = self.backend.search(&self.index, &body).await?;
        info!(
            "{mode} search in '{}' for category '{category}' returned {} records",
            self.index,
            records.len()
        );
        Ok(records)
    }
}
