use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::SearchBackend;
use crate::record::NutritionRecord;

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Minimal Elasticsearch `_search` client.
pub struct ElasticClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: NutritionRecord,
}

impl ElasticClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn search(&self, index: &str, body: &Value) -> Result<Vec<NutritionRecord>> {
        let url = format!("{}/{index}/_search", self.base_url);
        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Problem with search service call")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("search service returned {status}: {text}");
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .context("Failed to decode search response")?;
        Ok(parsed.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::ElasticClient;
    use crate::search::{keyword_query, SearchBackend};

    fn hit(food: &str) -> serde_json::Value {
        json!({
            "_index": "nutrition-facts",
            "_id": food,
            "_score": 3.2,
            "_source": {
                "Food": food,
                "Measure": "1 medium",
                "Grams": 130,
                "Calories": 70,
                "Protein": 0.5,
                "Fat": 0,
                "SatFat": 0,
                "Fiber": 3.3,
                "Carbs": 18,
                "Category": "Fruits"
            }
        })
    }

    #[tokio::test]
    async fn returns_sources_in_rank_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nutrition-facts/_search"))
            .and(body_partial_json(json!({
                "query": {"bool": {"filter": {"term": {"Category": "Fruits"}}}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "took": 3,
                "hits": {
                    "total": {"value": 2, "relation": "eq"},
                    "hits": [hit("Apple raw"), hit("Applesauce")]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&server.uri()).unwrap();
        let records = client
            .search("nutrition-facts", &keyword_query("apple", "Fruits"))
            .await
            .unwrap();
        let foods: Vec<_> = records.iter().map(|r| r.food.as_str()).collect();
        assert_eq!(foods, vec!["Apple raw", "Applesauce"]);
    }

    #[tokio::test]
    async fn no_hits_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}
            })))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&server.uri()).unwrap();
        let records = client
            .search("nutrition-facts", &keyword_query("x", "Nothing"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn missing_index_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&server.uri()).unwrap();
        let err = client
            .search("missing", &keyword_query("x", "Fruits"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
