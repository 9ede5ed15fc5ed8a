use serde::{Deserialize, Deserializer, Serialize};

/// Fields returned in `_source` for every hit, in index order.
pub const SOURCE_FIELDS: [&str; 11] = [
    "Food", "Measure", "Grams", "Calories", "Protein", "Fat", "SatFat", "Fiber", "Carbs",
    "Category", "id",
];

/// One row of the nutrition-facts index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(rename = "Food")]
    pub food: String,
    #[serde(rename = "Measure")]
    pub measure: String,
    #[serde(rename = "Grams")]
    pub grams: f64,
    #[serde(rename = "Calories")]
    pub calories: f64,
    #[serde(rename = "Protein")]
    pub protein: f64,
    #[serde(rename = "Fat")]
    pub fat: f64,
    #[serde(rename = "SatFat")]
    pub sat_fat: f64,
    #[serde(rename = "Fiber")]
    pub fiber: f64,
    #[serde(rename = "Carbs")]
    pub carbs: f64,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Indexed embedding, read from `full_vector` whatever vector field the
    /// retriever queries. Answering never reads it.
    #[serde(
        default,
        rename = "full_vector",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

/// Document ids are strings in most ingests but numbers in some.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    }))
}

#[cfg(test)]
pub(crate) fn sample(food: &str, category: &str) -> NutritionRecord {
    NutritionRecord {
        food: food.to_string(),
        measure: "1 medium".to_string(),
        grams: 130.0,
        calories: 70.0,
        protein: 0.5,
        fat: 0.0,
        sat_fat: 0.0,
        fiber: 3.3,
        carbs: 18.0,
        category: category.to_string(),
        id: None,
        embedding: None,
    }
}
