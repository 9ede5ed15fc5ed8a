use crate::record::NutritionRecord;

const ANSWER_TEMPLATE: &str = "\
You're a nutritionist working as a nutrition facts chat assistant. Answer the QUESTION based on the CONTEXT from the nutrition database.
Use only the facts from the CONTEXT when answering the QUESTION. Be specific about measurements and nutritional values.

QUESTION: {question}

CONTEXT: 
{context}";

const JUDGE_TEMPLATE: &str = r#"You are an expert evaluator for a Nutrition Facts Retrieval-Augmented Generation (RAG) system.
    Your task is to analyze the relevance of the generated answer to the given nutrition question.
    Based on the relevance and accuracy of the nutritional information provided, classify it
    as "NON_RELEVANT", "PARTLY_RELEVANT", or "RELEVANT".

    Here is the data for evaluation:

    Question: {question}
    Generated Answer: {answer}

    Please analyze the content and context of the generated answer in relation to the question
    and provide your evaluation in parsable JSON without using code blocks:

    {
      "Relevance": "NON_RELEVANT" | "PARTLY_RELEVANT" | "RELEVANT",
      "Explanation": "[Provide a brief explanation for your evaluation]"
    }"#;

/// Renders a single record as a context block.
fn render_record(record: &NutritionRecord) -> String {
    format!(
        "Food: {}\n\
         Measure: {}\n\
         Nutritional Facts:\n\
         - Calories: {}\n\
         - Protein: {}g\n\
         - Fat: {}g\n\
         - Saturated Fat: {}g\n\
         - Fiber: {}g\n\
         - Carbs: {}g\n\
         Category: {}",
        record.food,
        record.measure,
        record.calories,
        record.protein,
        record.fat,
        record.sat_fat,
        record.fiber,
        record.carbs,
        record.category,
    )
}

/// Builds the grounding prompt for `question` from the retrieved `records`.
///
/// Records are rendered in the given order, separated by a blank line. An empty
/// slice yields an empty context section.
pub fn build_prompt(question: &str, records: &[NutritionRecord]) -> String {
    let context = records
        .iter()
        .map(render_record)
        .collect::<Vec<_>>()
        .join("\n\n");

    // The question goes in last so braces typed by the user are never expanded.
    ANSWER_TEMPLATE
        .replacen("{context}", &context, 1)
        .replacen("{question}", question, 1)
        .trim()
        .to_string()
}

/// Builds the prompt asking the judge model to classify `answer` against `question`.
pub fn build_judge_prompt(question: &str, answer: &str) -> String {
    JUDGE_TEMPLATE
        .replacen("{answer}", answer, 1)
        .replacen("{question}", question, 1)
}

#[cfg(test)]
mod tests {
    use super::{build_judge_prompt, build_prompt};
    use crate::record::sample;

    #[test]
    fn prompt_contains_question_and_records_in_order() {
        let records = vec![sample("Apple raw", "Fruits"), sample("Apricots", "Fruits")];
        let prompt = build_prompt("How many calories in an apple?", &records);

        assert!(prompt.starts_with("You're a nutritionist"));
        assert!(prompt.contains("QUESTION: How many calories in an apple?"));
        assert_eq!(prompt.matches("Food: ").count(), 2);

        let apple = prompt.find("Food: Apple raw").unwrap();
        let apricot = prompt.find("Food: Apricots").unwrap();
        assert!(apple < apricot);
        assert!(prompt.contains("Category: Fruits\n\nFood: Apricots"));
    }

    #[test]
    fn record_block_lists_units() {
        let prompt = build_prompt("q", &[sample("Apple raw", "Fruits")]);
        let block = prompt.split("CONTEXT: \n").nth(1).unwrap();
        assert_eq!(
            block,
            "Food: Apple raw\n\
             Measure: 1 medium\n\
             Nutritional Facts:\n\
             - Calories: 70\n\
             - Protein: 0.5g\n\
             - Fat: 0g\n\
             - Saturated Fat: 0g\n\
             - Fiber: 3.3g\n\
             - Carbs: 18g\n\
             Category: Fruits"
        );
    }

    #[test]
    fn empty_records_leave_empty_context() {
        let prompt = build_prompt("Is kale healthy?", &[]);
        assert!(prompt.contains("QUESTION: Is kale healthy?"));
        assert!(prompt.ends_with("CONTEXT:"));
        assert!(!prompt.contains("Food:"));
    }

    #[test]
    fn braces_in_question_are_kept_literally() {
        let prompt = build_prompt("what is {context}?", &[sample("Apple raw", "Fruits")]);
        assert!(prompt.contains("QUESTION: what is {context}?"));
    }

    #[test]
    fn judge_prompt_embeds_question_and_answer() {
        let prompt = build_judge_prompt("apple calories", "About 70 kcal.");
        assert!(prompt.starts_with("You are an expert evaluator"));
        assert!(prompt.contains(
            "    Question: apple calories\n    Generated Answer: About 70 kcal.\n"
        ));
        assert!(prompt.contains(
            "      \"Relevance\": \"NON_RELEVANT\" | \"PARTLY_RELEVANT\" | \"RELEVANT\","
        ));
        assert!(prompt.ends_with("\n    }"));
    }
}
