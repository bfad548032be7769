//! Demo tool served by the binary: word and character statistics for text.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::schema::{
    Schema, ToolSchema, boolean_field, enum_field, number_field, secret_field, string_field,
};
use crate::tools::{ExecutionContext, ToolError, ToolHandler, ToolMetadata, ToolOutput};

#[derive(Debug, Default)]
pub struct TextStatsTool;

#[async_trait]
impl ToolHandler for TextStatsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("text-stats", env!("CARGO_PKG_VERSION"))
            .with_description("Counts words and characters and reports the most frequent words")
            .with_capability("text-analysis")
            .with_tag("demo")
    }

    fn schema(&self) -> ToolSchema {
        let input = Schema::new()
            .field(
                "text",
                string_field()
                    .required()
                    .min_length(1)
                    .max_length(100_000)
                    .trim()
                    .description("Text to analyze")
                    .example("the quick brown fox jumps over the lazy dog"),
            )
            .field(
                "mode",
                enum_field(["words", "chars", "both"])
                    .default("both")
                    .label_for("words", "Word statistics")
                    .label_for("chars", "Character statistics")
                    .label_for("both", "Everything"),
            )
            .field(
                "top",
                number_field()
                    .integer()
                    .range(1, 50)
                    .default(5)
                    .description("How many frequent words to report"),
            );

        let config = Schema::new()
            .field(
                "caseSensitive",
                boolean_field()
                    .default(false)
                    .env_var("TEXT_STATS_CASE_SENSITIVE")
                    .category("analysis"),
            )
            .field(
                "licenseKey",
                secret_field()
                    .optional()
                    .env_var("TEXT_STATS_LICENSE_KEY")
                    .description("Unused; shows how secret config is masked")
                    .category("credentials"),
            );

        ToolSchema::new(input, config)
    }

    async fn execute(
        &self,
        input: Value,
        config: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("text is required".to_string()))?;
        let mode = input.get("mode").and_then(Value::as_str).unwrap_or("both");
        let top = input.get("top").and_then(Value::as_u64).unwrap_or(5) as usize;
        let case_sensitive = config
            .get("caseSensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::debug!(execution_id = %ctx.execution_id, mode, "Analyzing text");

        let mut data = serde_json::Map::new();
        if mode != "chars" {
            let words = word_frequencies(text, case_sensitive);
            data.insert("wordCount".to_string(), json!(words.total));
            data.insert("uniqueWords".to_string(), json!(words.counts.len()));
            data.insert("topWords".to_string(), json!(words.top(top)));
        }
        if mode != "words" {
            data.insert("charCount".to_string(), json!(text.chars().count()));
            data.insert(
                "nonWhitespaceChars".to_string(),
                json!(text.chars().filter(|c| !c.is_whitespace()).count()),
            );
        }

        let mut output = ToolOutput::success(Value::Object(data));
        if text.split_whitespace().next().is_none() {
            output = output.with_warning("text contains only whitespace");
        }
        Ok(output)
    }
}

struct WordFrequencies {
    total: usize,
    counts: HashMap<String, usize>,
}

impl WordFrequencies {
    /// Most frequent words, ties broken alphabetically.
    fn top(&self, n: usize) -> Vec<Value> {
        let mut ranked: Vec<(&String, &usize)> = self.counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(n)
            .map(|(word, count)| json!({ "word": word, "count": count }))
            .collect()
    }
}

fn word_frequencies(text: &str, case_sensitive: bool) -> WordFrequencies {
    let mut counts = HashMap::new();
    let mut total = 0;
    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() {
            continue;
        }
        let word = if case_sensitive {
            word.to_string()
        } else {
            word.to_lowercase()
        };
        *counts.entry(word).or_insert(0) += 1;
        total += 1;
    }
    WordFrequencies { total, counts }
}
