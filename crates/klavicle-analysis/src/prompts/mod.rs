//! Prompt construction
//!
//! A prompt is the entity's base template, an optional block of caller
//! context, and a fenced preview of the data, followed by a reminder to answer
//! in the template's JSON shape.

mod templates;

pub use templates::base_template;

use crate::entity::{AnalysisContext, EntityType};
use crate::error::Result;
use minijinja::{Environment, context};

/// Default number of data characters embedded in a prompt
pub const DEFAULT_PREVIEW_CHARS: usize = 10_000;

const PROMPT_TEMPLATE: &str = "{{ base }}
{% if context %}
Additional context and instructions:
{% for key, value in context %}- {{ key }}: {{ value }}
{% endfor %}{% endif %}
DATA (potentially truncated for preview):
```json
{{ data }}
```

Provide your analysis in JSON format as specified in the instructions above.";

/// Builds provider-agnostic prompts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    preview_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl PromptBuilder {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// Render the prompt for `entity_type`
    ///
    /// `data_text` is cut to the first `preview_chars` characters.
    pub fn build(
        &self,
        entity_type: EntityType,
        data_text: &str,
        context: Option<&AnalysisContext>,
    ) -> Result<String> {
        let entries: Vec<(&str, &str)> = context.map(|c| c.iter().collect()).unwrap_or_default();

        let env = Environment::new();
        let prompt = env.render_str(
            PROMPT_TEMPLATE,
            context! {
                base => base_template(entity_type),
                context => entries,
                data => truncate_chars(data_text, self.preview_chars),
            },
        )?;
        Ok(prompt)
    }
}

/// Prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout_without_context() {
        let prompt = PromptBuilder::default()
            .build(EntityType::Lists, "[1]", None)
            .unwrap();

        assert!(prompt.starts_with("You are analyzing Klaviyo list data."));
        assert!(prompt.contains("\n\nDATA (potentially truncated for preview):\n```json\n[1]\n```\n"));
        assert!(prompt.ends_with("Provide your analysis in JSON format as specified in the instructions above."));
        assert!(!prompt.contains("Additional context"));
    }

    #[test]
    fn test_context_block_in_order() {
        let context = AnalysisContext::new()
            .with("focus", "revenue")
            .with("audience", "vip");
        let prompt = PromptBuilder::default()
            .build(EntityType::Campaigns, "[]", Some(&context))
            .unwrap();

        assert!(prompt.contains(
            "\n\nAdditional context and instructions:\n- focus: revenue\n- audience: vip\n\nDATA"
        ));
    }

    #[test]
    fn test_data_is_truncated_by_prefix() {
        let data = "x".repeat(50);
        let prompt = PromptBuilder::new(10).build(EntityType::Generic, &data, None).unwrap();

        assert!(prompt.contains(&format!("```json\n{}\n```", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::default();
        let a = builder.build(EntityType::Tags, "{\"a\":1}", None).unwrap();
        let b = builder.build(EntityType::Tags, "{\"a\":1}", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_template_selection() {
        assert!(base_template(EntityType::Unified).contains("unified Klaviyo account data"));
        assert!(base_template(EntityType::Tags).contains("Klaviyo tag usage"));
        assert!(base_template(EntityType::Generic).starts_with("You are analyzing Klaviyo marketing data."));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
