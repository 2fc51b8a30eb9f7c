//! Response envelope decoders
//!
//! Each backend wraps the reply text in its own JSON envelope. Decoding is kept
//! here so providers only differ in how they build requests. An envelope that
//! does not match the expected shape decodes to the stringified body instead of
//! failing, which leaves the response normalizer something to work with.

use crate::TokenUsage;
use serde_json::Value;
use tracing::debug;

/// Envelope shape of a backend response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"choices": [{"message": {"content": "..."}}]}`
    OpenAIChat,
    /// `{"content": [{"type": "text", "text": "..."}]}` or legacy `{"completion": "..."}`
    AnthropicMessages,
}

impl Envelope {
    /// Unwrap the reply text, falling back to the stringified body
    pub fn decode(self, body: &Value) -> String {
        self.try_decode(body).unwrap_or_else(|| {
            debug!(envelope = ?self, "Unrecognized response envelope, using raw body");
            body.to_string()
        })
    }

    fn try_decode(self, body: &Value) -> Option<String> {
        match self {
            Self::OpenAIChat => body
                .pointer("/choices/0/message/content")?
                .as_str()
                .map(str::to_string),
            Self::AnthropicMessages => {
                if let Some(blocks) = body.get("content").and_then(Value::as_array) {
                    let texts: Vec<&str> = blocks
                        .iter()
                        .filter(|block| {
                            block
                                .get("type")
                                .and_then(Value::as_str)
                                .is_none_or(|kind| kind == "text")
                        })
                        .filter_map(|block| block.get("text")?.as_str())
                        .collect();
                    if !texts.is_empty() {
                        return Some(texts.concat());
                    }
                }
                body.get("completion")?.as_str().map(str::to_string)
            }
        }
    }

    /// Token usage reported in the envelope, if any
    pub fn usage(self, body: &Value) -> Option<TokenUsage> {
        let usage = body.get("usage")?;
        let (input, output) = match self {
            Self::OpenAIChat => ("prompt_tokens", "completion_tokens"),
            Self::AnthropicMessages => ("input_tokens", "output_tokens"),
        };
        Some(TokenUsage {
            input_tokens: usize::try_from(usage.get(input)?.as_u64()?).ok()?,
            output_tokens: usize::try_from(usage.get(output)?.as_u64()?).ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_envelope() {
        let body = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"summary\":\"ok\"}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        });
        assert_eq!(Envelope::OpenAIChat.decode(&body), "{\"summary\":\"ok\"}");
        assert_eq!(
            Envelope::OpenAIChat.usage(&body),
            Some(TokenUsage {
                input_tokens: 12,
                output_tokens: 5
            })
        );
    }

    #[test]
    fn test_anthropic_content_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "part one "},
                {"type": "tool_use", "id": "x", "name": "n", "input": {}},
                {"type": "text", "text": "part two"}
            ],
            "usage": {"input_tokens": 3, "output_tokens": 4}
        });
        assert_eq!(
            Envelope::AnthropicMessages.decode(&body),
            "part one part two"
        );
        assert_eq!(
            Envelope::AnthropicMessages.usage(&body).map(|u| u.total()),
            Some(7)
        );
    }

    #[test]
    fn test_anthropic_legacy_completion() {
        let body = json!({"completion": "legacy text"});
        assert_eq!(Envelope::AnthropicMessages.decode(&body), "legacy text");
    }

    #[test]
    fn test_unrecognized_envelope_falls_back_to_dump() {
        let body = json!({"output": {"text": "elsewhere"}});
        let decoded = Envelope::OpenAIChat.decode(&body);
        assert_eq!(decoded, body.to_string());
        assert!(Envelope::OpenAIChat.usage(&body).is_none());
    }
}
