use serde::Serialize;

use crate::config::PromptPolicy;
use crate::models::{ChatMessage, ChatRequest};

pub const CODE_GENERATION_PROMPT: &str = "\
You are an expert programming assistant. Follow these rules strictly:

1. Never show internal reasoning or planning sections.
2. For code requests, provide the code immediately, then two or three short bullets.
3. Keep explanations minimal and to the point.
4. Never use emojis or meta-commentary.
5. Validate inputs in the code you write and report invalid input as an error instead of guessing.

Output format for code:
```language
[code here]
```

Key points:
- Point 1
- Point 2";

pub const DEBUGGING_PROMPT: &str = "\
You are an expert debugging assistant. Follow these rules strictly:

1. Identify the most likely root cause of the reported error first.
2. Quote only the lines that matter and show the corrected code in a fenced block.
3. If the information is insufficient, say exactly what output, log or input is missing.
4. Keep explanations short, concrete and free of emojis.";

const DEBUG_KEYWORDS: [&str; 2] = ["error", "debug"];

/// Picks the leading system instruction for a conversation.
pub fn select_system_prompt(messages: &[ChatMessage], policy: PromptPolicy) -> &'static str {
    match policy {
        PromptPolicy::Fixed => CODE_GENERATION_PROMPT,
        PromptPolicy::Adaptive if mentions_debugging(messages) => DEBUGGING_PROMPT,
        PromptPolicy::Adaptive => CODE_GENERATION_PROMPT,
    }
}

fn mentions_debugging(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| {
        let content = m.content.to_lowercase();
        DEBUG_KEYWORDS.iter().any(|kw| content.contains(kw))
    })
}

/// `[system] + messages`, with the original order untouched.
pub fn frame_messages(messages: &[ChatMessage], policy: PromptPolicy) -> Vec<ChatMessage> {
    let mut framed = Vec::with_capacity(messages.len() + 1);
    framed.push(ChatMessage::system(select_system_prompt(messages, policy)));
    framed.extend(messages.iter().cloned());
    framed
}

/// Generation knobs that come from gateway configuration rather than the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingOptions {
    pub policy: PromptPolicy,
    pub num_ctx: Option<u32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: GenerationOptions,
}

impl UpstreamPayload {
    pub fn build(
        request: &ChatRequest,
        model: &str,
        options: &FramingOptions,
        stream: bool,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: frame_messages(&request.messages, options.policy),
            stream,
            options: GenerationOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                num_ctx: options.num_ctx,
                top_p: options.top_p,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, MessageRole};
    use serde_json::json;

    fn options() -> FramingOptions {
        FramingOptions { policy: PromptPolicy::Adaptive, num_ctx: Some(4096), top_p: None }
    }

    #[test]
    fn debug_keyword_in_any_case_selects_debugging_prompt() {
        for text in ["Please Debug this", "I get an ERROR on line 3", "debugger hangs"] {
            let messages = vec![ChatMessage::user(text)];
            assert_eq!(
                select_system_prompt(&messages, PromptPolicy::Adaptive),
                DEBUGGING_PROMPT,
                "{text}"
            );
        }
    }

    #[test]
    fn keyword_in_earlier_message_still_counts() {
        let messages = vec![
            ChatMessage::user("this throws an Error"),
            ChatMessage::new(MessageRole::Assistant, "try this"),
            ChatMessage::user("thanks, now write a test"),
        ];
        assert_eq!(select_system_prompt(&messages, PromptPolicy::Adaptive), DEBUGGING_PROMPT);
    }

    #[test]
    fn plain_request_selects_code_generation_prompt() {
        let messages = vec![ChatMessage::user("write a factorial function in rust")];
        assert_eq!(
            select_system_prompt(&messages, PromptPolicy::Adaptive),
            CODE_GENERATION_PROMPT
        );
    }

    #[test]
    fn fixed_policy_ignores_content() {
        let messages = vec![ChatMessage::user("debug this error")];
        assert_eq!(select_system_prompt(&messages, PromptPolicy::Fixed), CODE_GENERATION_PROMPT);
    }

    #[test]
    fn framing_prepends_system_and_preserves_order() {
        let messages = vec![
            ChatMessage::user("one"),
            ChatMessage::new(MessageRole::Assistant, "two"),
            ChatMessage::user("three"),
        ];
        let framed = frame_messages(&messages, PromptPolicy::Adaptive);
        assert_eq!(framed.len(), 4);
        assert_eq!(framed[0].role, MessageRole::System);
        assert_eq!(&framed[1..], &messages[..]);
    }

    #[test]
    fn payload_serializes_to_ollama_chat_body() {
        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        request.temperature = 0.2;
        request.max_tokens = 128;

        let payload = UpstreamPayload::build(&request, "codellama:latest", &options(), true);
        let body = serde_json::to_value(&payload).unwrap();

        assert_eq!(body["model"], "codellama:latest");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1], json!({ "role": "user", "content": "hi" }));
        assert_eq!(body["options"]["num_predict"], 128);
        assert_eq!(body["options"]["num_ctx"], 4096);
        assert!(body["options"].get("top_p").is_none());
    }
}
