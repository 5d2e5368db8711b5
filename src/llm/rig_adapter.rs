//! Adapter from rig's `CompletionModel` to our [`LlmProvider`] trait.

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};
use serde_json::Value;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role,
};

/// Wraps any rig completion model.
///
/// `additional_params` are passed through to the provider untouched; this is
/// where provider-specific generation settings go.
pub struct RigAdapter<M> {
    provider: String,
    model: M,
    model_name: String,
    additional_params: Option<Value>,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(provider: &str, model: M, model_name: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model,
            model_name: model_name.to_string(),
            additional_params: None,
        }
    }

    pub fn with_additional_params(mut self, params: Value) -> Self {
        self.additional_params = Some(params);
        self
    }
}

/// Rig's request shape: system text goes to the preamble, the last message
/// is the prompt and everything before it is history.
struct RigMessages {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

fn split_messages(messages: Vec<ChatMessage>) -> Option<RigMessages> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content),
            Role::User => turns.push(Message::user(msg.content)),
            Role::Assistant => turns.push(Message::assistant(msg.content)),
        }
    }
    let prompt = turns.pop()?;
    Some(RigMessages {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: turns,
        prompt,
    })
}

/// Concatenated text parts of a reply; tool calls and reasoning are dropped.
fn response_text(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn map_error(provider: &str, err: CompletionError) -> LlmError {
    match err {
        CompletionError::ProviderError(message) => LlmError::ProviderError {
            provider: provider.to_string(),
            message,
        },
        CompletionError::ResponseError(reason) => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason,
        },
        other => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let RigMessages {
            preamble,
            history,
            prompt,
        } = split_messages(request.messages).ok_or_else(|| LlmError::RequestFailed {
            provider: self.provider.clone(),
            reason: "request has no user or assistant message".to_string(),
        })?;

        let mut builder = self
            .model
            .completion_request(prompt)
            .messages(history)
            .temperature_opt(request.temperature)
            .max_tokens_opt(request.max_tokens)
            .additional_params_opt(self.additional_params.clone());
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(&self.provider, e))?;

        let content = response_text(&response.choice);
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.clone(),
            });
        }

        tracing::debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );
        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_preamble() {
        let split = split_messages(vec![
            ChatMessage::system("be terse"),
            ChatMessage::system("answer in JSON"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("classify this"),
        ])
        .unwrap();

        assert_eq!(split.preamble.as_deref(), Some("be terse\n\nanswer in JSON"));
        assert_eq!(split.history.len(), 2);
    }

    #[test]
    fn single_user_message_has_no_history() {
        let split = split_messages(vec![ChatMessage::user("hello")]).unwrap();
        assert!(split.preamble.is_none());
        assert!(split.history.is_empty());
    }

    #[test]
    fn system_only_request_is_rejected() {
        assert!(split_messages(vec![ChatMessage::system("rules")]).is_none());
        assert!(split_messages(Vec::new()).is_none());
    }

    #[test]
    fn text_parts_are_joined() {
        let choice = OneOrMany::many(vec![
            AssistantContent::text("{\"action\":"),
            AssistantContent::text("\"IGNORE\"}"),
        ])
        .unwrap();
        assert_eq!(response_text(&choice), "{\"action\":\"IGNORE\"}");
    }

    #[test]
    fn provider_errors_keep_their_body() {
        match map_error("gemini", CompletionError::ProviderError("429 quota".into())) {
            LlmError::ProviderError { provider, message } => {
                assert_eq!(provider, "gemini");
                assert!(message.contains("quota"));
            }
            other => panic!("Expected ProviderError, got {:?}", other),
        }
        assert!(matches!(
            map_error("gemini", CompletionError::ResponseError("no candidates".into())),
            LlmError::InvalidResponse { .. }
        ));
    }
}
