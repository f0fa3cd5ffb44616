//! Chat-completion backend.
//!
//! Works with OpenAI and any endpoint exposing a compatible
//! `/v1/chat/completions` API. Prior turns are mapped to chat roles and
//! framed by a support-assistant system prompt.

use async_trait::async_trait;
use deskclaw_core::backend::{Generated, GenerationBackend};
use deskclaw_core::error::BackendError;
use deskclaw_core::turn::{Role, Turn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SOURCE: &str = "chat_completion";

/// A chat-completion API backend.
pub struct ChatCompletionBackend {
    base_url: String,
    api_key: String,
    model: String,
    bot_name: String,
    client: reqwest::Client,
}

impl ChatCompletionBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            bot_name: bot_name.into(),
            client,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {}, a helpful customer support assistant. You provide accurate, \
             friendly, and professional responses to customer inquiries. If you cannot \
             answer a question with confidence, suggest escalating to a human agent.",
            self.bot_name
        )
    }

    /// Convert prior turns to chat-completion messages.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Bot => "assistant".into(),
                },
                content: t.body.clone(),
            })
            .collect()
    }

    async fn post_chat(
        &self,
        messages: Vec<ApiMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(BackendError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Chat completion API returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse(format!(
                    "Failed to parse response: {e}"
                )))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.trim().to_string())
    }
}

#[async_trait]
impl GenerationBackend for ChatCompletionBackend {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn generate(
        &self,
        message: &str,
        prior_turns: &[Turn],
    ) -> Result<Generated, BackendError> {
        let mut messages = vec![ApiMessage {
            role: "system".into(),
            content: self.system_prompt(),
        }];
        messages.extend(Self::to_api_messages(prior_turns));
        messages.push(ApiMessage {
            role: "user".into(),
            content: message.to_string(),
        });

        let text = self.post_chat(messages, 150, 0.7).await?;

        Ok(Generated {
            text,
            confidence: 0.9,
            source: SOURCE.into(),
        })
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, BackendError> {
        if turns.is_empty() {
            return Ok("No conversation to summarize.".into());
        }

        let transcript = turns
            .iter()
            .map(|t| {
                let speaker = match t.role {
                    Role::User => "Customer",
                    Role::Bot => "Agent",
                };
                format!("{speaker}: {}", t.body)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            ApiMessage {
                role: "system".into(),
                content: "Summarize this customer support conversation in 2-3 sentences, \
                          highlighting the main issue and resolution status."
                    .into(),
            },
            ApiMessage {
                role: "user".into(),
                content: transcript,
            },
        ];

        self.post_chat(messages, 100, 0.3).await
    }
}

// --- API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskclaw_core::session::SessionId;
    use deskclaw_core::turn::TurnKind;

    fn backend() -> ChatCompletionBackend {
        ChatCompletionBackend::new(
            "https://api.openai.com/v1/",
            "sk-test",
            "gpt-4o-mini",
            "CustomerSupportBot",
        )
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(backend().base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn turn_conversion_maps_roles() {
        let sid = SessionId::new();
        let turns = vec![
            Turn::user(&sid, "my login fails"),
            Turn::bot(&sid, "let me check", TurnKind::Text, 0.9),
        ];
        let api = ChatCompletionBackend::to_api_messages(&turns);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "user");
        assert_eq!(api[1].role, "assistant");
        assert_eq!(api[1].content, "let me check");
    }

    #[test]
    fn system_prompt_mentions_bot_name() {
        assert!(backend().system_prompt().contains("CustomerSupportBot"));
    }

    #[test]
    fn parse_api_response() {
        let data = r#"{"choices":[{"message":{"role":"assistant","content":"Sure, I can help."}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Sure, I can help.");
    }

    #[tokio::test]
    async fn summarize_empty_short_circuits() {
        let summary = backend().summarize(&[]).await.unwrap();
        assert_eq!(summary, "No conversation to summarize.");
    }
}
