//! Hosted text-inference backend.
//!
//! Talks to a hosted inference endpoint that takes a single prompt string
//! and returns `[{"generated_text": ...}]`. The conversation is flattened
//! into `User:` / `<bot>:` lines, the way plain text-generation models
//! expect dialogue.

use async_trait::async_trait;
use deskclaw_core::backend::{Generated, GenerationBackend};
use deskclaw_core::error::BackendError;
use deskclaw_core::turn::{Role, Turn};
use serde::Deserialize;
use tracing::{debug, warn};

const SOURCE: &str = "hosted_inference";
const DEFAULT_API_URL: &str = "https://api-inference.huggingface.co/models";

/// A hosted inference-API backend.
pub struct InferenceApiBackend {
    base_url: String,
    api_key: String,
    model: String,
    bot_name: String,
    client: reqwest::Client,
}

impl InferenceApiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self::with_base_url(DEFAULT_API_URL, api_key, model, bot_name)
    }

    pub fn with_base_url(
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

    /// Flatten prior turns and the new message into a dialogue prompt.
    fn build_prompt(&self, message: &str, prior_turns: &[Turn]) -> String {
        let mut prompt = String::new();
        for turn in prior_turns {
            match turn.role {
                Role::User => {
                    prompt.push_str("User: ");
                    prompt.push_str(&turn.body);
                    prompt.push('\n');
                }
                Role::Bot => {
                    prompt.push_str(&self.bot_name);
                    prompt.push_str(": ");
                    prompt.push_str(&turn.body);
                    prompt.push('\n');
                }
            }
        }
        prompt.push_str("User: ");
        prompt.push_str(message);
        prompt.push('\n');
        prompt.push_str(&self.bot_name);
        prompt.push(':');
        prompt
    }
}

#[async_trait]
impl GenerationBackend for InferenceApiBackend {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn generate(
        &self,
        message: &str,
        prior_turns: &[Turn],
    ) -> Result<Generated, BackendError> {
        let url = format!("{}/{}", self.base_url, self.model);
        let prompt = self.build_prompt(message, prior_turns);

        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": 150,
                "temperature": 0.7,
                "return_full_text": false,
                "do_sample": true,
            }
        });

        debug!(model = %self.model, "Sending inference request");

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
                "Invalid inference API token".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Inference API returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let outputs: Vec<InferenceOutput> =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse(format!(
                    "Failed to parse response: {e}"
                )))?;

        let text = outputs
            .into_iter()
            .next()
            .map(|o| o.generated_text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BackendError::InvalidResponse("No generated text in response".into())
            })?;

        Ok(Generated {
            text,
            confidence: 0.8,
            source: SOURCE.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskclaw_core::session::SessionId;
    use deskclaw_core::turn::TurnKind;

    fn backend() -> InferenceApiBackend {
        InferenceApiBackend::new("hf-test", "my-org/dialog-model", "SupportBot")
    }

    #[test]
    fn prompt_flattens_dialogue() {
        let sid = SessionId::new();
        let turns = vec![
            Turn::user(&sid, "hi"),
            Turn::bot(&sid, "hello, how can I help?", TurnKind::Text, 0.9),
        ];
        let prompt = backend().build_prompt("my order is late", &turns);
        assert_eq!(
            prompt,
            "User: hi\nSupportBot: hello, how can I help?\nUser: my order is late\nSupportBot:"
        );
    }

    #[test]
    fn prompt_without_history() {
        let prompt = backend().build_prompt("hello", &[]);
        assert_eq!(prompt, "User: hello\nSupportBot:");
    }

    #[test]
    fn parse_inference_output() {
        let data = r#"[{"generated_text": " We ship within two days. "}]"#;
        let parsed: Vec<InferenceOutput> = serde_json::from_str(data).unwrap();
        assert_eq!(parsed[0].generated_text.trim(), "We ship within two days.");
    }

    #[test]
    fn default_base_url() {
        assert!(backend().base_url.contains("api-inference.huggingface.co"));
    }
}
