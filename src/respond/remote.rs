//! OpenAI-compatible chat completion tier

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Responder;
use super::retry::is_recoverable;
use crate::config::TierConfig;
use crate::persona::Personality;
use crate::{Error, Result};

/// Which system prompt a tier sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Full personality prompt
    Full,
    /// Shorter prompt for the cheaper fallback model
    Short,
}

/// A remote completion service
pub struct RemoteResponder {
    client: Client,
    name: &'static str,
    api_key: RwLock<Option<SecretString>>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompt: PromptStyle,
}

impl RemoteResponder {
    /// Create a tier from its settings
    #[must_use]
    pub fn new(
        name: &'static str,
        tier: &TierConfig,
        api_key: Option<SecretString>,
        prompt: PromptStyle,
    ) -> Self {
        Self {
            client: Client::new(),
            name,
            api_key: RwLock::new(api_key),
            endpoint: format!("{}/chat/completions", tier.base_url.trim_end_matches('/')),
            model: tier.model.clone(),
            temperature: tier.temperature,
            max_tokens: tier.max_tokens,
            prompt,
        }
    }

    fn system_prompt(&self, personality: Personality) -> String {
        match self.prompt {
            PromptStyle::Full => personality.system_prompt(),
            PromptStyle::Short => personality.short_prompt(),
        }
    }

    fn bearer(&self) -> Option<String> {
        self.api_key
            .read()
            .ok()?
            .as_ref()
            .map(|key| format!("Bearer {}", key.expose_secret()))
    }
}

#[async_trait]
impl Responder for RemoteResponder {
    fn is_configured(&self) -> bool {
        self.api_key
            .read()
            .is_ok_and(|key| key.as_ref().is_some_and(|k| !k.expose_secret().is_empty()))
    }

    fn set_credential(&self, key: Option<String>) {
        if let Ok(mut slot) = self.api_key.write() {
            *slot = key.filter(|k| !k.is_empty()).map(SecretString::from);
        }
    }

    async fn try_respond(&self, text: &str, personality: Personality) -> Result<String> {
        let auth = self
            .bearer()
            .ok_or_else(|| Error::Config(format!("{} tier has no API key", self.name)))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: self.system_prompt(personality),
                },
                Message {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(tier = self.name, model = %self.model, "requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", auth)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("{} request failed: {e}", self.name)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                tier = self.name,
                status = status.as_u16(),
                recoverable = is_recoverable(status.as_u16()),
                "completion rejected"
            );
            return Err(Error::Completion(format!("{} API error {status}: {body}", self.name)));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("malformed {} response: {e}", self.name)))?;

        extract_content(result)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// First choice's trimmed content; missing or blank content is a failure
fn extract_content(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| Error::Completion("empty completion".to_string()))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
