//! Generative service abstraction.
//!
//! The [`GenerativeClient`] trait decouples the generation loop from the model
//! backend. [`OpenAiClient`] talks to an OpenAI-compatible chat-completions
//! endpoint; tests use scripted clients that return canned replies.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::conversation::Message;
use crate::io::config::ModelConfig;

pub trait GenerativeClient {
    /// Send the full ordered history and return the generated content.
    fn complete(&self, history: &[Message]) -> Result<String>;
}

/// Blocking client for `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    /// Build a client with the API key read from `config.api_key_env`.
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable is not set", config.api_key_env))?;
        Self::new(config, api_key)
    }
}

impl GenerativeClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = history.len()))]
    fn complete(&self, history: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: history,
            temperature: self.temperature,
        };
        debug!(endpoint = %self.endpoint, "sending chat completion request");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("send chat completion request")?;

        let status = response.status();
        let body = response.text().context("read chat completion response")?;
        if !status.is_success() {
            warn!(%status, "chat completion request rejected");
            return Err(anyhow!("{}", api_error_message(status.as_u16(), &body)));
        }
        parse_completion(&body)
    }
}

/// Extract the first choice's content from a chat-completions response body.
fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("parse chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion response has no message content"))
}

fn api_error_message(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    format!("chat completion API error (HTTP {status}): {message}")
}
