use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A role-tagged message in the wire format of an OpenAI compatible
/// chat completion API.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Send `messages` to `{api_hostname}/v1/chat/completions` and return
/// the raw JSON response.
pub async fn completion(
    messages: &[Message],
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let payload = json!({
        "model": model,
        "messages": messages,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    tracing::debug!("Requesting completion from {} with model {}", url, model);

    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response)
}

/// Pull the generated text out of a completion response.
pub fn completion_content(resp: &Value) -> Result<String, Error> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or(anyhow!("No message received. Resp:\n\n {}", resp))
}

/// A hosted chat-completion endpoint. Used for chat replies and for
/// the short generated texts (titles, search summaries) that are
/// distinguished only by prompt.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Generate a reply to a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String, Error>;

    /// Generate a short title for a conversation from its first
    /// exchange.
    async fn title(&self, user_text: &str, reply_text: &str) -> Result<String, Error>;
}

pub const TITLE_SYSTEM_PROMPT: &str = "Generate a short, concise title (max 4 words hard limit) for this conversation based on the following messages:";

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_hostname: String,
    api_key: String,
    model: String,
    system_message: String,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str, system_message: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            system_message: system_message.to_string(),
        }
    }

    async fn run(&self, messages: &[Message]) -> Result<String, Error> {
        let resp = completion(messages, &self.api_hostname, &self.api_key, &self.model).await?;
        completion_content(&resp)
    }
}

#[async_trait]
impl Completion for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let messages = vec![
            Message::new(Role::System, &self.system_message),
            Message::new(Role::User, prompt),
        ];
        self.run(&messages).await
    }

    async fn title(&self, user_text: &str, reply_text: &str) -> Result<String, Error> {
        let messages = vec![
            Message::new(Role::System, TITLE_SYSTEM_PROMPT),
            Message::new(Role::User, user_text),
            Message::new(Role::Assistant, reply_text),
        ];
        let title = self.run(&messages).await?;
        Ok(title.trim().to_string())
    }
}
