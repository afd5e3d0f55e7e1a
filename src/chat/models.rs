//! The core models for a conversation and its persisted record.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    SearchResults,
}

/// One hit from the search endpoint, kept verbatim.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SearchResult {
    pub fn hostname(&self) -> Option<String> {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(String::from))
    }

    pub fn favicon_url(&self) -> Option<String> {
        self.hostname()
            .map(|host| format!("https://www.google.com/s2/favicons?domain={}&sz=16", host))
    }
}

/// One turn in a conversation. Immutable once appended to a
/// transcript.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub r#type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Message {
    fn text_message(text: &str, is_user: bool) -> Self {
        Message {
            r#type: MessageType::Text,
            text: Some(text.to_string()),
            is_user,
            timestamp: Utc::now(),
            results: None,
            summary: None,
        }
    }

    pub fn user(text: &str) -> Self {
        Self::text_message(text, true)
    }

    pub fn assistant(text: &str) -> Self {
        Self::text_message(text, false)
    }

    pub fn search_results(results: Vec<SearchResult>, summary: &str) -> Self {
        Message {
            r#type: MessageType::SearchResults,
            text: None,
            is_user: false,
            timestamp: Utc::now(),
            results: Some(results),
            summary: Some(summary.to_string()),
        }
    }

    pub fn is_search_results(&self) -> bool {
        self.r#type == MessageType::SearchResults
    }
}

/// Append-only, insertion-ordered sequence of messages for the active
/// session.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}

/// A persisted conversation as returned by the store.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a client supplies when materializing a chat. The store
/// assigns the id and both timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChat {
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Chat> for ChatSummary {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            created_at: chat.created_at,
            updated_at: chat.updated_at,
            message_count: chat.messages.len(),
        }
    }
}
