//! Public types for the chat API
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatIndex, ChatSummary, Message, SessionController, date_label};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct SearchModeRequest {
    pub search: bool,
}

/// The active session as the UI renders it.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub chat_id: Option<String>,
    pub title: String,
    pub messages: Vec<Message>,
    pub search_mode: bool,
    pub busy: bool,
    pub persist_error: Option<String>,
    pub unsaved_messages: usize,
}

impl From<&SessionController> for SessionView {
    fn from(controller: &SessionController) -> Self {
        let session = controller.session();
        Self {
            chat_id: session.chat_id.clone(),
            title: session.title.clone(),
            messages: session.transcript.messages().to_vec(),
            search_mode: controller.search_mode(),
            busy: controller.is_busy(),
            persist_error: controller.persist_error().map(|e| e.to_string()),
            unsaved_messages: session.unsaved_messages,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: Message,
    pub session: SessionView,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoadChatResponse {
    pub found: bool,
    pub session: SessionView,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DateGroupView {
    pub date: NaiveDate,
    pub label: String,
    pub chats: Vec<ChatSummary>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatSessionsResponse {
    pub groups: Vec<DateGroupView>,
    pub total_chats: usize,
}

impl ChatSessionsResponse {
    pub fn new(index: &ChatIndex, today: NaiveDate) -> Self {
        let groups = index
            .groups()
            .iter()
            .map(|g| DateGroupView {
                date: g.date,
                label: date_label(g.date, today),
                chats: g.chats.clone(),
            })
            .collect();
        Self {
            groups,
            total_chats: index.len(),
        }
    }
}
