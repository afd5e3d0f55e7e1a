//! The session controller: turns user input into transcript messages,
//! decides when an in-memory conversation is materialized as a stored
//! chat, and keeps the date-grouped index in step with the store.
use std::sync::Arc;

use super::error::{ChatError, Result};
use super::index::{ChatIndex, reindex};
use super::models::{Chat, Message, NewChat, Transcript};
use super::store::ChatStore;
use super::title::{FALLBACK_TITLE, derive_title};
use crate::exa::Search;
use crate::openai::Completion;

/// The active conversation. `chat_id` stays `None` until the first
/// exchange has been written to the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub chat_id: Option<String>,
    pub title: String,
    pub transcript: Transcript,
    /// Exchange messages in the transcript that never reached the
    /// store. Local error messages are not counted.
    pub unsaved_messages: usize,
}

impl Session {
    fn from_chat(chat: Chat) -> Self {
        let title = if chat.title.trim().is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            chat.title
        };
        Self {
            chat_id: Some(chat.id),
            title,
            transcript: Transcript::new_with_messages(chat.messages),
            unsaved_messages: 0,
        }
    }

    pub fn is_bound_to(&self, id: &str) -> bool {
        self.chat_id.as_deref() == Some(id)
    }
}

/// Assistant message shown in place of a reply when the upstream call
/// fails. It is never written to the store.
pub fn error_message(err: &ChatError) -> Message {
    let cause = match err {
        ChatError::UpstreamUnavailable(cause) => cause.as_str(),
        _ => "",
    };
    let text = if cause.is_empty() {
        "Sorry, I couldn't process your request. Please try again.".to_string()
    } else {
        format!(
            "Sorry, I couldn't process your request. Please try again. ({})",
            cause
        )
    };
    Message::assistant(&text)
}

/// Orchestrates a single user's chat session against the completion
/// client, the search client and the chat store.
///
/// A send is split in three steps so callers sharing the controller
/// behind a lock don't have to hold it during the upstream call:
/// `begin_send` appends the user message and marks the controller
/// busy, `PendingSend::request` talks to the upstream without touching
/// the controller, and `finish_send` appends the reply and persists.
/// `send_message` runs all three.
///
/// Use `SessionController::builder()` to construct one.
pub struct SessionController {
    completion: Arc<dyn Completion>,
    search: Arc<dyn Search>,
    store: Arc<dyn ChatStore>,
    session: Session,
    // Bumped whenever the session is replaced
    generation: u64,
    index: ChatIndex,
    search_mode: bool,
    busy: bool,
    persist_error: Option<ChatError>,
}

/// An exchange whose user message is in the transcript and whose
/// reply hasn't been requested or applied yet.
pub struct PendingSend {
    text: String,
    user_msg: Message,
    search_mode: bool,
    chat_id: Option<String>,
    generation: u64,
    completion: Arc<dyn Completion>,
    search: Arc<dyn Search>,
}

impl std::fmt::Debug for PendingSend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSend")
            .field("text", &self.text)
            .field("user_msg", &self.user_msg)
            .field("search_mode", &self.search_mode)
            .field("chat_id", &self.chat_id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PendingSend {
    /// Ask the search or completion client for the reply.
    pub async fn request(&self) -> Result<Message> {
        if self.search_mode {
            tracing::debug!("Performing search: {}", self.text);
            let resp = self
                .search
                .search(&self.text)
                .await
                .map_err(ChatError::upstream)?;
            Ok(Message::search_results(resp.results, &resp.summary))
        } else {
            tracing::debug!("Requesting completion: {}", self.text);
            let reply = self
                .completion
                .complete(&self.text)
                .await
                .map_err(ChatError::upstream)?;
            Ok(Message::assistant(&reply))
        }
    }
}

impl SessionController {
    pub fn builder(
        completion: Arc<dyn Completion>,
        search: Arc<dyn Search>,
        store: Arc<dyn ChatStore>,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder {
            completion,
            search,
            store,
            search_mode: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn index(&self) -> &ChatIndex {
        &self.index
    }

    pub fn search_mode(&self) -> bool {
        self.search_mode
    }

    pub fn set_search_mode(&mut self, enabled: bool) {
        self.search_mode = enabled;
    }

    /// Whether a send has begun and not finished.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The last failure to persist an exchange, if it hasn't been
    /// followed by a successful write. Messages from that exchange
    /// are visible locally but are not in the store.
    pub fn persist_error(&self) -> Option<&ChatError> {
        self.persist_error.as_ref()
    }

    /// Rebuild the index from the store's chat summaries.
    pub async fn refresh_index(&mut self) -> Result<&ChatIndex> {
        let summaries = self.store.list_summaries().await?;
        self.index = reindex(summaries);
        Ok(&self.index)
    }

    async fn refresh_index_after_write(&mut self) {
        if let Err(e) = self.refresh_index().await {
            tracing::error!("Error refreshing chat index: {}", e);
        }
    }

    async fn persist_exchange(&mut self, user_msg: Message, reply: Message) -> Result<()> {
        // Counted down as each message lands in the store
        self.session.unsaved_messages += 2;
        match self.session.chat_id.clone() {
            None => {
                // Title generation degrades to the fallback title
                // rather than failing the exchange
                let title = derive_title(self.completion.as_ref(), &user_msg, &reply).await;
                let id = self
                    .store
                    .create(NewChat {
                        title: title.clone(),
                        messages: vec![user_msg, reply],
                    })
                    .await?;
                tracing::info!("New chat created with ID: {}", id);
                self.session.unsaved_messages -= 2;
                self.session.chat_id = Some(id);
                self.session.title = title;
            }
            Some(id) => {
                for msg in [&user_msg, &reply] {
                    self.store.append_message(&id, msg).await?;
                    self.session.unsaved_messages -= 1;
                }
            }
        }
        Ok(())
    }

    /// Append `text` as the next user turn and mark the controller
    /// busy until the matching `finish_send`.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.busy {
            return Err(ChatError::Busy);
        }

        let user_msg = Message::user(text);
        self.session.transcript.push(user_msg.clone());
        self.busy = true;

        Ok(PendingSend {
            text: text.to_string(),
            user_msg,
            search_mode: self.search_mode,
            chat_id: self.session.chat_id.clone(),
            generation: self.generation,
            completion: Arc::clone(&self.completion),
            search: Arc::clone(&self.search),
        })
    }

    /// Apply the outcome of `pending.request()` and return the
    /// assistant message it produced.
    ///
    /// An upstream failure appends a local-only error message instead
    /// of a reply. A store failure leaves both messages in the
    /// transcript and is reported through `persist_error`.
    pub async fn finish_send(&mut self, pending: PendingSend, reply: Result<Message>) -> Message {
        self.busy = false;

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error getting a reply: {}", e);
                let msg = error_message(&e);
                if pending.generation == self.generation {
                    self.session.transcript.push(msg.clone());
                }
                return msg;
            }
        };

        if pending.generation != self.generation {
            self.finish_abandoned(pending, reply.clone()).await;
            return reply;
        }

        self.session.transcript.push(reply.clone());
        match self.persist_exchange(pending.user_msg, reply.clone()).await {
            Ok(()) => self.persist_error = None,
            Err(e) => {
                tracing::error!("Error saving exchange to the store: {}", e);
                self.persist_error = Some(e);
            }
        }
        self.refresh_index_after_write().await;

        reply
    }

    // The session was replaced while the reply was outstanding. The
    // exchange still belongs to the chat it was sent from, if that
    // chat had been stored.
    async fn finish_abandoned(&mut self, pending: PendingSend, reply: Message) {
        let Some(id) = pending.chat_id else {
            tracing::warn!("Dropping reply for a session that was never saved");
            return;
        };
        for msg in [&pending.user_msg, &reply] {
            if let Err(e) = self.store.append_message(&id, msg).await {
                tracing::error!("Error saving exchange to chat {}: {}", id, e);
                return;
            }
        }
        self.refresh_index_after_write().await;
    }

    /// Send `text` as the next user turn and return the assistant
    /// message appended in response.
    ///
    /// The user message is appended before the upstream call and is
    /// never rolled back. The only errors returned are precondition
    /// violations.
    pub async fn send_message(&mut self, text: &str) -> Result<Message> {
        let pending = self.begin_send(text)?;
        let reply = pending.request().await;
        Ok(self.finish_send(pending, reply).await)
    }

    /// Replace the session with the stored chat `id`. A missing chat
    /// or a failed fetch starts a new empty session instead. Returns
    /// whether the chat was loaded.
    pub async fn load_chat(&mut self, id: &str) -> bool {
        match self.store.get(id).await {
            Ok(Some(chat)) => {
                self.session = Session::from_chat(chat);
                self.generation += 1;
                self.persist_error = None;
                true
            }
            Ok(None) => {
                tracing::warn!("Chat not found: {}", id);
                self.create_new_chat();
                false
            }
            Err(e) => {
                tracing::error!("Error loading chat {}: {}", id, e);
                self.create_new_chat();
                false
            }
        }
    }

    /// Start an empty session. Nothing is written until the next
    /// exchange completes.
    pub fn create_new_chat(&mut self) {
        self.session = Session::default();
        self.generation += 1;
        self.persist_error = None;
    }

    pub async fn delete_chat(&mut self, id: &str) -> Result<()> {
        self.store.delete(id).await?;

        let refreshed = self.refresh_index().await.map(|_| ());
        if let Err(e) = refreshed {
            tracing::error!("Error refreshing chat index after delete: {}", e);
            self.index.remove(id);
        }

        if self.session.is_bound_to(id) {
            self.create_new_chat();
        }
        Ok(())
    }

    /// Rename the chat bound to the current session.
    pub async fn rename_chat(&mut self, id: &str, title: &str) -> Result<()> {
        if !self.session.is_bound_to(id) {
            return Err(ChatError::NotActive(id.to_string()));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::EmptyTitle);
        }

        self.store.rename(id, title).await?;
        self.session.title = title.to_string();
        self.refresh_index_after_write().await;
        Ok(())
    }
}

pub struct SessionControllerBuilder {
    completion: Arc<dyn Completion>,
    search: Arc<dyn Search>,
    store: Arc<dyn ChatStore>,
    search_mode: bool,
}

impl SessionControllerBuilder {
    pub fn search_mode(mut self, enabled: bool) -> Self {
        self.search_mode = enabled;
        self
    }

    pub fn build(self) -> SessionController {
        SessionController {
            completion: self.completion,
            search: self.search,
            store: self.store,
            session: Session::default(),
            generation: 0,
            index: ChatIndex::default(),
            search_mode: self.search_mode,
            busy: false,
            persist_error: None,
        }
    }
}
