//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{Router, body::Body};
use tempfile::TempDir;
use tokio::sync::Notify;

use parley::api::AppState;
use parley::api::app;
use parley::chat::{
    Chat, ChatError, ChatStore, ChatSummary, Message, NewChat, SearchResult,
    SessionController, SqliteChatStore,
};
use parley::core::AppConfig;
use parley::core::db::{async_db, initialize_db};
use parley::exa::{Search, SearchResponse};
use parley::openai::Completion;

/// Completion client with canned answers. `None` makes the call fail.
pub struct FakeCompletion {
    pub reply: Option<String>,
    pub title: Option<String>,
}

impl FakeCompletion {
    pub fn new(reply: &str, title: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            title: Some(title.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            title: None,
        }
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("connection refused"))
    }

    async fn title(&self, _user_text: &str, _reply_text: &str) -> Result<String> {
        self.title.clone().ok_or_else(|| anyhow!("title failed"))
    }
}

/// Completion client that holds every reply until `release` is
/// called, for observing the session while a send is in flight.
pub struct GatedCompletion {
    gate: Notify,
}

impl GatedCompletion {
    pub fn new() -> Self {
        Self {
            gate: Notify::new(),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Completion for GatedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.gate.notified().await;
        Ok("hi there".to_string())
    }

    async fn title(&self, _user_text: &str, _reply_text: &str) -> Result<String> {
        Ok("Friendly Greeting".to_string())
    }
}

pub struct FakeSearch {
    pub response: Option<SearchResponse>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self {
            response: Some(SearchResponse {
                results: vec![
                    SearchResult {
                        title: "Announcing Rust 1.80.0".to_string(),
                        url: "https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html"
                            .to_string(),
                        snippet: Some("LazyCell and LazyLock are stable".to_string()),
                        text: None,
                    },
                    SearchResult {
                        title: "This Week in Rust 557".to_string(),
                        url: "https://this-week-in-rust.org/blog/2024/07/31/this-week-in-rust-557/"
                            .to_string(),
                        snippet: None,
                        text: None,
                    },
                ],
                summary: "Rust 1.80 stabilized lazy types.".to_string(),
            }),
        }
    }

    pub fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl Search for FakeSearch {
    async fn search(&self, _query: &str) -> Result<SearchResponse> {
        self.response.clone().ok_or_else(|| anyhow!("search failed"))
    }
}

/// Wraps the sqlite store to count writes and to simulate an outage.
pub struct CountingStore {
    inner: SqliteChatStore,
    pub creates: AtomicUsize,
    pub appends: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl CountingStore {
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> parley::chat::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for CountingStore {
    async fn create(&self, chat: NewChat) -> parley::chat::Result<String> {
        self.check()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(chat).await
    }

    async fn append_message(&self, id: &str, msg: &Message) -> parley::chat::Result<()> {
        self.check()?;
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append_message(id, msg).await
    }

    async fn get(&self, id: &str) -> parley::chat::Result<Option<Chat>> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn list_all(&self) -> parley::chat::Result<Vec<Chat>> {
        self.check()?;
        self.inner.list_all().await
    }

    async fn list_summaries(&self) -> parley::chat::Result<Vec<ChatSummary>> {
        self.check()?;
        self.inner.list_summaries().await
    }

    async fn delete(&self, id: &str) -> parley::chat::Result<()> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn rename(&self, id: &str, title: &str) -> parley::chat::Result<()> {
        self.check()?;
        self.inner.rename(id, title).await
    }
}

/// A migrated sqlite database in a temporary directory. The directory
/// is removed when `TempDir` is dropped so keep it alive for the test.
pub async fn test_db() -> (TempDir, tokio_rusqlite::Connection) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("parley.db");
    let db = async_db(db_path.to_str().unwrap())
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to migrate db");
        Ok(())
    })
    .await
    .unwrap();
    (dir, db)
}

pub async fn test_store() -> (TempDir, Arc<CountingStore>) {
    let (dir, db) = test_db().await;
    let store = CountingStore {
        inner: SqliteChatStore::new(db),
        creates: AtomicUsize::new(0),
        appends: AtomicUsize::new(0),
        unavailable: AtomicBool::new(false),
    };
    (dir, Arc::new(store))
}

pub fn test_controller(
    completion: FakeCompletion,
    search: FakeSearch,
    store: Arc<CountingStore>,
) -> SessionController {
    SessionController::builder(Arc::new(completion), Arc::new(search), store).build()
}

pub fn test_config(storage_path: &str, require_auth: bool) -> AppConfig {
    AppConfig {
        storage_path: storage_path.to_string(),
        db_path: format!("{}/parley.db", storage_path),
        openai_model: String::from("gpt-3.5-turbo"),
        openai_api_hostname: String::from("http://localhost:1"),
        openai_api_key: String::from("test-api-key"),
        system_message: String::from("You are a helpful assistant."),
        exa_api_hostname: String::from("http://localhost:1"),
        exa_api_key: String::from("test-exa-key"),
        search_num_results: 4,
        require_auth,
    }
}

/// Creates a test application router backed by fakes and a temporary
/// database. Returns the store so tests can inspect what was written.
pub async fn test_app(require_auth: bool) -> (TempDir, Arc<CountingStore>, Router) {
    let completion = Arc::new(FakeCompletion::new("hi there", "Friendly Greeting"));
    test_app_with_completion(completion, require_auth).await
}

pub async fn test_app_with_completion(
    completion: Arc<dyn Completion>,
    require_auth: bool,
) -> (TempDir, Arc<CountingStore>, Router) {
    let (dir, store) = test_store().await;
    let controller = SessionController::builder(
        completion,
        Arc::new(FakeSearch::new()),
        Arc::clone(&store) as Arc<dyn ChatStore>,
    )
    .build();
    let config = test_config(dir.path().to_str().unwrap(), require_auth);
    let app_state = AppState::new(controller, config);
    (dir, store, app(Arc::new(RwLock::new(app_state))))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body was not utf8")
}
