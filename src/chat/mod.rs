mod error;
pub use error::{ChatError, Result};

pub mod index;
pub use index::{ChatIndex, DateGroup, date_label, reindex};

pub mod models;
pub use models::{Chat, ChatSummary, Message, MessageType, NewChat, SearchResult, Transcript};

pub mod session;
pub use session::{
    PendingSend, Session, SessionController, SessionControllerBuilder, error_message,
};

pub mod store;
pub use store::{ChatStore, SqliteChatStore};

pub mod title;
pub use title::{FALLBACK_TITLE, SEARCH_REPLY_PLACEHOLDER, derive_title};
