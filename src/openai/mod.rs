mod core;
pub use self::core::{
    Completion, Message, OpenAiClient, Role, TITLE_SYSTEM_PROMPT, completion, completion_content,
};
