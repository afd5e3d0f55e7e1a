pub mod api;
pub mod chat;
pub mod cli;
pub mod core;
pub mod exa;
pub mod openai;
