mod search;
pub use search::{ExaClient, Search, SearchResponse, summary_prompt};
