use std::sync::LazyLock;

use regex::Regex;

use super::models::Message;
use crate::openai::Completion;

pub const FALLBACK_TITLE: &str = "Untitled Chat";
pub const SEARCH_REPLY_PLACEHOLDER: &str = "Search results";
pub const MAX_TITLE_WORDS: usize = 4;

static WRAPPING_QUOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^["'`*]+|["'`*.]+$"#).expect("Invalid title regex")
});

/// Normalize a generated title, returning `None` if nothing usable is
/// left.
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.strip_prefix("Title:").unwrap_or(line).trim();
    let line = WRAPPING_QUOTES.replace_all(line, "");
    let title = line
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() { None } else { Some(title) }
}

/// Ask the completion endpoint for a title for the first exchange.
/// Never fails: any error or unusable answer yields `FALLBACK_TITLE`.
pub async fn derive_title(completion: &dyn Completion, user: &Message, reply: &Message) -> String {
    let user_text = user.text.as_deref().unwrap_or_default();
    let reply_text = reply
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(SEARCH_REPLY_PLACEHOLDER);

    match completion.title(user_text, reply_text).await {
        Ok(raw) => clean_title(&raw).unwrap_or_else(|| {
            tracing::warn!("Generated title was empty, using fallback");
            FALLBACK_TITLE.to_string()
        }),
        Err(e) => {
            tracing::error!("Error generating chat title: {}", e);
            FALLBACK_TITLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct TitleOnly {
        answer: Option<String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Completion for TitleOnly {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("not used"))
        }

        async fn title(&self, user_text: &str, reply_text: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((user_text.to_string(), reply_text.to_string()));
            self.answer.clone().ok_or(anyhow!("title endpoint down"))
        }
    }

    #[test]
    fn it_caps_titles_at_four_words() {
        assert_eq!(
            clean_title("Exploring the Rust Release Notes Today").as_deref(),
            Some("Exploring the Rust Release")
        );
    }

    #[test]
    fn it_strips_quotes_and_prefixes() {
        assert_eq!(clean_title("\"Friendly Greeting\"").as_deref(), Some("Friendly Greeting"));
        assert_eq!(clean_title("Title: Rust News.").as_deref(), Some("Rust News"));
        assert_eq!(clean_title("\n\n  Weather Check \n").as_deref(), Some("Weather Check"));
    }

    #[test]
    fn it_rejects_blank_titles() {
        assert!(clean_title("").is_none());
        assert!(clean_title("  \"\" ").is_none());
    }

    #[tokio::test]
    async fn it_uses_placeholder_for_search_replies() {
        let completion = TitleOnly {
            answer: Some("Rust Release News".to_string()),
            seen: Mutex::new(vec![]),
        };
        let user = Message::user("latest rust release");
        let reply = Message::search_results(vec![], "Rust 1.80 released...");

        let title = derive_title(&completion, &user, &reply).await;

        assert_eq!(title, "Rust Release News");
        let seen = completion.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                "latest rust release".to_string(),
                SEARCH_REPLY_PLACEHOLDER.to_string()
            )
        );
    }

    #[tokio::test]
    async fn it_falls_back_when_generation_fails() {
        let completion = TitleOnly {
            answer: None,
            seen: Mutex::new(vec![]),
        };
        let title = derive_title(
            &completion,
            &Message::user("hello"),
            &Message::assistant("hi there"),
        )
        .await;
        assert_eq!(title, FALLBACK_TITLE);
    }
}
