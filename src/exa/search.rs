use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chat::SearchResult;
use crate::openai::Completion;

/// Ranked results for a query plus a generated summary of them.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub summary: String,
}

#[async_trait]
pub trait Search: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, Error>;
}

// Only the fields we use from an Exa hit
#[derive(Deserialize, Debug)]
struct ExaHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ExaResponse {
    results: Vec<ExaHit>,
}

impl From<ExaHit> for SearchResult {
    fn from(hit: ExaHit) -> Self {
        SearchResult {
            title: hit.title.unwrap_or_default(),
            url: hit.url,
            snippet: hit.summary.filter(|s| !s.is_empty()),
            text: hit.text,
        }
    }
}

pub fn summary_prompt(query: &str, results: &[SearchResult]) -> String {
    let sources = results
        .iter()
        .map(|r| format!("{}\n{}", r.title, r.text.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Summarize the following information from multiple sources about \"{}\":\n\n{}\n\nProvide a concise summary:",
        query, sources
    )
}

/// Neural search against the Exa API. The summary is produced by
/// the completion client from the concatenated result texts.
pub struct ExaClient {
    api_hostname: String,
    api_key: String,
    num_results: u8,
    completion: Arc<dyn Completion>,
}

impl ExaClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        num_results: u8,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            num_results,
            completion,
        }
    }

    async fn find(&self, query: &str) -> Result<Vec<SearchResult>, Error> {
        let url = format!("{}/search", self.api_hostname.trim_end_matches("/"));
        let payload = json!({
            "query": query,
            "type": "neural",
            "useAutoprompt": true,
            "numResults": self.num_results,
            "contents": {
                "text": true,
                "summary": true,
            },
        });
        tracing::debug!("Searching {} for {:?}", url, query);

        let resp: ExaResponse = reqwest::Client::new()
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.results.into_iter().map(SearchResult::from).collect())
    }
}

#[async_trait]
impl Search for ExaClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, Error> {
        let results = self.find(query).await?;
        let summary = self
            .completion
            .complete(&summary_prompt(query, &results))
            .await?;
        Ok(SearchResponse { results, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct RecordingCompletion {
        answer: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Completion for RecordingCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().ok_or(anyhow!("completion down"))
        }

        async fn title(&self, _user_text: &str, _reply_text: &str) -> Result<String> {
            Err(anyhow!("not used"))
        }
    }

    const EXA_BODY: &str = r#"{
        "requestId": "abc",
        "autopromptString": "latest rust release",
        "results": [
            {
                "id": "https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html",
                "title": "Announcing Rust 1.80.0",
                "url": "https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html",
                "text": "The Rust team is happy to announce 1.80.0",
                "summary": "Rust 1.80 adds LazyLock."
            },
            {
                "id": "https://github.com/rust-lang/rust/releases",
                "title": null,
                "url": "https://github.com/rust-lang/rust/releases",
                "text": "Releases"
            }
        ]
    }"#;

    #[test]
    fn it_builds_summary_prompt() {
        let results = vec![
            SearchResult {
                title: "A".to_string(),
                url: "https://a.example".to_string(),
                snippet: None,
                text: Some("alpha".to_string()),
            },
            SearchResult {
                title: "B".to_string(),
                url: "https://b.example".to_string(),
                snippet: None,
                text: None,
            },
        ];
        assert_eq!(
            summary_prompt("letters", &results),
            "Summarize the following information from multiple sources about \"letters\":\n\nA\nalpha\n\nB\n\n\nProvide a concise summary:"
        );
    }

    #[tokio::test]
    async fn it_searches_and_summarizes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_header("x-api-key", "exa-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "query": "latest rust release",
                "type": "neural",
                "numResults": 4,
                "contents": {"text": true, "summary": true}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(EXA_BODY)
            .create();

        let completion = Arc::new(RecordingCompletion {
            answer: Some("Rust 1.80 released...".to_string()),
            prompts: Mutex::new(vec![]),
        });
        let url = server.url();
        let client = ExaClient::new(&url, "exa-key", 4, completion.clone());

        let resp = client.search("latest rust release").await.unwrap();

        mock.assert();
        assert_eq!(resp.summary, "Rust 1.80 released...");
        assert_eq!(resp.results.len(), 2);
        assert_eq!(resp.results[0].title, "Announcing Rust 1.80.0");
        assert_eq!(resp.results[0].snippet.as_deref(), Some("Rust 1.80 adds LazyLock."));
        assert_eq!(resp.results[1].title, "");
        assert!(resp.results[1].snippet.is_none());

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Announcing Rust 1.80.0\nThe Rust team is happy to announce 1.80.0"));
    }

    #[tokio::test]
    async fn it_fails_when_summary_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(EXA_BODY)
            .create();

        let completion = Arc::new(RecordingCompletion {
            answer: None,
            prompts: Mutex::new(vec![]),
        });
        let url = server.url();
        let client = ExaClient::new(&url, "exa-key", 4, completion);

        assert!(client.search("latest rust release").await.is_err());
    }

    #[tokio::test]
    async fn it_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(401)
            .with_body(r#"{"error": "Invalid API key"}"#)
            .create();

        let completion = Arc::new(RecordingCompletion {
            answer: Some("unused".to_string()),
            prompts: Mutex::new(vec![]),
        });
        let url = server.url();
        let client = ExaClient::new(&url, "bad-key", 4, completion.clone());

        assert!(client.search("anything").await.is_err());
        assert!(completion.prompts.lock().unwrap().is_empty());
    }
}
