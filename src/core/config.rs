use std::env;

const DEFAULT_SEARCH_RESULTS: u8 = 4;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub openai_model: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub system_message: String,
    pub exa_api_hostname: String,
    pub exa_api_key: String,
    pub search_num_results: u8,
    pub require_auth: bool,
}

impl AppConfig {
    /// Build the config from any key lookup. `Default` uses the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_path = lookup("PARLEY_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/parley.db", storage_path.trim_end_matches('/'));
        let openai_api_hostname =
            lookup("PARLEY_LLM_HOST").unwrap_or_else(|| "https://api.openai.com".to_string());
        let openai_api_key = lookup("OPENAI_API_KEY").unwrap_or_default();
        let openai_model =
            lookup("PARLEY_LLM_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string());
        let system_message = lookup("PARLEY_SYSTEM_MESSAGE")
            .unwrap_or_else(|| "You are a helpful assistant.".to_string());
        let exa_api_hostname =
            lookup("PARLEY_EXA_HOST").unwrap_or_else(|| "https://api.exa.ai".to_string());
        let exa_api_key = lookup("EXA_API_KEY").unwrap_or_default();
        let search_num_results = lookup("PARLEY_SEARCH_RESULTS")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_SEARCH_RESULTS);
        let require_auth = lookup("PARLEY_REQUIRE_AUTH")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Self {
            storage_path,
            db_path,
            openai_model,
            openai_api_hostname,
            openai_api_key,
            system_message,
            exa_api_hostname,
            exa_api_key,
            search_num_results,
            require_auth,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}
