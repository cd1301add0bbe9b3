use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for crawl-agent
///
/// Every section and key is optional; a missing file is equivalent to
/// `Config::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Depth limit used when the parsed intent does not carry one
    #[serde(rename = "default-max-depth")]
    pub default_max_depth: u32,

    /// Drop page links that leave the page's host (download links are always kept)
    #[serde(rename = "same-domain-only")]
    pub same_domain_only: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 2,
            same_domain_only: true,
        }
    }
}

/// Outbound HTTP behaviour for page fetches and file downloads
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Minimum time between two outbound requests (milliseconds)
    #[serde(rename = "request-interval-ms")]
    pub request_interval_ms: u64,

    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    #[serde(rename = "download-timeout-secs")]
    pub download_timeout_secs: u64,

    /// Attempts per request, including the first one
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff between attempts (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("crawl-agent/{}", env!("CARGO_PKG_VERSION")),
            request_interval_ms: 1000,
            fetch_timeout_secs: 30,
            download_timeout_secs: 300,
            max_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

/// Locations of the file-backed state
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "index-path")]
    pub index_path: PathBuf,

    #[serde(rename = "history-path")]
    pub history_path: PathBuf,

    /// Root under which default save paths are derived
    #[serde(rename = "datasets-dir")]
    pub datasets_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/index.json"),
            history_path: PathBuf::from("data/crawl_history.json"),
            datasets_dir: PathBuf::from("data/datasets"),
        }
    }
}

/// Chat completion endpoint used by the decision gateway
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (without `/chat/completions`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    pub model: String,

    /// Environment variables searched, in order, for the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: Vec<String>,

    pub temperature: f32,

    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            model: "qwen-flash".to_string(),
            api_key_env: vec!["LLM_API_KEY".to_string(), "DASHSCOPE_API_KEY".to_string()],
            temperature: 0.1,
            max_retries: 3,
            timeout_secs: 120,
        }
    }
}
