use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub pipeline: Pipeline,
	#[serde(default)]
	pub schedule: Schedule,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub scraper: ScraperConfig,
	pub llm_extractor: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub billing: BillingProviderConfig,
}

/// Rendered-page scraping service. The API key travels as a query
/// parameter, not a header.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_true")]
	pub render_js: bool,
	#[serde(default = "default_scrape_wait_ms")]
	pub wait_ms: u64,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Matching {
	pub fetch_page_size: u32,
	pub insert_batch_size: u32,
	pub free_keyword_limit: u32,
	pub subscriber_keyword_limit: u32,
	pub inactive_after_days: i64,
}
impl Default for Matching {
	fn default() -> Self {
		Self {
			fetch_page_size: 1_000,
			insert_batch_size: 500,
			free_keyword_limit: 5,
			subscriber_keyword_limit: 25,
			inactive_after_days: 7,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	/// Job-board search result pages visited by the scheduled scrape sweep.
	pub board_urls: Vec<String>,
	pub scrape_concurrency: u32,
	pub rate_limit_per_sec: u32,
	pub retry_max_attempts: u32,
	pub retry_base_backoff_ms: u64,
	pub retry_max_backoff_ms: u64,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self {
			board_urls: Vec::new(),
			scrape_concurrency: 5,
			rate_limit_per_sec: 10,
			retry_max_attempts: 3,
			retry_base_backoff_ms: 500,
			retry_max_backoff_ms: 30_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
	pub scrape_sweep_secs: i64,
	pub dedup_sweep_secs: i64,
	pub rescore_secs: i64,
	pub subscription_sync_secs: i64,
}
impl Default for Schedule {
	fn default() -> Self {
		Self {
			scrape_sweep_secs: 14_400,
			dedup_sweep_secs: 1_800,
			rescore_secs: 3_600,
			subscription_sync_secs: 3_600,
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_scrape_wait_ms() -> u64 {
	1_000
}
