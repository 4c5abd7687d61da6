use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use jobradar_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = r#"
[service]
log_level = "info"

[storage.postgres]
dsn            = "postgres://localhost/jobradar"
pool_max_conns = 4

[providers.scraper]
api_base   = "https://app.scrapingbee.com/api/v1"
api_key    = "scrape-key"
timeout_ms = 30000

[providers.llm_extractor]
api_base    = "https://api.openai.example"
api_key     = "llm-key"
path        = "/v1/chat/completions"
model       = "gpt-4o-mini"
temperature = 0.0
max_tokens  = 2048
timeout_ms  = 60000

[providers.embedding]
api_base   = "https://api.openai.example"
api_key    = "embed-key"
path       = "/v1/embeddings"
model      = "text-embedding-3-small"
dimensions = 512
timeout_ms = 30000

[providers.billing]
api_base   = "https://api.stripe.example/v1"
api_key    = "billing-key"
timeout_ms = 15000

[pipeline]
board_urls = ["https://boards.example.com/search?q=engineer", "  ", ""]
"#;

fn write_temp_config(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("jobradar_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_sample(payload: &str) -> Result<Config, Error> {
	let path = write_temp_config(payload);
	let result = jobradar_config::load(&path);

	let _ = fs::remove_file(&path);

	result
}

#[test]
fn sample_config_loads_with_defaults() {
	let cfg = load_sample(SAMPLE_CONFIG_TOML).expect("Sample config must load.");

	assert_eq!(cfg.providers.embedding.dimensions, 512);
	assert_eq!(cfg.matching.fetch_page_size, 1_000);
	assert_eq!(cfg.matching.insert_batch_size, 500);
	assert_eq!(cfg.pipeline.scrape_concurrency, 5);
	assert_eq!(cfg.pipeline.rate_limit_per_sec, 10);
	assert_eq!(cfg.pipeline.retry_max_attempts, 3);
	assert_eq!(cfg.schedule.scrape_sweep_secs, 14_400);
	assert!(cfg.providers.scraper.render_js);
}

#[test]
fn normalize_drops_blank_board_urls() {
	let cfg = load_sample(SAMPLE_CONFIG_TOML).expect("Sample config must load.");

	assert_eq!(cfg.pipeline.board_urls, vec![
		"https://boards.example.com/search?q=engineer".to_string()
	]);
}

#[test]
fn empty_api_keys_are_rejected() {
	let payload = SAMPLE_CONFIG_TOML.replace("api_key    = \"embed-key\"", "api_key    = \"\"");
	let err = load_sample(&payload).expect_err("Empty api_key must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn zero_dimensions_are_rejected() {
	let payload = SAMPLE_CONFIG_TOML.replace("dimensions = 512", "dimensions = 0");
	let err = load_sample(&payload).expect_err("Zero dimensions must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn subscriber_limit_must_cover_free_limit() {
	let payload = format!(
		"{SAMPLE_CONFIG_TOML}\n[matching]\nfree_keyword_limit = 10\nsubscriber_keyword_limit = 5\n"
	);
	let err = load_sample(&payload).expect_err("Inverted keyword limits must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn missing_file_reports_read_error() {
	let err = jobradar_config::load(std::path::Path::new("/nonexistent/jobradar.toml"))
		.expect_err("Missing file must error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
