mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BillingProviderConfig, Config, EmbeddingProviderConfig, LlmProviderConfig, Matching, Pipeline,
	Postgres, Providers, Schedule, ScraperConfig, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.llm_extractor.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.llm_extractor.max_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.fetch_page_size == 0 {
		return Err(Error::Validation {
			message: "matching.fetch_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.insert_batch_size == 0 {
		return Err(Error::Validation {
			message: "matching.insert_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.free_keyword_limit == 0 {
		return Err(Error::Validation {
			message: "matching.free_keyword_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.subscriber_keyword_limit < cfg.matching.free_keyword_limit {
		return Err(Error::Validation {
			message:
				"matching.subscriber_keyword_limit must be at least matching.free_keyword_limit."
					.to_string(),
		});
	}
	if cfg.pipeline.scrape_concurrency == 0 {
		return Err(Error::Validation {
			message: "pipeline.scrape_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.rate_limit_per_sec == 0 {
		return Err(Error::Validation {
			message: "pipeline.rate_limit_per_sec must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.retry_max_attempts == 0 {
		return Err(Error::Validation {
			message: "pipeline.retry_max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.retry_base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "pipeline.retry_base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.retry_max_backoff_ms < cfg.pipeline.retry_base_backoff_ms {
		return Err(Error::Validation {
			message: "pipeline.retry_max_backoff_ms must be at least pipeline.retry_base_backoff_ms."
				.to_string(),
		});
	}

	for (label, secs) in [
		("schedule.scrape_sweep_secs", cfg.schedule.scrape_sweep_secs),
		("schedule.dedup_sweep_secs", cfg.schedule.dedup_sweep_secs),
		("schedule.rescore_secs", cfg.schedule.rescore_secs),
		("schedule.subscription_sync_secs", cfg.schedule.subscription_sync_secs),
	] {
		if secs <= 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	for (label, key) in [
		("scraper", &cfg.providers.scraper.api_key),
		("llm_extractor", &cfg.providers.llm_extractor.api_key),
		("embedding", &cfg.providers.embedding.api_key),
		("billing", &cfg.providers.billing.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.pipeline.board_urls.retain(|url| !url.trim().is_empty());

	for url in &mut cfg.pipeline.board_urls {
		*url = url.trim().to_string();
	}
}
