use std::{
	collections::HashSet,
	future::Future,
	sync::Arc,
	time::Duration,
};

use tokio::{
	task::JoinSet,
	time::{self, MissedTickBehavior},
};

use jobradar_domain::{JobFields, is_valid_posting_url, strip_code_fences};
use jobradar_storage::{models::NewJobPosting, queries};

use crate::WorkerState;

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You are a job posting parser. The user will give you the rendered text of a \
job posting page. Respond with a single JSON object using exactly these \
keys: \"Job Title\", \"Company\", \"Location\", \"Remote\", \"Date Posted\", \
\"Job Description\", \"Job Type\", \"Salary Range\". \"Remote\" must be one \
of Yes, No, Hybrid, or Unknown. \"Date Posted\" must be YYYY-MM-DD or \
Unknown. Use the literal string \"Unknown\" for anything you cannot \
determine. Respond with the JSON object and nothing else.";

const URL_FILTER_SYSTEM_PROMPT: &str = "\
You are given a list of URLs collected from job board pages, one per line. \
Reply with a JSON array containing only the URLs that point directly at an \
individual job posting. Drop navigation, search, login, and company pages. \
Respond with the JSON array and nothing else.";

/// A pipeline stage fails either terminally or transiently; only the
/// latter is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
	#[error("Invalid posting URL: {0}")]
	InvalidUrl(String),
	#[error("{0}")]
	Parse(String),
	#[error("{0}")]
	Transient(String),
}

impl StageError {
	pub fn retryable(&self) -> bool {
		matches!(self, Self::Transient(_))
	}
}

impl From<jobradar_providers::Error> for StageError {
	fn from(err: jobradar_providers::Error) -> Self {
		if err.is_transient() {
			Self::Transient(err.to_string())
		} else {
			Self::Parse(err.to_string())
		}
	}
}

impl From<jobradar_storage::Error> for StageError {
	fn from(err: jobradar_storage::Error) -> Self {
		Self::Transient(err.to_string())
	}
}

impl From<jobradar_matching::Error> for StageError {
	fn from(err: jobradar_matching::Error) -> Self {
		match err {
			jobradar_matching::Error::Storage(err) => err.into(),
			jobradar_matching::Error::Provider(err) => err.into(),
		}
	}
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}

impl RetryPolicy {
	pub fn from_pipeline(cfg: &jobradar_config::Pipeline) -> Self {
		Self {
			max_attempts: cfg.retry_max_attempts,
			base_backoff_ms: cfg.retry_base_backoff_ms,
			max_backoff_ms: cfg.retry_max_backoff_ms,
		}
	}

	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(6);
		let base = self.base_backoff_ms.saturating_mul(1 << exp);

		Duration::from_millis(base.min(self.max_backoff_ms))
	}
}

pub async fn with_retry<T, F, Fut>(
	policy: &RetryPolicy,
	label: &str,
	mut op: F,
) -> Result<T, StageError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, StageError>>,
{
	let mut attempt = 0_u32;

	loop {
		attempt += 1;

		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if err.retryable() && attempt < policy.max_attempts => {
				let backoff = policy.backoff_for_attempt(attempt);

				tracing::warn!(label, attempt, error = %err, "Stage failed, retrying.");

				time::sleep(backoff).await;
			},
			Err(err) => return Err(err),
		}
	}
}

/// Interval-backed limiter pacing every non-scrape stage dispatch.
/// Scraping has its own cap, the semaphore.
pub struct RateLimiter {
	interval: tokio::sync::Mutex<time::Interval>,
}

impl RateLimiter {
	pub fn new(per_sec: u32) -> Self {
		let period = Duration::from_secs(1) / per_sec.max(1);
		let mut interval = time::interval(period);

		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		Self { interval: tokio::sync::Mutex::new(interval) }
	}

	pub async fn acquire(&self) {
		self.interval.lock().await.tick().await;
	}
}

#[derive(Debug, PartialEq)]
pub enum ChainOutcome {
	Ingested { job_id: i64, fit_rows: usize },
	Skipped,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
	pub ingested: usize,
	pub skipped: usize,
	pub failed: usize,
}

/// Runs the full ingest chain for one posting URL: scrape, extract,
/// embed, persist, score. The scrape stage is capped by the semaphore
/// and every later stage goes through the shared rate limiter, so
/// callers can fan out freely.
pub async fn run_chain(state: &WorkerState, url: &str) -> Result<ChainOutcome, StageError> {
	if !is_valid_posting_url(url) {
		return Err(StageError::InvalidUrl(url.to_string()));
	}

	let providers = &state.providers;
	let page = {
		let _permit = state
			.scrape_permits
			.acquire()
			.await
			.map_err(|_| StageError::Transient("Scrape semaphore closed.".to_string()))?;

		let scraper_cfg = &state.cfg.providers.scraper;

		with_retry(&state.retry, "scrape", || async move {
			providers.scraper.fetch_page_text(scraper_cfg, url).await.map_err(Into::into)
		})
		.await?
	};
	let Some(text) = page else {
		tracing::info!(url, "Page unavailable, skipping posting.");

		return Ok(ChainOutcome::Skipped);
	};

	state.limiter.acquire().await;

	let llm_cfg = &state.cfg.providers.llm_extractor;
	let page_text = text.as_str();
	let reply = with_retry(&state.retry, "extract", || async move {
		providers
			.extractor
			.complete(llm_cfg, EXTRACTION_SYSTEM_PROMPT, page_text)
			.await
			.map_err(Into::into)
	})
	.await?;
	let stripped = strip_code_fences(&reply);
	let value: serde_json::Value = serde_json::from_str(stripped)
		.map_err(|err| StageError::Parse(format!("Extraction reply is not JSON: {err}.")))?;
	let fields = JobFields::from_llm_value(&value)
		.ok_or_else(|| StageError::Parse("Extraction reply is not a JSON object.".to_string()))?;

	state.limiter.acquire().await;

	let embedding_text = fields.embedding_text();
	let embedding_cfg = &state.cfg.providers.embedding;
	let texts = std::slice::from_ref(&embedding_text);
	let vectors = with_retry(&state.retry, "embed", || async move {
		providers.embedding.embed(embedding_cfg, texts).await.map_err(Into::into)
	})
	.await?;
	let Some(embedding) = vectors.into_iter().next() else {
		return Err(StageError::Parse("Embedding response contained no vectors.".to_string()));
	};
	let expected_dim = state.cfg.providers.embedding.dimensions as usize;

	if embedding.len() != expected_dim {
		return Err(StageError::Parse(format!(
			"Embedding has {} dimensions, expected {expected_dim}.",
			embedding.len(),
		)));
	}

	state.limiter.acquire().await;

	let posting = NewJobPosting {
		posting_url: url.to_string(),
		job_title: fields.job_title,
		company: fields.company,
		location: fields.location,
		remote: fields.remote.as_str().to_string(),
		date_posted: fields.date_posted,
		job_description: fields.job_description,
		job_type: fields.job_type,
		salary_range: fields.salary_range,
		embedding,
	};
	let job_id = queries::upsert_job_posting(&state.db, &posting).await?;
	let fit_rows = jobradar_matching::score::score_posting_for_all_users(
		&state.db,
		&state.cfg.matching,
		job_id,
		&posting.embedding,
	)
	.await?;

	tracing::info!(url, job_id, fit_rows, "Ingested posting.");

	Ok(ChainOutcome::Ingested { job_id, fit_rows })
}

/// Fans the ingest chain out over a batch of URLs. Individual failures
/// are logged and counted, never propagated.
pub async fn process_posting_urls(state: &Arc<WorkerState>, urls: Vec<String>) -> BatchSummary {
	let mut tasks = JoinSet::new();

	for url in urls {
		let state = state.clone();

		tasks.spawn(async move {
			let outcome = run_chain(&state, &url).await;

			(url, outcome)
		});
	}

	let mut summary = BatchSummary::default();

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((_, Ok(ChainOutcome::Ingested { .. }))) => summary.ingested += 1,
			Ok((_, Ok(ChainOutcome::Skipped))) => summary.skipped += 1,
			Ok((url, Err(err))) => {
				summary.failed += 1;

				tracing::error!(url, error = %err, "Posting chain failed.");
			},
			Err(err) => {
				summary.failed += 1;

				tracing::error!(error = %err, "Posting chain panicked.");
			},
		}
	}

	summary
}

/// Gathers candidate posting URLs from every configured board page,
/// filters them through the LLM, and drops URLs already stored.
pub async fn collect_posting_urls(state: &Arc<WorkerState>) -> Result<Vec<String>, StageError> {
	let mut tasks = JoinSet::new();

	for board_url in state.cfg.pipeline.board_urls.clone() {
		let state = state.clone();

		tasks.spawn(async move {
			let _permit = state
				.scrape_permits
				.acquire()
				.await
				.map_err(|_| StageError::Transient("Scrape semaphore closed.".to_string()))?;

			let providers = &state.providers;
			let scraper_cfg = &state.cfg.providers.scraper;
			let board = board_url.as_str();
			let links = with_retry(&state.retry, "board", || async move {
				providers.scraper.fetch_links(scraper_cfg, board).await.map_err(Into::into)
			})
			.await?;

			Ok::<_, StageError>(links)
		});
	}

	let mut candidates = Vec::new();
	let mut seen = HashSet::new();

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok(Ok(links)) =>
				for link in links {
					if seen.insert(link.clone()) {
						candidates.push(link);
					}
				},
			Ok(Err(err)) => tracing::error!(error = %err, "Board scrape failed."),
			Err(err) => tracing::error!(error = %err, "Board scrape panicked."),
		}
	}

	if candidates.is_empty() {
		return Ok(Vec::new());
	}

	state.limiter.acquire().await;

	let providers = &state.providers;
	let llm_cfg = &state.cfg.providers.llm_extractor;
	let content = candidates.join("\n");
	let content_ref = content.as_str();
	let reply = with_retry(&state.retry, "url_filter", || async move {
		providers
			.extractor
			.complete(llm_cfg, URL_FILTER_SYSTEM_PROMPT, content_ref)
			.await
			.map_err(Into::into)
	})
	.await?;
	let stripped = strip_code_fences(&reply);
	let value: serde_json::Value = serde_json::from_str(stripped)
		.map_err(|err| StageError::Parse(format!("URL filter reply is not JSON: {err}.")))?;
	let filtered: Vec<String> = value
		.as_array()
		.map(|items| {
			items
				.iter()
				.filter_map(serde_json::Value::as_str)
				.filter(|url| is_valid_posting_url(url))
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default();

	if filtered.is_empty() {
		return Ok(Vec::new());
	}

	let known: HashSet<String> =
		queries::known_posting_urls(&state.db, &filtered).await?.into_iter().collect();
	let fresh = filtered.into_iter().filter(|url| !known.contains(url)).collect();

	Ok(fresh)
}

pub async fn scrape_sweep(state: &Arc<WorkerState>) -> Result<BatchSummary, StageError> {
	let urls = collect_posting_urls(state).await?;

	if urls.is_empty() {
		tracing::info!("No new posting URLs discovered.");

		return Ok(BatchSummary::default());
	}

	tracing::info!(count = urls.len(), "Discovered new posting URLs.");

	Ok(process_posting_urls(state, urls).await)
}
