use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use serde_json::Map;
use time::macros::date;
use uuid::Uuid;

use jobradar_config::{
	BillingProviderConfig, Config, EmbeddingProviderConfig, LlmProviderConfig, Matching, Pipeline,
	Postgres, Providers as ProviderSettings, Schedule, ScraperConfig, Service, Storage,
};
use jobradar_matching::{
	BillingProvider, BoxFuture, EmbeddingProvider, ExtractorProvider, Providers, ScrapeProvider,
};
use jobradar_providers::billing::SubscriptionStatus;
use jobradar_storage::{db::Db, queries};
use jobradar_testkit::TestDatabase;
use jobradar_worker::{
	WorkerState,
	pipeline::{self, ChainOutcome, RateLimiter, RetryPolicy, StageError},
	scheduler,
};

struct StubScraper {
	page: Option<String>,
}
impl ScrapeProvider for StubScraper {
	fn fetch_page_text<'a>(
		&'a self,
		_cfg: &'a ScraperConfig,
		_url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Option<String>>> {
		let page = self.page.clone();

		Box::pin(async move { Ok(page) })
	}

	fn fetch_links<'a>(
		&'a self,
		_cfg: &'a ScraperConfig,
		_url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<String>>> {
		Box::pin(async { Ok(Vec::new()) })
	}
}

struct StubExtractor {
	reply: String,
	calls: AtomicUsize,
}
impl StubExtractor {
	fn new(reply: &str) -> Arc<Self> {
		Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0) })
	}
}
impl ExtractorProvider for StubExtractor {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_system_prompt: &'a str,
		_user_content: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self.reply.clone();

		Box::pin(async move { Ok(reply) })
	}
}

struct StubEmbedding {
	vector: Vec<f32>,
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<Vec<f32>>>> {
		let vectors = vec![self.vector.clone(); texts.len()];

		Box::pin(async move { Ok(vectors) })
	}
}

/// A scrape service that never answers; stands in for a board page that
/// hangs mid-sweep.
struct HangingScraper;
impl ScrapeProvider for HangingScraper {
	fn fetch_page_text<'a>(
		&'a self,
		_cfg: &'a ScraperConfig,
		_url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Option<String>>> {
		Box::pin(std::future::pending())
	}

	fn fetch_links<'a>(
		&'a self,
		_cfg: &'a ScraperConfig,
		_url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<String>>> {
		Box::pin(std::future::pending())
	}
}

struct CountingBilling {
	calls: AtomicUsize,
}
impl BillingProvider for CountingBilling {
	fn subscription_status<'a>(
		&'a self,
		_cfg: &'a BillingProviderConfig,
		_subscription_id: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<SubscriptionStatus>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async {
			Ok(SubscriptionStatus {
				status: "active".to_string(),
				next_payment_amount: Some(19.99),
				next_payment_date: None,
			})
		})
	}
}

struct StubBilling;
impl BillingProvider for StubBilling {
	fn subscription_status<'a>(
		&'a self,
		_cfg: &'a BillingProviderConfig,
		_subscription_id: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<SubscriptionStatus>> {
		Box::pin(async {
			Ok(SubscriptionStatus {
				status: "active".to_string(),
				next_payment_amount: None,
				next_payment_date: None,
			})
		})
	}
}

fn test_config(dsn: &str, dimensions: u32) -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 2 },
		},
		providers: ProviderSettings {
			scraper: ScraperConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				render_js: true,
				wait_ms: 0,
				timeout_ms: 1_000,
			},
			llm_extractor: LlmProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "m".to_string(),
				temperature: 0.0,
				max_tokens: 512,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			embedding: EmbeddingProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "m".to_string(),
				dimensions,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			billing: BillingProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				timeout_ms: 1_000,
			},
		},
		matching: Matching::default(),
		pipeline: Pipeline::default(),
		schedule: Schedule::default(),
	}
}

fn stub_providers(
	page: Option<&str>,
	extractor: Arc<StubExtractor>,
	vector: Vec<f32>,
) -> Providers {
	Providers::new(
		Arc::new(StubScraper { page: page.map(str::to_string) }),
		extractor,
		Arc::new(StubEmbedding { vector }),
		Arc::new(StubBilling),
	)
}

fn lazy_state(providers: Providers, dimensions: u32) -> WorkerState {
	let cfg = test_config("postgres://localhost/jobradar_unreachable", dimensions);
	let db = Db::connect_lazy(&cfg.storage.postgres).expect("Failed to build lazy pool.");

	WorkerState::new(db, cfg, providers)
}

const FULL_EXTRACTION_REPLY: &str = "```json\n{\"Job Title\": \"Staff Engineer\", \"Company\": \"Acme\", \"Location\": \"Remote, US\", \"Remote\": \"Yes\", \"Date Posted\": \"2024-03-01\", \"Job Description\": \"Build things.\", \"Job Type\": \"Full-time\", \"Salary Range\": \"$150k-$180k\"}\n```";

#[tokio::test]
async fn unavailable_pages_are_skipped_without_touching_storage() {
	let extractor = StubExtractor::new(FULL_EXTRACTION_REPLY);
	let state = lazy_state(stub_providers(None, extractor.clone(), vec![0.5; 4]), 4);
	let outcome = pipeline::run_chain(&state, "https://boards.example.com/jobs/1")
		.await
		.expect("Chain failed.");

	assert_eq!(outcome, ChainOutcome::Skipped);
	assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_urls_fail_before_any_provider_call() {
	let extractor = StubExtractor::new(FULL_EXTRACTION_REPLY);
	let state = lazy_state(stub_providers(Some("page"), extractor, vec![0.5; 4]), 4);
	let outcome = pipeline::run_chain(&state, "/jobs/relative").await;

	assert!(matches!(outcome, Err(StageError::InvalidUrl(_))));
}

#[tokio::test]
async fn malformed_extraction_replies_are_terminal() {
	let extractor = StubExtractor::new("this is not json");
	let state = lazy_state(stub_providers(Some("page"), extractor.clone(), vec![0.5; 4]), 4);
	let outcome = pipeline::run_chain(&state, "https://boards.example.com/jobs/1").await;

	assert!(matches!(outcome, Err(StageError::Parse(_))));
	// Parse failures must not burn extra model calls.
	assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn embedding_dimension_mismatch_is_terminal() {
	let extractor = StubExtractor::new(FULL_EXTRACTION_REPLY);
	let state = lazy_state(stub_providers(Some("page"), extractor, vec![0.5; 3]), 4);
	let outcome = pipeline::run_chain(&state, "https://boards.example.com/jobs/1").await;

	assert!(matches!(outcome, Err(StageError::Parse(_))));
}

#[tokio::test]
async fn transient_failures_retry_up_to_the_limit() {
	let policy = RetryPolicy { max_attempts: 3, base_backoff_ms: 1, max_backoff_ms: 2 };
	let attempts = AtomicUsize::new(0);
	let result: Result<(), StageError> = pipeline::with_retry(&policy, "test", || {
		attempts.fetch_add(1, Ordering::SeqCst);

		async { Err(StageError::Transient("boom".to_string())) }
	})
	.await;

	assert!(matches!(result, Err(StageError::Transient(_))));
	assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn terminal_failures_never_retry() {
	let policy = RetryPolicy { max_attempts: 3, base_backoff_ms: 1, max_backoff_ms: 2 };
	let attempts = AtomicUsize::new(0);
	let result: Result<(), StageError> = pipeline::with_retry(&policy, "test", || {
		attempts.fetch_add(1, Ordering::SeqCst);

		async { Err(StageError::Parse("bad".to_string())) }
	})
	.await;

	assert!(matches!(result, Err(StageError::Parse(_))));
	assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn backoff_doubles_and_caps() {
	let policy = RetryPolicy { max_attempts: 5, base_backoff_ms: 500, max_backoff_ms: 1_500 };

	assert_eq!(policy.backoff_for_attempt(1).as_millis(), 500);
	assert_eq!(policy.backoff_for_attempt(2).as_millis(), 1_000);
	assert_eq!(policy.backoff_for_attempt(3).as_millis(), 1_500);
	assert_eq!(policy.backoff_for_attempt(10).as_millis(), 1_500);
}

#[tokio::test]
async fn rate_limiter_paces_dispatch() {
	let limiter = RateLimiter::new(10);
	let started = Instant::now();

	for _ in 0..3 {
		limiter.acquire().await;
	}

	// The first slot is free; the next two wait out the 100ms period.
	assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn chain_dispatch_is_paced_between_stages() {
	let extractor = StubExtractor::new(FULL_EXTRACTION_REPLY);
	let state = lazy_state(stub_providers(Some("page"), extractor, vec![0.5; 4]), 4);
	let started = Instant::now();
	let outcome = pipeline::run_chain(&state, "https://boards.example.com/jobs/1").await;

	// Storage is unreachable, so the chain dies at the persist stage.
	// By then the extract, embed, and persist dispatches have each taken
	// a limiter slot at 10/s.
	assert!(matches!(outcome, Err(StageError::Transient(_))));
	assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set JOBRADAR_PG_DSN to run."]
async fn full_chain_persists_and_scores_a_posting() {
	let Some(base_dsn) = jobradar_testkit::env_dsn() else {
		eprintln!("Skipping full_chain_persists_and_scores_a_posting; set JOBRADAR_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = test_config(test_db.dsn(), 4);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(4).await.expect("Failed to ensure schema.");

	sqlx::query(
		"\
INSERT INTO user_job_preferences (user_id, embedding)
VALUES ($1, $2::text::vector)",
	)
	.bind(Uuid::new_v4())
	.bind("[1,0,0,0]")
	.execute(&db.pool)
	.await
	.expect("Failed to insert preferences.");

	let extractor = StubExtractor::new(FULL_EXTRACTION_REPLY);
	let providers = stub_providers(Some("rendered posting text"), extractor, vec![0.5; 4]);
	let state = WorkerState::new(db, cfg, providers);
	let url = "https://boards.example.com/jobs/1";
	let outcome = pipeline::run_chain(&state, url).await.expect("Chain failed.");

	assert!(matches!(outcome, ChainOutcome::Ingested { fit_rows: 1, .. }));

	let posting = queries::job_posting_by_url(&state.db, url)
		.await
		.expect("Failed to fetch posting.")
		.expect("Posting must exist.");

	assert_eq!(posting.job_title, "Staff Engineer");
	assert_eq!(posting.remote, "Yes");
	assert_eq!(posting.date_posted, Some(date!(2024 - 03 - 01)));
	assert_eq!(posting.embedding.map(|vec| vec.len()), Some(4));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set JOBRADAR_PG_DSN to run."]
async fn reprocessing_fans_out_over_every_user() {
	let Some(base_dsn) = jobradar_testkit::env_dsn() else {
		eprintln!("Skipping reprocessing_fans_out_over_every_user; set JOBRADAR_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = test_config(test_db.dsn(), 4);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(4).await.expect("Failed to ensure schema.");

	for _ in 0..2 {
		let user_id = Uuid::new_v4();

		sqlx::query("INSERT INTO profiles (id, last_login) VALUES ($1, now())")
			.bind(user_id)
			.execute(&db.pool)
			.await
			.expect("Failed to insert profile.");
		sqlx::query("INSERT INTO user_job_preferences (user_id) VALUES ($1)")
			.bind(user_id)
			.execute(&db.pool)
			.await
			.expect("Failed to insert preferences.");
	}

	sqlx::query(
		"\
INSERT INTO job_postings (posting_url, embedding)
VALUES ('https://boards.example.com/jobs/1', '[1,0,0,0]'::vector)",
	)
	.execute(&db.pool)
	.await
	.expect("Failed to insert posting.");

	let extractor = StubExtractor::new("[\"rust\", \"postgres\"]");
	let providers = stub_providers(None, extractor, vec![1.0, 0.0, 0.0, 0.0]);
	let state = Arc::new(WorkerState::new(db, cfg, providers));

	scheduler::reprocess_all_users(&state).await.expect("Reprocessing sweep failed.");

	let keyword_rows: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM user_job_preferences WHERE keywords = ARRAY['rust', 'postgres']",
	)
	.fetch_one(&state.db.pool)
	.await
	.expect("Failed to count keyword rows.");
	let embedded_rows: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM user_job_preferences WHERE embedding IS NOT NULL",
	)
	.fetch_one(&state.db.pool)
	.await
	.expect("Failed to count embedded rows.");
	let fit_rows: i64 = sqlx::query_scalar("SELECT count(*) FROM user_job_fit")
		.fetch_one(&state.db.pool)
		.await
		.expect("Failed to count fit rows.");

	assert_eq!(keyword_rows, 2);
	assert_eq!(embedded_rows, 2);
	assert_eq!(fit_rows, 2);

	drop(state);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set JOBRADAR_PG_DSN to run."]
async fn a_stalled_scrape_sweep_does_not_delay_other_jobs() {
	let Some(base_dsn) = jobradar_testkit::env_dsn() else {
		eprintln!("Skipping a_stalled_scrape_sweep_does_not_delay_other_jobs; set JOBRADAR_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let mut cfg = test_config(test_db.dsn(), 4);

	cfg.pipeline.board_urls = vec!["https://boards.example.com/search".to_string()];

	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(4).await.expect("Failed to ensure schema.");

	sqlx::query("INSERT INTO profiles (id, subscription_id) VALUES ($1, 'sub_123')")
		.bind(Uuid::new_v4())
		.execute(&db.pool)
		.await
		.expect("Failed to insert profile.");

	let assert_db = Db::connect(&cfg.storage.postgres)
		.await
		.expect("Failed to open assertion connection.");
	let billing = Arc::new(CountingBilling { calls: AtomicUsize::new(0) });
	let providers = Providers::new(
		Arc::new(HangingScraper),
		StubExtractor::new("[]"),
		Arc::new(StubEmbedding { vector: Vec::new() }),
		billing.clone(),
	);
	let worker = tokio::spawn(scheduler::run_worker(WorkerState::new(db, cfg, providers)));

	// The scrape sweep never returns; the subscription sync must still
	// get its turn.
	let mut synced = false;

	for _ in 0..50 {
		let is_subscribed: Option<bool> = sqlx::query_scalar(
			"SELECT is_subscribed FROM profiles WHERE subscription_id = 'sub_123'",
		)
		.fetch_optional(&assert_db.pool)
		.await
		.expect("Failed to read profile.");

		if is_subscribed == Some(true) {
			synced = true;

			break;
		}

		tokio::time::sleep(Duration::from_millis(100)).await;
	}

	worker.abort();

	assert!(synced, "Subscription sync never ran.");
	assert!(billing.calls.load(Ordering::SeqCst) >= 1);

	drop(assert_db);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
