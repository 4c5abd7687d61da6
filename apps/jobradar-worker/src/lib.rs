pub mod pipeline;
pub mod scheduler;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use jobradar_matching::Providers;
use jobradar_storage::db::Db;

use pipeline::{RateLimiter, RetryPolicy};

#[derive(Debug, Parser)]
#[command(
	version = jobradar_cli::VERSION,
	rename_all = "kebab",
	styles = jobradar_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub struct WorkerState {
	pub db: Db,
	pub cfg: jobradar_config::Config,
	pub providers: Providers,
	pub scrape_permits: Arc<Semaphore>,
	pub limiter: RateLimiter,
	pub retry: RetryPolicy,
}

impl WorkerState {
	pub fn new(db: Db, cfg: jobradar_config::Config, providers: Providers) -> Self {
		let scrape_permits = Arc::new(Semaphore::new(cfg.pipeline.scrape_concurrency as usize));
		let limiter = RateLimiter::new(cfg.pipeline.rate_limit_per_sec);
		let retry = RetryPolicy::from_pipeline(&cfg.pipeline);

		Self { db, cfg, providers, scrape_permits, limiter, retry }
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = jobradar_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let state = WorkerState::new(db, config, Providers::default());

	scheduler::run_worker(state).await
}
