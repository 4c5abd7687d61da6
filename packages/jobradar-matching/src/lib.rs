pub mod dedup;
pub mod percentile;
pub mod prefs;
pub mod score;

use std::{future::Future, pin::Pin, sync::Arc};

use jobradar_config::{
	BillingProviderConfig, EmbeddingProviderConfig, LlmProviderConfig, ScraperConfig,
};
use jobradar_providers::{billing, billing::SubscriptionStatus, embedding, extractor, scraper};

pub use dedup::DedupReport;
pub use score::ScoreReport;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] jobradar_storage::Error),
	#[error(transparent)]
	Provider(#[from] jobradar_providers::Error),
}

pub trait ScrapeProvider
where
	Self: Send + Sync,
{
	fn fetch_page_text<'a>(
		&'a self,
		cfg: &'a ScraperConfig,
		url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Option<String>>>;

	fn fetch_links<'a>(
		&'a self,
		cfg: &'a ScraperConfig,
		url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<String>>>;
}

pub trait ExtractorProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_content: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<String>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<Vec<f32>>>>;
}

pub trait BillingProvider
where
	Self: Send + Sync,
{
	fn subscription_status<'a>(
		&'a self,
		cfg: &'a BillingProviderConfig,
		subscription_id: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<SubscriptionStatus>>;
}

#[derive(Clone)]
pub struct Providers {
	pub scraper: Arc<dyn ScrapeProvider>,
	pub extractor: Arc<dyn ExtractorProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub billing: Arc<dyn BillingProvider>,
}

struct DefaultProviders;

impl ScrapeProvider for DefaultProviders {
	fn fetch_page_text<'a>(
		&'a self,
		cfg: &'a ScraperConfig,
		url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Option<String>>> {
		Box::pin(scraper::fetch_page_text(cfg, url))
	}

	fn fetch_links<'a>(
		&'a self,
		cfg: &'a ScraperConfig,
		url: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<String>>> {
		Box::pin(scraper::fetch_links(cfg, url))
	}
}

impl ExtractorProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_content: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<String>> {
		Box::pin(extractor::complete(cfg, system_prompt, user_content))
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, jobradar_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl BillingProvider for DefaultProviders {
	fn subscription_status<'a>(
		&'a self,
		cfg: &'a BillingProviderConfig,
		subscription_id: &'a str,
	) -> BoxFuture<'a, jobradar_providers::Result<SubscriptionStatus>> {
		Box::pin(billing::subscription_status(cfg, subscription_id))
	}
}

impl Providers {
	pub fn new(
		scraper: Arc<dyn ScrapeProvider>,
		extractor: Arc<dyn ExtractorProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		billing: Arc<dyn BillingProvider>,
	) -> Self {
		Self { scraper, extractor, embedding, billing }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self {
			scraper: provider.clone(),
			extractor: provider.clone(),
			embedding: provider.clone(),
			billing: provider,
		}
	}
}
