use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Fetches the rendered text content of a page through the scraping API.
///
/// Returns `Ok(None)` when the service reports a non-success status for
/// the target page; the caller treats that as a skippable page rather
/// than a pipeline failure.
pub async fn fetch_page_text(
	cfg: &jobradar_config::ScraperConfig,
	url: &str,
) -> Result<Option<String>> {
	let extract_rules = serde_json::json!({ "text": "body" });
	let res = scrape_request(cfg, url, &extract_rules).await?;

	if !res.status().is_success() {
		tracing::warn!(url, status = %res.status(), "Scrape returned non-success status, skipping page.");

		return Ok(None);
	}

	let json: Value = res.json().await?;
	let text = json.get("text").and_then(Value::as_str).ok_or_else(|| Error::InvalidResponse {
		message: "Scrape response is missing the text field.".to_string(),
	})?;

	Ok(Some(text.to_string()))
}

/// Collects every anchor href from a board page. A non-success status
/// yields an empty list so one dead board does not abort the sweep.
pub async fn fetch_links(cfg: &jobradar_config::ScraperConfig, url: &str) -> Result<Vec<String>> {
	let extract_rules = serde_json::json!({
		"all_links": { "selector": "a", "output": "@href", "type": "list" },
	});
	let res = scrape_request(cfg, url, &extract_rules).await?;

	if !res.status().is_success() {
		tracing::warn!(url, status = %res.status(), "Scrape returned non-success status, skipping board.");

		return Ok(Vec::new());
	}

	let json: Value = res.json().await?;
	let links = json
		.get("all_links")
		.and_then(Value::as_array)
		.map(|items| {
			items
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_string)
				.collect::<Vec<_>>()
		})
		.unwrap_or_default();

	Ok(links)
}

async fn scrape_request(
	cfg: &jobradar_config::ScraperConfig,
	url: &str,
	extract_rules: &Value,
) -> Result<reqwest::Response> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let wait = cfg.wait_ms.to_string();
	let rules = extract_rules.to_string();
	let res = client
		.get(&cfg.api_base)
		.query(&[
			("api_key", cfg.api_key.as_str()),
			("url", url),
			("render_js", if cfg.render_js { "true" } else { "false" }),
			("wait", wait.as_str()),
			("extract_rules", rules.as_str()),
		])
		.send()
		.await?;

	Ok(res)
}
