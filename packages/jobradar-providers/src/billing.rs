use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionStatus {
	pub status: String,
	pub next_payment_amount: Option<f64>,
	pub next_payment_date: Option<OffsetDateTime>,
}

/// Looks up the current state of one subscription plus its upcoming
/// invoice. A missing upcoming invoice (cancelled or final period) is
/// normal and leaves the payment fields empty.
pub async fn subscription_status(
	cfg: &jobradar_config::BillingProviderConfig,
	subscription_id: &str,
) -> Result<SubscriptionStatus> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let subscription: Value = client
		.get(format!("{}/subscriptions/{subscription_id}", cfg.api_base))
		.bearer_auth(&cfg.api_key)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;
	let status = parse_subscription_status(&subscription)?;

	let invoice_res = client
		.get(format!("{}/invoices/upcoming", cfg.api_base))
		.bearer_auth(&cfg.api_key)
		.query(&[("subscription", subscription_id)])
		.send()
		.await?;
	let (next_payment_amount, next_payment_date) = if invoice_res.status().is_success() {
		parse_upcoming_invoice(&invoice_res.json().await?)
	} else {
		(None, None)
	};

	Ok(SubscriptionStatus { status, next_payment_amount, next_payment_date })
}

fn parse_subscription_status(json: &Value) -> Result<String> {
	json.get("status").and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
		Error::InvalidResponse {
			message: "Subscription response is missing the status field.".to_string(),
		}
	})
}

/// Amounts come back in cents; payment timestamps are unix seconds.
fn parse_upcoming_invoice(json: &Value) -> (Option<f64>, Option<OffsetDateTime>) {
	let amount = json.get("amount_due").and_then(Value::as_i64).map(|cents| cents as f64 / 100.0);
	let date = json
		.get("next_payment_attempt")
		.and_then(Value::as_i64)
		.and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());

	(amount, date)
}
