use std::sync::Arc;

use time::OffsetDateTime;
use tokio::{task::JoinSet, time as tokio_time};

use jobradar_matching::{dedup, prefs};
use jobradar_storage::queries;

use crate::{WorkerState, pipeline};

const POLL_INTERVAL_MS: u64 = 1_000;

/// Drives every periodic job. Each due job is spawned onto its own task
/// so a long sweep never delays the other schedules; job failures are
/// logged and the loop keeps going.
pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	let state = Arc::new(state);
	let mut last_scrape: Option<OffsetDateTime> = None;
	let mut last_dedup: Option<OffsetDateTime> = None;
	let mut last_rescore: Option<OffsetDateTime> = None;
	let mut last_subscription_sync: Option<OffsetDateTime> = None;

	loop {
		let now = OffsetDateTime::now_utc();

		if due(last_scrape, state.cfg.schedule.scrape_sweep_secs, now) {
			let state = state.clone();

			tokio::spawn(async move {
				match pipeline::scrape_sweep(&state).await {
					Ok(summary) => tracing::info!(
						ingested = summary.ingested,
						skipped = summary.skipped,
						failed = summary.failed,
						"Scrape sweep finished.",
					),
					Err(err) => tracing::error!(error = %err, "Scrape sweep failed."),
				}
			});

			last_scrape = Some(now);
		}
		if due(last_dedup, state.cfg.schedule.dedup_sweep_secs, now) {
			let state = state.clone();

			tokio::spawn(async move {
				if let Err(err) = dedup::remove_duplicate_embeddings(&state.db).await {
					tracing::error!(error = %err, "Embedding dedup sweep failed.");
				}
				if let Err(err) = dedup::remove_duplicate_postings(&state.db).await {
					tracing::error!(error = %err, "Identity dedup sweep failed.");
				}
			});

			last_dedup = Some(now);
		}
		if due(last_rescore, state.cfg.schedule.rescore_secs, now) {
			let state = state.clone();

			tokio::spawn(async move {
				if let Err(err) = reprocess_all_users(&state).await {
					tracing::error!(error = %err, "User reprocessing sweep failed.");
				}
			});

			last_rescore = Some(now);
		}
		if due(last_subscription_sync, state.cfg.schedule.subscription_sync_secs, now) {
			let state = state.clone();

			tokio::spawn(async move {
				if let Err(err) = sync_subscriptions(&state).await {
					tracing::error!(error = %err, "Subscription sync failed.");
				}
			});

			last_subscription_sync = Some(now);
		}

		tokio_time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
	}
}

fn due(last: Option<OffsetDateTime>, interval_secs: i64, now: OffsetDateTime) -> bool {
	match last {
		None => true,
		Some(last) => now - last >= time::Duration::seconds(interval_secs),
	}
}

/// Regenerates keywords, embeddings, and fit scores for every user with
/// stored preferences, one task per user. Individual failures are logged
/// and never sink the sweep.
pub async fn reprocess_all_users(state: &Arc<WorkerState>) -> Result<(), jobradar_matching::Error> {
	let user_ids = queries::preference_user_ids(&state.db).await?;
	let mut tasks = JoinSet::new();

	for user_id in user_ids {
		let state = state.clone();

		tasks.spawn(async move {
			let result =
				prefs::reprocess_user(&state.db, &state.cfg, &state.providers, user_id).await;

			(user_id, result)
		});
	}

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((_, Ok(_))) => {},
			Ok((user_id, Err(err))) => {
				tracing::error!(%user_id, error = %err, "User reprocessing failed.");
			},
			Err(err) => tracing::error!(error = %err, "User reprocessing panicked."),
		}
	}

	Ok(())
}

/// Refreshes subscription state from the billing provider for every
/// profile holding a subscription id.
async fn sync_subscriptions(state: &Arc<WorkerState>) -> Result<(), jobradar_matching::Error> {
	let profiles = queries::profiles_with_subscriptions(&state.db).await?;

	for profile in profiles {
		let Some(subscription_id) = profile.subscription_id else {
			continue;
		};
		let status = match state
			.providers
			.billing
			.subscription_status(&state.cfg.providers.billing, &subscription_id)
			.await
		{
			Ok(status) => status,
			Err(err) => {
				tracing::warn!(profile_id = %profile.id, error = %err, "Billing lookup failed.");

				continue;
			},
		};
		let is_subscribed = matches!(status.status.as_str(), "active" | "trialing");

		if let Err(err) = queries::update_profile_subscription(
			&state.db,
			profile.id,
			&status.status,
			is_subscribed,
			status.next_payment_amount,
			status.next_payment_date,
		)
		.await
		{
			tracing::error!(profile_id = %profile.id, error = %err, "Profile update failed.");
		}
	}

	Ok(())
}
