use std::collections::HashMap;

use jobradar_storage::{db::Db, models::DedupCandidate, queries};

use crate::Result;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DedupReport {
	pub postings_deleted: u64,
	pub fit_rows_deleted: u64,
}

/// Groups candidates by key and returns the ids that lose. The newest
/// posting per key survives; among equal timestamps the highest id wins.
pub fn stale_duplicate_ids(candidates: &[DedupCandidate]) -> Vec<i64> {
	let mut keepers: HashMap<&str, &DedupCandidate> = HashMap::new();
	let mut stale = Vec::new();

	for candidate in candidates {
		match keepers.get(candidate.key.as_str()) {
			None => {
				keepers.insert(candidate.key.as_str(), candidate);
			},
			Some(current) => {
				let replaces = (candidate.created_at, candidate.id)
					> (current.created_at, current.id);

				if replaces {
					stale.push(current.id);
					keepers.insert(candidate.key.as_str(), candidate);
				} else {
					stale.push(candidate.id);
				}
			},
		}
	}

	stale.sort_unstable();

	stale
}

/// Removes postings whose stored embedding text is byte-identical to a
/// newer posting's.
pub async fn remove_duplicate_embeddings(db: &Db) -> Result<DedupReport> {
	let candidates = queries::dedup_candidates_by_embedding(db).await?;

	delete_stale(db, &candidates, "embedding").await
}

/// Removes postings sharing the (title, company, location) identity with
/// a newer posting.
pub async fn remove_duplicate_postings(db: &Db) -> Result<DedupReport> {
	let candidates = queries::dedup_candidates_by_identity(db).await?;

	delete_stale(db, &candidates, "identity").await
}

async fn delete_stale(
	db: &Db,
	candidates: &[DedupCandidate],
	kind: &str,
) -> Result<DedupReport> {
	let stale = stale_duplicate_ids(candidates);

	if stale.is_empty() {
		return Ok(DedupReport::default());
	}

	// Fit rows reference postings, so they go first.
	let fit_rows_deleted = queries::delete_fit_rows_for_jobs(db, &stale).await?;
	let postings_deleted = queries::delete_job_postings(db, &stale).await?;

	tracing::info!(kind, postings_deleted, fit_rows_deleted, "Removed duplicate postings.");

	Ok(DedupReport { postings_deleted, fit_rows_deleted })
}
