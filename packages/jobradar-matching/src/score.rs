use jobradar_storage::{
	db::Db,
	models::{FitRowInsert, UserJobPreferences},
	queries,
};

use crate::{Result, percentile};

/// Outcome of recomputing one user's fit scores.
#[derive(Debug)]
pub struct ScoreReport {
	pub inserted: u64,
	pub failed_batches: u32,
	pub scores: Vec<f32>,
}

impl ScoreReport {
	/// Where a score sits among this run's scores, as a whole percentage.
	pub fn percentile_of(&self, score: f32) -> Option<u32> {
		percentile::percentile(&self.scores, score)
	}
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Recomputes every fit score for one set of preferences.
///
/// Once at least one posting scores, the old rows are deleted and fresh
/// scores land in insert batches. A failed batch is logged and skipped so
/// the rest of the run survives. Returns `Ok(None)` when nothing could be
/// scored: no stored embedding, a zero-norm embedding, or no scorable
/// postings. In that case existing fit rows are left untouched.
pub async fn score_all_jobs(
	db: &Db,
	cfg: &jobradar_config::Matching,
	preferences_id: i64,
) -> Result<Option<ScoreReport>> {
	let Some(prefs) = queries::preferences_by_id(db, preferences_id).await? else {
		tracing::warn!(preferences_id, "Preferences row disappeared before scoring.");

		return Ok(None);
	};
	let Some(user_vec) = usable_embedding(&prefs) else {
		return Ok(None);
	};

	let mut rows: Vec<FitRowInsert> = Vec::new();
	let mut skipped = 0_usize;
	let mut after_id = 0_i64;

	loop {
		let page =
			queries::fetch_job_embeddings_page(db, after_id, cfg.fetch_page_size as i64).await?;

		if page.is_empty() {
			break;
		}

		after_id = page.last().map(|row| row.id).unwrap_or(after_id);

		for job in &page {
			let Some(score) = job
				.embedding
				.as_deref()
				.and_then(|embedding| cosine_similarity(user_vec, embedding))
			else {
				skipped += 1;

				continue;
			};

			rows.push(FitRowInsert { preferences_id, job_id: job.id, fit_score: score });
		}
	}

	if skipped > 0 {
		tracing::warn!(preferences_id, skipped, "Skipped postings with unusable embeddings.");
	}
	if rows.is_empty() {
		tracing::warn!(preferences_id, "No scorable postings, keeping existing fit rows.");

		return Ok(None);
	}

	queries::delete_fit_rows_for_preference(db, preferences_id).await?;

	let mut inserted = 0_u64;
	let mut failed_batches = 0_u32;

	for batch in rows.chunks(cfg.insert_batch_size as usize) {
		match queries::insert_fit_rows(db, batch).await {
			Ok(count) => inserted += count,
			Err(err) => {
				failed_batches += 1;

				tracing::error!(preferences_id, error = %err, "Fit score batch insert failed.");
			},
		}
	}

	tracing::info!(preferences_id, inserted, failed_batches, "Recomputed fit scores.");

	if inserted == 0 {
		return Ok(None);
	}

	let scores = rows.iter().map(|row| row.fit_score).collect();

	Ok(Some(ScoreReport { inserted, failed_batches, scores }))
}

/// Scores one freshly ingested posting against every stored preference
/// set. Returns the number of fit rows written.
pub async fn score_posting_for_all_users(
	db: &Db,
	cfg: &jobradar_config::Matching,
	job_id: i64,
	job_embedding: &[f32],
) -> Result<usize> {
	let prefs = queries::list_user_preferences(db).await?;
	let mut rows: Vec<FitRowInsert> = Vec::new();

	for pref in &prefs {
		let Some(user_vec) = usable_embedding(pref) else {
			continue;
		};
		let Some(score) = cosine_similarity(user_vec, job_embedding) else {
			continue;
		};

		rows.push(FitRowInsert { preferences_id: pref.id, job_id, fit_score: score });
	}

	// The posting may have been re-ingested; clear any rows from a
	// previous pass before inserting.
	queries::delete_fit_rows_for_jobs(db, &[job_id]).await?;

	let mut inserted = 0_u64;

	for batch in rows.chunks(cfg.insert_batch_size as usize) {
		inserted += queries::insert_fit_rows(db, batch).await?;
	}

	Ok(inserted as usize)
}

fn usable_embedding(prefs: &UserJobPreferences) -> Option<&[f32]> {
	let Some(embedding) = prefs.embedding.as_deref() else {
		tracing::warn!(preferences_id = prefs.id, "Preferences have no stored embedding.");

		return None;
	};

	if embedding.iter().map(|v| v * v).sum::<f32>() <= f32::EPSILON {
		tracing::warn!(preferences_id = prefs.id, "Preferences embedding has zero norm.");

		return None;
	}

	Some(embedding)
}
