use sqlx::{QueryBuilder, Row, postgres::PgRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{
		DedupCandidate, FitRowInsert, JobPosting, JobVectorRow, NewJobPosting, Profile,
		UserJobPreferences,
	},
	vector,
};

/// Inserts a posting or refreshes the stored fields when the URL was seen
/// before. Returns the row id either way.
pub async fn upsert_job_posting(db: &Db, posting: &NewJobPosting) -> Result<i64> {
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO job_postings (
	posting_url,
	job_title,
	company,
	location,
	remote,
	date_posted,
	job_description,
	job_type,
	salary_range,
	embedding
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::text::vector)
ON CONFLICT (posting_url) DO UPDATE
SET
	job_title = EXCLUDED.job_title,
	company = EXCLUDED.company,
	location = EXCLUDED.location,
	remote = EXCLUDED.remote,
	date_posted = EXCLUDED.date_posted,
	job_description = EXCLUDED.job_description,
	job_type = EXCLUDED.job_type,
	salary_range = EXCLUDED.salary_range,
	embedding = EXCLUDED.embedding
RETURNING id",
	)
	.bind(posting.posting_url.as_str())
	.bind(posting.job_title.as_str())
	.bind(posting.company.as_str())
	.bind(posting.location.as_str())
	.bind(posting.remote.as_str())
	.bind(posting.date_posted)
	.bind(posting.job_description.as_str())
	.bind(posting.job_type.as_str())
	.bind(posting.salary_range.as_str())
	.bind(vector::encode(&posting.embedding))
	.fetch_one(&db.pool)
	.await?;

	Ok(id)
}

pub async fn job_posting_by_url(db: &Db, posting_url: &str) -> Result<Option<JobPosting>> {
	let row = sqlx::query(
		"\
SELECT
	id,
	posting_url,
	job_title,
	company,
	location,
	remote,
	date_posted,
	job_description,
	job_type,
	salary_range,
	embedding::text AS embedding,
	created_at
FROM job_postings
WHERE posting_url = $1",
	)
	.bind(posting_url)
	.fetch_optional(&db.pool)
	.await?;

	row.map(map_job_posting).transpose()
}

/// Filters the given URLs down to the ones already stored.
pub async fn known_posting_urls(db: &Db, urls: &[String]) -> Result<Vec<String>> {
	let known: Vec<String> =
		sqlx::query_scalar("SELECT posting_url FROM job_postings WHERE posting_url = ANY($1)")
			.bind(urls)
			.fetch_all(&db.pool)
			.await?;

	Ok(known)
}

/// Keyset page of posting embeddings, ordered by id. Malformed or absent
/// vectors come back as `None` so the caller can count and skip them.
pub async fn fetch_job_embeddings_page(
	db: &Db,
	after_id: i64,
	limit: i64,
) -> Result<Vec<JobVectorRow>> {
	let rows = sqlx::query(
		"\
SELECT id, embedding::text AS embedding
FROM job_postings
WHERE id > $1
ORDER BY id
LIMIT $2",
	)
	.bind(after_id)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	rows.into_iter()
		.map(|row| {
			let id: i64 = row.try_get("id")?;
			let raw: Option<String> = row.try_get("embedding")?;
			let embedding = raw.and_then(|text| vector::decode(&text).ok());

			Ok(JobVectorRow { id, embedding })
		})
		.collect()
}

pub async fn list_user_preferences(db: &Db) -> Result<Vec<UserJobPreferences>> {
	let rows = sqlx::query(&preferences_select("ORDER BY id")).fetch_all(&db.pool).await?;

	rows.into_iter().map(map_preferences).collect()
}

pub async fn preferences_by_user_id(
	db: &Db,
	user_id: Uuid,
) -> Result<Option<UserJobPreferences>> {
	let row = sqlx::query(&preferences_select("WHERE user_id = $1"))
		.bind(user_id)
		.fetch_optional(&db.pool)
		.await?;

	row.map(map_preferences).transpose()
}

pub async fn preferences_by_id(db: &Db, id: i64) -> Result<Option<UserJobPreferences>> {
	let row = sqlx::query(&preferences_select("WHERE id = $1"))
		.bind(id)
		.fetch_optional(&db.pool)
		.await?;

	row.map(map_preferences).transpose()
}

pub async fn update_preference_keywords(db: &Db, id: i64, keywords: &[String]) -> Result<()> {
	sqlx::query("UPDATE user_job_preferences SET keywords = $2, updated_at = now() WHERE id = $1")
		.bind(id)
		.bind(keywords)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn update_preference_embedding(db: &Db, id: i64, embedding: &[f32]) -> Result<()> {
	sqlx::query(
		"\
UPDATE user_job_preferences
SET embedding = $2::text::vector, updated_at = now()
WHERE id = $1",
	)
	.bind(id)
	.bind(vector::encode(embedding))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn delete_fit_rows_for_preference(db: &Db, preferences_id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM user_job_fit WHERE user_job_preferences_id = $1")
		.bind(preferences_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

pub async fn delete_fit_rows_for_jobs(db: &Db, job_ids: &[i64]) -> Result<u64> {
	if job_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query("DELETE FROM user_job_fit WHERE job_postings_id = ANY($1)")
		.bind(job_ids)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

pub async fn insert_fit_rows(db: &Db, rows: &[FitRowInsert]) -> Result<u64> {
	if rows.is_empty() {
		return Ok(0);
	}

	let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
		"INSERT INTO user_job_fit (user_job_preferences_id, job_postings_id, fit_score) ",
	);

	builder.push_values(rows, |mut b, row| {
		b.push_bind(row.preferences_id).push_bind(row.job_id).push_bind(row.fit_score);
	});

	let result = builder.build().execute(&db.pool).await?;

	Ok(result.rows_affected())
}

pub async fn delete_job_postings(db: &Db, job_ids: &[i64]) -> Result<u64> {
	if job_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query("DELETE FROM job_postings WHERE id = ANY($1)")
		.bind(job_ids)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

/// Postings keyed by their exact embedding text. Rows without an
/// embedding cannot collide and are left out.
pub async fn dedup_candidates_by_embedding(db: &Db) -> Result<Vec<DedupCandidate>> {
	let rows = sqlx::query_as::<_, DedupCandidate>(
		"\
SELECT id, embedding::text AS key, created_at
FROM job_postings
WHERE embedding IS NOT NULL",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Postings keyed by the (title, company, location) identity tuple. The
/// key is a JSON array so field boundaries survive any delimiter the
/// fields themselves contain.
pub async fn dedup_candidates_by_identity(db: &Db) -> Result<Vec<DedupCandidate>> {
	let rows = sqlx::query_as::<_, DedupCandidate>(
		"\
SELECT id, jsonb_build_array(job_title, company, location)::text AS key, created_at
FROM job_postings",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn profiles_with_subscriptions(db: &Db) -> Result<Vec<Profile>> {
	let rows = sqlx::query_as::<_, Profile>(
		"\
SELECT
	id,
	subscription_id,
	subscription_status,
	is_subscribed,
	next_payment_amount,
	next_payment_date,
	last_login
FROM profiles
WHERE subscription_id IS NOT NULL",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn profile_by_id(db: &Db, id: Uuid) -> Result<Option<Profile>> {
	let profile = sqlx::query_as::<_, Profile>(
		"\
SELECT
	id,
	subscription_id,
	subscription_status,
	is_subscribed,
	next_payment_amount,
	next_payment_date,
	last_login
FROM profiles
WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(profile)
}

pub async fn update_profile_subscription(
	db: &Db,
	id: Uuid,
	status: &str,
	is_subscribed: bool,
	next_payment_amount: Option<f64>,
	next_payment_date: Option<OffsetDateTime>,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE profiles
SET
	subscription_status = $2,
	is_subscribed = $3,
	next_payment_amount = $4,
	next_payment_date = $5
WHERE id = $1",
	)
	.bind(id)
	.bind(status)
	.bind(is_subscribed)
	.bind(next_payment_amount)
	.bind(next_payment_date)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn preference_user_ids(db: &Db) -> Result<Vec<Uuid>> {
	let ids: Vec<Uuid> =
		sqlx::query_scalar("SELECT user_id FROM user_job_preferences ORDER BY id")
			.fetch_all(&db.pool)
			.await?;

	Ok(ids)
}

fn preferences_select(suffix: &str) -> String {
	format!(
		"\
SELECT
	id,
	user_id,
	ideal_work_situation,
	preferred_industries,
	preferred_roles_responsibilities,
	work_arrangement_preference,
	current_city,
	current_state,
	willing_to_relocate,
	preferred_locations,
	expected_salary_range,
	keywords,
	embedding::text AS embedding,
	created_at,
	updated_at
FROM user_job_preferences
{suffix}"
	)
}

fn map_preferences(row: PgRow) -> Result<UserJobPreferences> {
	let raw: Option<String> = row.try_get("embedding")?;
	let embedding = raw.and_then(|text| vector::decode(&text).ok());

	Ok(UserJobPreferences {
		id: row.try_get("id")?,
		user_id: row.try_get("user_id")?,
		ideal_work_situation: row.try_get("ideal_work_situation")?,
		preferred_industries: row.try_get("preferred_industries")?,
		preferred_roles_responsibilities: row.try_get("preferred_roles_responsibilities")?,
		work_arrangement_preference: row.try_get("work_arrangement_preference")?,
		current_city: row.try_get("current_city")?,
		current_state: row.try_get("current_state")?,
		willing_to_relocate: row.try_get("willing_to_relocate")?,
		preferred_locations: row.try_get("preferred_locations")?,
		expected_salary_range: row.try_get("expected_salary_range")?,
		keywords: row.try_get("keywords")?,
		embedding,
		created_at: row.try_get("created_at")?,
		updated_at: row.try_get("updated_at")?,
	})
}

fn map_job_posting(row: PgRow) -> Result<JobPosting> {
	let raw: Option<String> = row.try_get("embedding")?;
	let embedding = raw.and_then(|text| vector::decode(&text).ok());

	Ok(JobPosting {
		id: row.try_get("id")?,
		posting_url: row.try_get("posting_url")?,
		job_title: row.try_get("job_title")?,
		company: row.try_get("company")?,
		location: row.try_get("location")?,
		remote: row.try_get("remote")?,
		date_posted: row.try_get("date_posted")?,
		job_description: row.try_get("job_description")?,
		job_type: row.try_get("job_type")?,
		salary_range: row.try_get("salary_range")?,
		embedding,
		created_at: row.try_get("created_at")?,
	})
}
