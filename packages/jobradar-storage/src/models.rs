use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug)]
pub struct JobPosting {
	pub id: i64,
	pub posting_url: String,
	pub job_title: String,
	pub company: String,
	pub location: String,
	pub remote: String,
	pub date_posted: Option<Date>,
	pub job_description: String,
	pub job_type: String,
	pub salary_range: String,
	pub embedding: Option<Vec<f32>>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewJobPosting {
	pub posting_url: String,
	pub job_title: String,
	pub company: String,
	pub location: String,
	pub remote: String,
	pub date_posted: Option<Date>,
	pub job_description: String,
	pub job_type: String,
	pub salary_range: String,
	pub embedding: Vec<f32>,
}

/// Minimal projection used by the scoring pass.
#[derive(Debug)]
pub struct JobVectorRow {
	pub id: i64,
	pub embedding: Option<Vec<f32>>,
}

#[derive(Debug)]
pub struct UserJobPreferences {
	pub id: i64,
	pub user_id: Uuid,
	pub ideal_work_situation: String,
	pub preferred_industries: String,
	pub preferred_roles_responsibilities: String,
	pub work_arrangement_preference: String,
	pub current_city: String,
	pub current_state: String,
	pub willing_to_relocate: bool,
	pub preferred_locations: String,
	pub expected_salary_range: String,
	pub keywords: Vec<String>,
	pub embedding: Option<Vec<f32>>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Profile {
	pub id: Uuid,
	pub subscription_id: Option<String>,
	pub subscription_status: Option<String>,
	pub is_subscribed: bool,
	pub next_payment_amount: Option<f64>,
	pub next_payment_date: Option<OffsetDateTime>,
	pub last_login: Option<OffsetDateTime>,
}

/// One row destined for `user_job_fit`.
#[derive(Clone, Copy, Debug)]
pub struct FitRowInsert {
	pub preferences_id: i64,
	pub job_id: i64,
	pub fit_score: f32,
}

/// A posting projected down to its duplicate-detection key.
#[derive(Debug, sqlx::FromRow)]
pub struct DedupCandidate {
	pub id: i64,
	pub key: String,
	pub created_at: OffsetDateTime,
}
