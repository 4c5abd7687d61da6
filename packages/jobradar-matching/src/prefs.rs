use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use jobradar_domain::parse_keyword_array;
use jobradar_storage::{db::Db, models::UserJobPreferences, queries};

use crate::{Error, Providers, Result, ScoreReport, score};

const KEYWORD_SYSTEM_PROMPT: &str = "\
You are a job search assistant. Given a user's job preferences, produce a \
list of short search keywords that would surface matching job postings. \
Respond with a JSON array of strings and nothing else.";

/// Text rendered from the preference fields alone, used to prompt the
/// keyword model.
pub fn preference_profile_text(prefs: &UserJobPreferences) -> String {
	format!(
		"Ideal work situation: {}\nPreferred industries: {}\nPreferred roles and responsibilities: {}\nWork arrangement preference: {}\nCurrent location: {}, {}\nWilling to relocate: {}\nPreferred locations: {}\nExpected salary range: {}",
		prefs.ideal_work_situation,
		prefs.preferred_industries,
		prefs.preferred_roles_responsibilities,
		prefs.work_arrangement_preference,
		prefs.current_city,
		prefs.current_state,
		if prefs.willing_to_relocate { "Yes" } else { "No" },
		prefs.preferred_locations,
		prefs.expected_salary_range,
	)
}

/// The profile text plus the stored keywords; this is what gets embedded
/// into the shared vector space with postings.
pub fn preference_embedding_text(prefs: &UserJobPreferences) -> String {
	format!("{}\nKeywords: {}", preference_profile_text(prefs), prefs.keywords.join(", "))
}

pub async fn generate_keywords(
	providers: &Providers,
	cfg: &jobradar_config::LlmProviderConfig,
	prefs: &UserJobPreferences,
	limit: usize,
) -> Result<Vec<String>> {
	let user_content = format!(
		"{}\n\nReturn at most {limit} keywords.",
		preference_profile_text(prefs),
	);
	let reply = providers.extractor.complete(cfg, KEYWORD_SYSTEM_PROMPT, &user_content).await?;
	let stripped = jobradar_domain::strip_code_fences(&reply);

	Ok(parse_keyword_array(stripped, limit))
}

/// Regenerates one user's keywords and embedding, then rescore their fit
/// against every stored posting.
///
/// Users who have not logged in recently are skipped outright, as are
/// users without a preferences row. Subscribers get the larger keyword
/// allowance.
pub async fn reprocess_user(
	db: &Db,
	cfg: &jobradar_config::Config,
	providers: &Providers,
	user_id: Uuid,
) -> Result<Option<ScoreReport>> {
	let profile = queries::profile_by_id(db, user_id).await?;
	let cutoff = OffsetDateTime::now_utc() - Duration::days(cfg.matching.inactive_after_days);
	let active = profile
		.as_ref()
		.and_then(|p| p.last_login)
		.map(|last_login| last_login >= cutoff)
		.unwrap_or(false);

	if !active {
		tracing::debug!(%user_id, "Skipping inactive user.");

		return Ok(None);
	}

	let Some(mut prefs) = queries::preferences_by_user_id(db, user_id).await? else {
		tracing::debug!(%user_id, "User has no stored preferences.");

		return Ok(None);
	};
	let is_subscribed = profile.map(|p| p.is_subscribed).unwrap_or(false);
	let limit = if is_subscribed {
		cfg.matching.subscriber_keyword_limit
	} else {
		cfg.matching.free_keyword_limit
	} as usize;

	let keywords =
		generate_keywords(providers, &cfg.providers.llm_extractor, &prefs, limit).await?;

	queries::update_preference_keywords(db, prefs.id, &keywords).await?;

	prefs.keywords = keywords;

	let text = preference_embedding_text(&prefs);
	let vectors = providers.embedding.embed(&cfg.providers.embedding, &[text]).await?;
	let Some(embedding) = vectors.into_iter().next() else {
		return Err(Error::Provider(jobradar_providers::Error::InvalidResponse {
			message: "Embedding response contained no vectors.".to_string(),
		}));
	};

	if embedding.len() != cfg.providers.embedding.dimensions as usize {
		return Err(Error::Provider(jobradar_providers::Error::InvalidResponse {
			message: format!(
				"Embedding has {} dimensions, expected {}.",
				embedding.len(),
				cfg.providers.embedding.dimensions,
			),
		}));
	}

	queries::update_preference_embedding(db, prefs.id, &embedding).await?;

	score::score_all_jobs(db, &cfg.matching, prefs.id).await
}
