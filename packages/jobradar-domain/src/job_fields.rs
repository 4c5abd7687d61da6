use serde::Serialize;
use serde_json::Value;
use time::{Date, macros::format_description};

/// Filler for any field the extraction model could not determine.
pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RemoteStatus {
	Yes,
	No,
	Hybrid,
	Unknown,
}

impl RemoteStatus {
	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"yes" => Self::Yes,
			"no" => Self::No,
			"hybrid" => Self::Hybrid,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Yes => "Yes",
			Self::No => "No",
			Self::Hybrid => "Hybrid",
			Self::Unknown => UNKNOWN,
		}
	}
}

/// Structured fields extracted from a posting page.
///
/// Every text field falls back to the literal `Unknown` so downstream
/// embedding text stays shaped the same regardless of extraction gaps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobFields {
	pub job_title: String,
	pub company: String,
	pub location: String,
	pub remote: RemoteStatus,
	pub date_posted: Option<Date>,
	pub job_description: String,
	pub job_type: String,
	pub salary_range: String,
}

impl JobFields {
	/// Builds fields from the extraction model's JSON reply. Returns `None`
	/// when the reply is not a JSON object at all.
	pub fn from_llm_value(value: &Value) -> Option<Self> {
		let map = value.as_object()?;
		let text = |key: &str| -> String {
			map.get(key)
				.and_then(Value::as_str)
				.map(str::trim)
				.filter(|raw| !raw.is_empty())
				.unwrap_or(UNKNOWN)
				.to_string()
		};

		Some(Self {
			job_title: text("Job Title"),
			company: text("Company"),
			location: text("Location"),
			remote: RemoteStatus::parse(&text("Remote")),
			date_posted: parse_date_posted(&text("Date Posted")),
			job_description: text("Job Description"),
			job_type: text("Job Type"),
			salary_range: text("Salary Range"),
		})
	}

	/// Renders the one-field-per-line text that gets embedded.
	pub fn embedding_text(&self) -> String {
		let date_posted = self
			.date_posted
			.map(|date| date.to_string())
			.unwrap_or_else(|| UNKNOWN.to_string());

		format!(
			"Job Title: {}\nCompany: {}\nLocation: {}\nRemote: {}\nDate Posted: {}\nJob Description: {}\nJob Type: {}\nSalary Range: {}",
			self.job_title,
			self.company,
			self.location,
			self.remote.as_str(),
			date_posted,
			self.job_description,
			self.job_type,
			self.salary_range,
		)
	}
}

/// Accepts only `YYYY-MM-DD`. Anything else, including the `Unknown`
/// filler and prose like "3 days ago", is treated as absent.
pub fn parse_date_posted(raw: &str) -> Option<Date> {
	let trimmed = raw.trim();

	if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) {
		return None;
	}

	Date::parse(trimmed, format_description!("[year]-[month]-[day]")).ok()
}

/// Chat models often wrap JSON replies in Markdown code fences. Strips a
/// single leading fence line (with or without a language tag) and a
/// trailing fence line, leaving other content untouched.
pub fn strip_code_fences(raw: &str) -> &str {
	let trimmed = raw.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let body = match rest.find('\n') {
		Some(newline) => &rest[newline + 1..],
		None => rest,
	};

	body.strip_suffix("```").unwrap_or(body).trim()
}
