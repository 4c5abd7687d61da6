//! pgvector columns travel through SQL as their text form. Encoding and
//! decoding live here so every query binds `$n::text::vector` and selects
//! `embedding::text` through the same two functions.

use crate::{Error, Result};

pub fn encode(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn decode(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let inner = trimmed
		.strip_prefix('[')
		.and_then(|rest| rest.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidVector(format!("Missing brackets in {trimmed:?}.")))?;

	if inner.trim().is_empty() {
		return Ok(Vec::new());
	}

	inner
		.split(',')
		.map(|part| {
			part.trim()
				.parse::<f32>()
				.map_err(|_| Error::InvalidVector(format!("Non-numeric component {part:?}.")))
		})
		.collect()
}
