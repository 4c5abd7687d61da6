/// Parses a model-produced keyword list into at most `max` entries.
///
/// The model is asked for a JSON array of strings but replies drift, so
/// this accepts bracketed, quoted, or plain comma-separated text. Order
/// is preserved and duplicates (case-insensitive) are dropped.
pub fn parse_keyword_array(raw: &str, max: usize) -> Vec<String> {
	let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
	let mut seen = Vec::new();
	let mut keywords = Vec::new();

	for part in trimmed.split(',') {
		let keyword = part.trim().trim_matches(|c| c == '"' || c == '\'').trim();

		if keyword.is_empty() {
			continue;
		}

		let folded = keyword.to_ascii_lowercase();

		if seen.contains(&folded) {
			continue;
		}

		seen.push(folded);
		keywords.push(keyword.to_string());

		if keywords.len() == max {
			break;
		}
	}

	keywords
}
