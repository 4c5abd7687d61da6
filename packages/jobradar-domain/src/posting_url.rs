/// A posting URL must be absolute http(s) with a non-empty host and no
/// embedded whitespace. Relative links and javascript: anchors scraped
/// off board pages fail here and are skipped.
pub fn is_valid_posting_url(raw: &str) -> bool {
	let trimmed = raw.trim();

	if trimmed.chars().any(char::is_whitespace) {
		return false;
	}

	let rest = match trimmed.strip_prefix("https://").or_else(|| trimmed.strip_prefix("http://")) {
		Some(rest) => rest,
		None => return false,
	};

	let host = rest.split(['/', '?', '#']).next().unwrap_or_default();

	!host.is_empty()
}
