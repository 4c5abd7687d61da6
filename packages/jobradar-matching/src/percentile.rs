/// Rank of `value` among `scores`, rounded to a whole percentage. The
/// rank counts strictly smaller scores, so the minimum lands at 0 and a
/// value above everything lands at 100. Empty input has no rank.
pub fn percentile(scores: &[f32], value: f32) -> Option<u32> {
	if scores.is_empty() {
		return None;
	}

	let below = scores.iter().filter(|score| **score < value).count();

	Some((100.0 * below as f64 / scores.len() as f64).round() as u32)
}
