/// Cosine similarity of two embeddings.
///
/// Returns 0.0 for mismatched dimensions, empty inputs, or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
	if a.is_empty() || a.len() != b.len() {
		return 0.0;
	}

	let mut dot = 0.0_f64;
	let mut norm_a = 0.0_f64;
	let mut norm_b = 0.0_f64;

	for (x, y) in a.iter().zip(b) {
		let x = f64::from(*x);
		let y = f64::from(*y);

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a <= 0.0 || norm_b <= 0.0 {
		return 0.0;
	}

	let value = dot / (norm_a.sqrt() * norm_b.sqrt());

	if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_vectors_are_fully_similar() {
		let value = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);

		assert!((value - 1.0).abs() < 1e-9);
	}

	#[test]
	fn orthogonal_vectors_score_zero() {
		assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
	}

	#[test]
	fn degenerate_inputs_score_zero() {
		assert_eq!(cosine_similarity(&[], &[]), 0.0);
		assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
	}
}
