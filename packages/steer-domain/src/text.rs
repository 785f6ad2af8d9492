use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

/// Lowercased unique words of at least `min_len` characters, in first-seen order.
pub fn tokenize_terms(text: &str, min_len: usize, max_terms: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	if max_terms == 0 {
		return out;
	}

	for word in text.unicode_words() {
		let token = word.to_lowercase();

		if token.chars().count() < min_len {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Fraction of `query_terms` present in `text`.
pub fn term_overlap_ratio(query_terms: &[String], text: &str, max_text_terms: usize) -> f64 {
	if query_terms.is_empty() {
		return 0.0;
	}

	let text_terms: HashSet<String> =
		tokenize_terms(text, 1, max_text_terms).into_iter().collect();

	if text_terms.is_empty() {
		return 0.0;
	}

	let matched = query_terms.iter().filter(|term| text_terms.contains(term.as_str())).count();

	matched as f64 / query_terms.len() as f64
}

pub fn shares_word(a: &str, b: &str, min_len: usize) -> bool {
	let left: HashSet<String> = tokenize_terms(a, min_len, usize::MAX).into_iter().collect();

	if left.is_empty() {
		return false;
	}

	tokenize_terms(b, min_len, usize::MAX).iter().any(|token| left.contains(token))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokenizes_unique_lowercase_words() {
		let out = tokenize_terms("Clinical trial, clinical PROTOCOL v2", 2, 16);

		assert_eq!(out, vec!["clinical", "trial", "protocol", "v2"]);
	}

	#[test]
	fn overlap_ratio_counts_query_terms() {
		let terms = tokenize_terms("gold loan rates", 2, 16);
		let ratio = term_overlap_ratio(&terms, "Current gold loan interest", 1_024);

		assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
	}

	#[test]
	fn shared_words_respect_minimum_length() {
		assert!(shares_word("blood pressure", "pressure monitor", 3));
		assert!(!shares_word("an ox", "ox an", 3));
	}
}
