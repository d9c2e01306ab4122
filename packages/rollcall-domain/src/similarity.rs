use std::collections::BTreeSet;

/// Name similarity measure used by the fuzzy rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NameSimilarity {
	#[default]
	JaroWinkler,
	/// Word trigram overlap, computed the way Postgres `pg_trgm` does.
	Trigram,
}
impl NameSimilarity {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"jaro_winkler" => Some(Self::JaroWinkler),
			"trigram" => Some(Self::Trigram),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::JaroWinkler => "jaro_winkler",
			Self::Trigram => "trigram",
		}
	}

	/// Scores two names in `[0, 1]`, case-insensitively.
	pub fn score(self, a: &str, b: &str) -> f64 {
		let a = a.to_lowercase();
		let b = b.to_lowercase();

		match self {
			Self::JaroWinkler => strsim::jaro_winkler(&a, &b),
			Self::Trigram => trigram_similarity(&a, &b),
		}
	}
}

pub fn trigram_similarity(a: &str, b: &str) -> f64 {
	let left = trigrams(a);
	let right = trigrams(b);

	if left.is_empty() || right.is_empty() {
		return 0.0;
	}

	let shared = left.intersection(&right).count();
	let total = left.len() + right.len() - shared;

	shared as f64 / total as f64
}

// Each word is padded with two leading blanks and one trailing blank before windowing.
fn trigrams(text: &str) -> BTreeSet<String> {
	let mut out = BTreeSet::new();

	for word in text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()) {
		let padded: Vec<char> =
			"  ".chars().chain(word.to_lowercase().chars()).chain(" ".chars()).collect();

		for window in padded.windows(3) {
			out.insert(window.iter().collect());
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn jaro_winkler_tolerates_small_typos() {
		let score = NameSimilarity::JaroWinkler.score("Jon Smith", "John Smith");

		assert!(score > 0.9, "score was {score}");
	}

	#[test]
	fn scores_ignore_case() {
		for measure in [NameSimilarity::JaroWinkler, NameSimilarity::Trigram] {
			assert_eq!(measure.score("JANE DOE", "jane doe"), 1.0);
		}
	}

	#[test]
	fn trigram_matches_pg_trgm_shape() {
		// "cat" -> {"  c", " ca", "cat", "at "}; "cap" shares two of six distinct trigrams.
		let score = trigram_similarity("cat", "cap");

		assert!((score - 2.0 / 6.0).abs() < 1e-9, "score was {score}");
		assert_eq!(trigram_similarity("", "cat"), 0.0);
		assert_eq!(trigram_similarity("cat", "cat"), 1.0);
	}

	#[test]
	fn parse_accepts_known_names() {
		assert_eq!(NameSimilarity::parse("trigram"), Some(NameSimilarity::Trigram));
		assert_eq!(NameSimilarity::parse("jaro_winkler"), Some(NameSimilarity::JaroWinkler));
		assert_eq!(NameSimilarity::parse("levenshtein"), None);
	}
}
