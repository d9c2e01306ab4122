use serde::Deserialize;

/// Confidence assigned to an exact (case-insensitive) name match.
pub const EXACT_NAME_CONFIDENCE: u8 = 80;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub merge: Merge,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Matching {
	/// Names must be strictly more similar than this to count as a fuzzy match.
	pub fuzzy_threshold: f64,
	pub fuzzy_confidence: u8,
	/// Agents whose confidence is below this value are flagged for manual review.
	pub review_threshold: u8,
	/// One of "jaro_winkler" or "trigram".
	pub name_similarity: String,
}
impl Default for Matching {
	fn default() -> Self {
		Self {
			fuzzy_threshold: 0.8,
			fuzzy_confidence: 60,
			review_threshold: 70,
			name_similarity: "jaro_winkler".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Merge {
	pub batch_size: u32,
	pub max_parallel_teams: u32,
	pub max_conflict_retries: u32,
}
impl Default for Merge {
	fn default() -> Self {
		Self { batch_size: 1_000, max_parallel_teams: 4, max_conflict_retries: 5 }
	}
}
