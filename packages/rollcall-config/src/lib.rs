mod error;
mod types;

pub use error::{Error, Result};
pub use types::{EXACT_NAME_CONFIDENCE, Config, Matching, Merge, Postgres, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.fuzzy_threshold.is_finite() {
		return Err(Error::Validation {
			message: "matching.fuzzy_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..1.0).contains(&cfg.matching.fuzzy_threshold) {
		return Err(Error::Validation {
			message: "matching.fuzzy_threshold must be in the range 0.0-1.0 (exclusive of 1.0)."
				.to_string(),
		});
	}
	if !(1..=100).contains(&cfg.matching.review_threshold) {
		return Err(Error::Validation {
			message: "matching.review_threshold must be in the range 1-100.".to_string(),
		});
	}
	if cfg.matching.fuzzy_confidence == 0 {
		return Err(Error::Validation {
			message: "matching.fuzzy_confidence must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.fuzzy_confidence >= EXACT_NAME_CONFIDENCE {
		return Err(Error::Validation {
			message: format!(
				"matching.fuzzy_confidence must be less than the exact name confidence ({EXACT_NAME_CONFIDENCE})."
			),
		});
	}
	if cfg.matching.fuzzy_confidence >= cfg.matching.review_threshold {
		return Err(Error::Validation {
			message: "matching.fuzzy_confidence must be less than matching.review_threshold."
				.to_string(),
		});
	}
	if !matches!(cfg.matching.name_similarity.as_str(), "jaro_winkler" | "trigram") {
		return Err(Error::Validation {
			message: "matching.name_similarity must be one of jaro_winkler or trigram.".to_string(),
		});
	}
	if cfg.merge.batch_size == 0 {
		return Err(Error::Validation {
			message: "merge.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.merge.max_parallel_teams == 0 {
		return Err(Error::Validation {
			message: "merge.max_parallel_teams must be greater than zero.".to_string(),
		});
	}
	if cfg.merge.max_conflict_retries == 0 {
		return Err(Error::Validation {
			message: "merge.max_conflict_retries must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.matching.name_similarity = cfg.matching.name_similarity.trim().to_ascii_lowercase();

	if cfg.service.log_level.is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
