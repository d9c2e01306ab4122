//! Newline-delimited JSON feeds of team documents or master agent records.

use std::{fs, path::Path};

use color_eyre::{Result, eyre::WrapErr};
use serde_json::Value;

use rollcall_domain::RawDocument;

pub fn read_documents(path: &Path) -> Result<Vec<RawDocument>> {
	Ok(read_values(path)?.into_iter().map(RawDocument::from_value).collect())
}

pub fn read_values(path: &Path) -> Result<Vec<Value>> {
	let raw =
		fs::read_to_string(path).wrap_err_with(|| format!("Failed to read feed at {path:?}."))?;

	parse_values(&raw).wrap_err_with(|| format!("Failed to parse feed at {path:?}."))
}

pub fn parse_documents(raw: &str) -> Result<Vec<RawDocument>> {
	Ok(parse_values(raw)?.into_iter().map(RawDocument::from_value).collect())
}

/// One JSON value per line. Blank lines are skipped.
pub fn parse_values(raw: &str) -> Result<Vec<Value>> {
	let mut values = Vec::new();

	for (idx, line) in raw.lines().enumerate() {
		let line = line.trim();

		if line.is_empty() {
			continue;
		}

		let value = serde_json::from_str(line)
			.wrap_err_with(|| format!("Line {} is not valid JSON.", idx + 1))?;

		values.push(value);
	}

	Ok(values)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn skips_blank_lines() {
		let documents = parse_documents(
			"{\"id\": \"a\", \"team_id\": \"T1\", \"members\": []}\n\n   \n{\"id\": 7, \"members\": []}\n",
		)
		.expect("Feed should parse.");
		let ids = documents.iter().map(|doc| doc.document_id.as_str()).collect::<Vec<_>>();

		assert_eq!(ids, vec!["a", "7"]);
	}

	#[test]
	fn agent_records_keep_their_shape() {
		let values = parse_values("{\"team_id\": \"T1\", \"name\": \"Jane\"}\n\n[1]\n")
			.expect("Feed should parse.");

		assert_eq!(values.len(), 2);
		assert_eq!(values[0]["name"], "Jane");
		assert!(values[1].is_array());
	}

	#[test]
	fn reports_the_failing_line() {
		let err = parse_documents("{\"id\": \"a\"}\n\n{not json}\n").expect_err("Feed should fail.");

		assert!(format!("{err}").contains("Line 3"), "unexpected error: {err}");
	}
}
