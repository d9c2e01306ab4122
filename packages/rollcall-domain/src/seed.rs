//! Master agent records loaded from an existing dataset.
//!
//! Records use the member field names (`name`/`full_name`, `email(s)`, `phone(s)`) plus a team
//! identifier, an optional `agent_id`, and an optional `confidence_score`. Seeded agents are
//! treated as verified, so the confidence defaults to 100.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	fingerprint,
	member::MasterAgent,
	merge::MergePolicy,
	normalize::{self, NormalizationError},
};

const SEEDED_CONFIDENCE: u8 = 100;

/// Builds a master agent from one record. `record_id` names the record in errors.
///
/// Without an `agent_id`, the id is derived from the normalized content the same way a
/// no-match merge derives it, so reloading a dataset overwrites instead of duplicating.
pub fn normalize_agent(
	record_id: &str,
	record: &Value,
	policy: &MergePolicy,
	now: OffsetDateTime,
) -> Result<MasterAgent, NormalizationError> {
	let malformed = |path: &str, message: &str| NormalizationError::MalformedAgent {
		record_id: record_id.to_string(),
		path: format!("$.{path}"),
		message: message.to_string(),
	};
	let Value::Object(fields) = record else {
		return Err(NormalizationError::MalformedAgent {
			record_id: record_id.to_string(),
			path: "$".to_string(),
			message: "record must be an object".to_string(),
		});
	};
	let Some(team_id) = normalize::TEAM_KEYS
		.iter()
		.find_map(|key| normalize::scalar_to_string(fields.get(*key)?))
	else {
		return Err(NormalizationError::MissingTeam { document_id: record_id.to_string() });
	};
	let display_name = match normalize::first_present(fields, &normalize::NAME_KEYS) {
		None | Some((_, Value::Null)) => String::new(),
		Some((_, Value::String(name))) => normalize::normalize_name(name),
		Some((key, _)) => return Err(malformed(key, "name must be a string")),
	};
	let emails = normalize::collect_strings(fields, &normalize::EMAIL_KEYS, false)
		.map_err(|(path, message)| malformed(&path, message))?;
	let phones = normalize::collect_strings(fields, &normalize::PHONE_KEYS, true)
		.map_err(|(path, message)| malformed(&path, message))?;
	let emails = normalize::normalize_emails(emails.iter().map(String::as_str));
	let phones = normalize::normalize_phones(phones.iter().map(String::as_str));

	if display_name.is_empty() && emails.is_empty() && phones.is_empty() {
		return Err(NormalizationError::MalformedAgent {
			record_id: record_id.to_string(),
			path: "$".to_string(),
			message: "record carries no name, email, or phone".to_string(),
		});
	}

	let confidence_score =
		confidence(fields).map_err(|message| malformed("confidence_score", message))?;
	let agent_id = match agent_id(fields).map_err(|message| malformed("agent_id", message))? {
		Some(agent_id) => agent_id,
		None => {
			let digest = fingerprint::fingerprint(&team_id, &display_name, &emails, &phones);

			fingerprint::agent_id_for(&team_id, &digest)
		},
	};

	Ok(MasterAgent {
		agent_id,
		team_id,
		full_name: (!display_name.is_empty()).then_some(display_name),
		emails,
		phones,
		confidence_score,
		needs_review: policy.needs_review(confidence_score),
		last_updated: now,
	})
}

fn agent_id(fields: &Map<String, Value>) -> Result<Option<Uuid>, &'static str> {
	match fields.get("agent_id") {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(raw)) =>
			Uuid::parse_str(raw.trim()).map(Some).map_err(|_| "agent_id must be a UUID"),
		Some(_) => Err("agent_id must be a UUID string"),
	}
}

fn confidence(fields: &Map<String, Value>) -> Result<u8, &'static str> {
	match fields.get("confidence_score") {
		None | Some(Value::Null) => Ok(SEEDED_CONFIDENCE),
		Some(Value::Number(number)) => number
			.as_u64()
			.filter(|score| *score <= 100)
			.and_then(|score| u8::try_from(score).ok())
			.ok_or("confidence_score must be an integer between 0 and 100"),
		Some(_) => Err("confidence_score must be an integer between 0 and 100"),
	}
}
