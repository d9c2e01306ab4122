//! Turns raw team documents into candidate members.
//!
//! A document is a JSON object carrying a team identifier and an embedded `members` array. Each
//! member becomes exactly one [`CandidateMember`], even when it carries no usable contact data;
//! a malformed member is reported on its own and never hides its siblings.

use std::{iter::Enumerate, slice::Iter};

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::member::{CandidateMember, ContactSet};

pub(crate) const TEAM_KEYS: [&str; 2] = ["team_id", "company_id"];
pub(crate) const NAME_KEYS: [&str; 2] = ["name", "full_name"];
pub(crate) const EMAIL_KEYS: [&str; 2] = ["emails", "email"];
pub(crate) const PHONE_KEYS: [&str; 2] = ["phones", "phone"];
const DOCUMENT_ID_KEYS: [&str; 2] = ["id", "document_id"];
const PHONE_SEPARATORS: [char; 4] = [',', ';', '/', '|'];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
	#[error("Document {document_id} has no team identifier.")]
	MissingTeam { document_id: String },
	#[error("Document {document_id} has no member list at $.members.")]
	MissingMembers { document_id: String },
	#[error("Malformed member in document {document_id} at {path}: {message}")]
	MalformedMember { document_id: String, path: String, message: String },
	/// A master agent record that cannot be loaded.
	#[error("Malformed agent record {record_id} at {path}: {message}")]
	MalformedAgent { record_id: String, path: String, message: String },
}
impl NormalizationError {
	pub fn document_id(&self) -> &str {
		match self {
			Self::MissingTeam { document_id }
			| Self::MissingMembers { document_id }
			| Self::MalformedMember { document_id, .. } => document_id,
			Self::MalformedAgent { record_id, .. } => record_id,
		}
	}

	/// JSON path of the offending value.
	pub fn path(&self) -> &str {
		match self {
			Self::MissingTeam { .. } => "$.team_id",
			Self::MissingMembers { .. } => "$.members",
			Self::MalformedMember { path, .. } | Self::MalformedAgent { path, .. } => path,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawDocument {
	pub document_id: String,
	pub payload: Value,
}
impl RawDocument {
	pub fn new(document_id: impl Into<String>, payload: Value) -> Self {
		Self { document_id: document_id.into(), payload }
	}

	/// Uses the payload's own `id`/`document_id` when present, otherwise a content hash.
	pub fn from_value(payload: Value) -> Self {
		let document_id = DOCUMENT_ID_KEYS
			.iter()
			.find_map(|key| scalar_to_string(payload.get(*key)?))
			.unwrap_or_else(|| {
				let raw = payload.to_string();

				blake3::hash(raw.as_bytes()).to_hex().to_string()
			});

		Self { document_id, payload }
	}

	pub fn team_id(&self) -> Option<String> {
		TEAM_KEYS.iter().find_map(|key| scalar_to_string(self.payload.get(*key)?))
	}
}

/// Single pass over a document's member list.
pub struct Members<'a> {
	document_id: &'a str,
	team_id: String,
	members: Enumerate<Iter<'a, Value>>,
}
impl Iterator for Members<'_> {
	type Item = Result<CandidateMember, NormalizationError>;

	fn next(&mut self) -> Option<Self::Item> {
		let (idx, member) = self.members.next()?;

		Some(normalize_member(self.document_id, &self.team_id, idx, member))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.members.size_hint()
	}
}

pub fn normalize_document(doc: &RawDocument) -> Result<Members<'_>, NormalizationError> {
	let Some(team_id) = doc.team_id() else {
		return Err(NormalizationError::MissingTeam { document_id: doc.document_id.clone() });
	};
	let Some(Value::Array(members)) = doc.payload.get("members") else {
		return Err(NormalizationError::MissingMembers { document_id: doc.document_id.clone() });
	};

	Ok(Members { document_id: doc.document_id.as_str(), team_id, members: members.iter().enumerate() })
}

/// NFKC, trim, and collapse internal whitespace runs to single spaces.
pub fn normalize_name(raw: &str) -> String {
	let normalized: String = raw.nfkc().collect();

	normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_emails<'a>(raw: impl IntoIterator<Item = &'a str>) -> ContactSet {
	raw.into_iter()
		.flat_map(|value| value.split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace()))
		.map(|token| token.trim().to_lowercase())
		.filter(|token| !token.is_empty())
		.collect()
}

pub fn normalize_phones<'a>(raw: impl IntoIterator<Item = &'a str>) -> ContactSet {
	raw.into_iter()
		.flat_map(|value| value.split(PHONE_SEPARATORS))
		.map(|token| token.chars().filter(char::is_ascii_digit).collect::<String>())
		.filter(|digits| !digits.is_empty())
		.collect()
}

fn normalize_member(
	document_id: &str,
	team_id: &str,
	idx: usize,
	member: &Value,
) -> Result<CandidateMember, NormalizationError> {
	let base = format!("$.members[{idx}]");
	let malformed = |path: String, message: &str| NormalizationError::MalformedMember {
		document_id: document_id.to_string(),
		path,
		message: message.to_string(),
	};
	let Value::Object(fields) = member else {
		return Err(malformed(base, "member must be an object"));
	};
	let name = match first_present(fields, &NAME_KEYS) {
		None | Some((_, Value::Null)) => "",
		Some((_, Value::String(name))) => name.as_str(),
		Some((key, _)) => return Err(malformed(format!("{base}.{key}"), "name must be a string")),
	};
	let emails = collect_strings(fields, &EMAIL_KEYS, false)
		.map_err(|(path, message)| malformed(format!("{base}.{path}"), message))?;
	let phones = collect_strings(fields, &PHONE_KEYS, true)
		.map_err(|(path, message)| malformed(format!("{base}.{path}"), message))?;

	Ok(CandidateMember::new(
		document_id,
		team_id,
		name,
		emails.iter().map(String::as_str),
		phones.iter().map(String::as_str),
	))
}

pub(crate) fn first_present<'a>(
	fields: &'a serde_json::Map<String, Value>,
	keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
	keys.iter().find_map(|key| fields.get(*key).map(|value| (*key, value)))
}

// Accepts a string, an array of strings, or null. Integers are accepted where `allow_numbers`
// is set, since phone columns are often exported as numbers. Fractional or exponent forms would
// leave stray digits behind, so they are rejected.
pub(crate) fn collect_strings(
	fields: &serde_json::Map<String, Value>,
	keys: &[&'static str],
	allow_numbers: bool,
) -> Result<Vec<String>, (String, &'static str)> {
	let Some((key, value)) = first_present(fields, keys) else {
		return Ok(Vec::new());
	};
	let message =
		if allow_numbers { "expected a string, integer, or list" } else { "expected a string or list" };

	match value {
		Value::Null => Ok(Vec::new()),
		Value::String(text) => Ok(vec![text.clone()]),
		Value::Number(number) if allow_numbers =>
			integer_text(number).map(|text| vec![text]).ok_or_else(|| (key.to_string(), message)),
		Value::Array(items) => {
			let mut out = Vec::with_capacity(items.len());

			for (idx, item) in items.iter().enumerate() {
				let text = match item {
					Value::Null => continue,
					Value::String(text) => Some(text.clone()),
					Value::Number(number) if allow_numbers => integer_text(number),
					_ => None,
				};

				out.push(text.ok_or_else(|| (format!("{key}[{idx}]"), message))?);
			}

			Ok(out)
		},
		_ => Err((key.to_string(), message)),
	}
}

fn integer_text(number: &serde_json::Number) -> Option<String> {
	match (number.as_u64(), number.as_i64()) {
		(Some(value), _) => Some(value.to_string()),
		(None, Some(value)) => Some(value.to_string()),
		(None, None) => None,
	}
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
	match value {
		Value::String(text) => {
			let trimmed = text.trim();

			if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
		},
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collapses_internal_whitespace() {
		assert_eq!(normalize_name("\t Jane \n\n  van   Doe  "), "Jane van Doe");
		assert_eq!(normalize_name("   "), "");
	}

	#[test]
	fn name_is_nfkc_normalized() {
		// Fullwidth Latin folds to ASCII and a decomposed accent composes.
		assert_eq!(normalize_name("\u{FF2A}ane"), "Jane");
		assert_eq!(normalize_name("Jose\u{301}"), "Jos\u{E9}");
	}

	#[test]
	fn emails_split_on_every_delimiter() {
		let emails = normalize_emails(["A@x.com,b@x.com; c@x.com\td@x.com  ", ";;", "A@X.COM"]);

		assert_eq!(
			emails.iter().map(String::as_str).collect::<Vec<_>>(),
			vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]
		);
	}

	#[test]
	fn phones_keep_digits_only() {
		let phones = normalize_phones(["+1 (555) 123-4567", "ext.", "555-000-1111 / 555 222 3333"]);

		assert_eq!(
			phones.iter().map(String::as_str).collect::<Vec<_>>(),
			vec!["15551234567", "5550001111", "5552223333"]
		);
	}

	#[test]
	fn fractional_phone_numbers_are_rejected() {
		let doc = RawDocument::new(
			"doc-1",
			serde_json::json!({
				"team_id": "T1",
				"members": [
					{ "phone": 5.551234567e9 },
					{ "phones": [5551234567_u64, 1.5] },
					{ "phone": 5551234567_u64 },
				],
			}),
		);
		let results = normalize_document(&doc).expect("Document should normalize.").collect::<Vec<_>>();

		assert!(matches!(
			&results[0],
			Err(NormalizationError::MalformedMember { path, .. }) if path == "$.members[0].phone"
		));
		assert!(matches!(
			&results[1],
			Err(NormalizationError::MalformedMember { path, .. }) if path == "$.members[1].phones[1]"
		));
		assert!(results[2].as_ref().is_ok_and(|member| member.phones.contains("5551234567")));
	}

	#[test]
	fn document_id_prefers_payload_field() {
		let doc = RawDocument::from_value(serde_json::json!({ "id": 42, "team_id": "T1" }));

		assert_eq!(doc.document_id, "42");
	}

	#[test]
	fn document_id_falls_back_to_content_hash() {
		let payload = serde_json::json!({ "team_id": "T1", "members": [] });
		let first = RawDocument::from_value(payload.clone());
		let second = RawDocument::from_value(payload);

		assert_eq!(first.document_id.len(), 64);
		assert_eq!(first.document_id, second.document_id);
	}
}
