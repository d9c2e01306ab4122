use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	fingerprint::{self, Fingerprint},
	normalize,
};

/// Emails or phones. Membership is what matters; the ordering only keeps output stable.
pub type ContactSet = BTreeSet<String>;

/// One person extracted from a raw document, normalized and fingerprinted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateMember {
	pub source_document_id: String,
	pub team_id: String,
	pub display_name: String,
	pub emails: ContactSet,
	pub phones: ContactSet,
	pub fingerprint: Fingerprint,
}
impl CandidateMember {
	/// Builds a candidate from raw field values, applying the normalization rules to each field.
	pub fn new<'a, E, P>(
		source_document_id: impl Into<String>,
		team_id: impl Into<String>,
		name: &str,
		emails: E,
		phones: P,
	) -> Self
	where
		E: IntoIterator<Item = &'a str>,
		P: IntoIterator<Item = &'a str>,
	{
		let team_id = team_id.into();
		let display_name = normalize::normalize_name(name);
		let emails = normalize::normalize_emails(emails);
		let phones = normalize::normalize_phones(phones);
		let fingerprint = fingerprint::fingerprint(&team_id, &display_name, &emails, &phones);

		Self {
			source_document_id: source_document_id.into(),
			team_id,
			display_name,
			emails,
			phones,
			fingerprint,
		}
	}

	/// True when the candidate carries nothing the matcher could use.
	pub fn is_empty(&self) -> bool {
		self.display_name.is_empty() && self.emails.is_empty() && self.phones.is_empty()
	}

	pub fn candidate_id(&self) -> Uuid {
		fingerprint::candidate_id_for(&self.team_id, &self.fingerprint)
	}
}

/// The authoritative record for one person within one team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterAgent {
	pub agent_id: Uuid,
	pub team_id: String,
	pub full_name: Option<String>,
	pub emails: ContactSet,
	pub phones: ContactSet,
	pub confidence_score: u8,
	pub needs_review: bool,
	pub last_updated: OffsetDateTime,
}
impl MasterAgent {
	/// Compares everything except `last_updated`.
	pub fn same_content(&self, other: &Self) -> bool {
		self.agent_id == other.agent_id
			&& self.team_id == other.team_id
			&& self.full_name == other.full_name
			&& self.emails == other.emails
			&& self.phones == other.phones
			&& self.confidence_score == other.confidence_score
			&& self.needs_review == other.needs_review
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_normalizes_every_field() {
		let candidate = CandidateMember::new(
			"doc-1",
			"T1",
			"  Jane   Doe ",
			[" Jane@X.com; jane@x.com ", "j.doe@y.org"],
			["(555) 123-4567", "555.123.4567"],
		);

		assert_eq!(candidate.display_name, "Jane Doe");
		assert_eq!(
			candidate.emails.iter().map(String::as_str).collect::<Vec<_>>(),
			vec!["j.doe@y.org", "jane@x.com"]
		);
		assert_eq!(candidate.phones.len(), 1);
		assert!(candidate.phones.contains("5551234567"));
	}

	#[test]
	fn empty_candidate_is_detected() {
		let candidate = CandidateMember::new("doc-1", "T1", "   ", [], []);

		assert!(candidate.is_empty());
	}
}
