//! Field-level merge rules applied to a master agent.
//!
//! Emails and phones only grow, confidence never decreases, and the review flag is recomputed
//! from the resulting confidence on every merge. Applying the same merge twice leaves the agent
//! as it was after the first application.

use rollcall_config::Matching;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	fingerprint,
	matcher::MatchResult,
	member::{CandidateMember, MasterAgent},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergePolicy {
	pub review_threshold: u8,
}
impl MergePolicy {
	pub fn from_config(cfg: &Matching) -> Self {
		Self { review_threshold: cfg.review_threshold }
	}

	pub fn needs_review(&self, confidence: u8) -> bool {
		confidence < self.review_threshold
	}
}
impl Default for MergePolicy {
	fn default() -> Self {
		Self::from_config(&Matching::default())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeOp {
	Created,
	Updated,
	Unchanged,
}
impl MergeOp {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Updated => "updated",
			Self::Unchanged => "unchanged",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"created" => Some(Self::Created),
			"updated" => Some(Self::Updated),
			"unchanged" => Some(Self::Unchanged),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
	pub agent: MasterAgent,
	pub op: MergeOp,
}

/// The agent a merge writes to: the matched agent, or the agent derived from the candidate's
/// fingerprint when nothing matched.
pub fn target_agent_id(candidate: &CandidateMember, result: &MatchResult) -> Uuid {
	result
		.agent_id
		.unwrap_or_else(|| fingerprint::agent_id_for(&candidate.team_id, &candidate.fingerprint))
}

/// Applies one match decision. `existing` is the current state of [`target_agent_id`], if any.
pub fn merge(
	candidate: &CandidateMember,
	result: &MatchResult,
	existing: Option<&MasterAgent>,
	policy: &MergePolicy,
	now: OffsetDateTime,
) -> MergeOutcome {
	let Some(master) = existing else {
		let agent = MasterAgent {
			agent_id: target_agent_id(candidate, result),
			team_id: candidate.team_id.clone(),
			full_name: (!candidate.display_name.is_empty()).then(|| candidate.display_name.clone()),
			emails: candidate.emails.clone(),
			phones: candidate.phones.clone(),
			confidence_score: result.confidence,
			needs_review: policy.needs_review(result.confidence),
			last_updated: now,
		};

		return MergeOutcome { agent, op: MergeOp::Created };
	};
	let mut agent = master.clone();

	agent.emails.extend(candidate.emails.iter().cloned());
	agent.phones.extend(candidate.phones.iter().cloned());

	if !candidate.display_name.is_empty() && result.confidence > master.confidence_score {
		agent.full_name = Some(candidate.display_name.clone());
	}

	agent.confidence_score = master.confidence_score.max(result.confidence);
	agent.needs_review = policy.needs_review(agent.confidence_score);

	if agent.same_content(master) {
		return MergeOutcome { agent, op: MergeOp::Unchanged };
	}

	agent.last_updated = now;

	MergeOutcome { agent, op: MergeOp::Updated }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::matcher::MatchRule;

	#[test]
	fn created_agent_starts_in_review() {
		let candidate = CandidateMember::new("doc", "T1", "", [], ["555 123 4567"]);
		let outcome = merge(
			&candidate,
			&MatchResult::no_match(),
			None,
			&MergePolicy::default(),
			OffsetDateTime::UNIX_EPOCH,
		);

		assert_eq!(outcome.op, MergeOp::Created);
		assert_eq!(outcome.agent.full_name, None);
		assert_eq!(outcome.agent.confidence_score, 0);
		assert!(outcome.agent.needs_review);
		assert_eq!(
			outcome.agent.agent_id,
			fingerprint::agent_id_for("T1", &candidate.fingerprint)
		);
	}

	#[test]
	fn op_names_parse_back() {
		for op in [MergeOp::Created, MergeOp::Updated, MergeOp::Unchanged] {
			assert_eq!(MergeOp::parse(op.as_str()), Some(op));
		}
	}

	#[test]
	fn equal_confidence_keeps_name() {
		let candidate = CandidateMember::new("doc", "T1", "J. Doe", ["jane@x.com"], []);
		let master = MasterAgent {
			agent_id: Uuid::from_u128(7),
			team_id: "T1".to_string(),
			full_name: Some("Jane Doe".to_string()),
			emails: candidate.emails.clone(),
			phones: Default::default(),
			confidence_score: 100,
			needs_review: false,
			last_updated: OffsetDateTime::UNIX_EPOCH,
		};
		let result =
			MatchResult { agent_id: Some(master.agent_id), confidence: 100, rule: MatchRule::Email };
		let outcome =
			merge(&candidate, &result, Some(&master), &MergePolicy::default(), OffsetDateTime::now_utc());

		assert_eq!(outcome.op, MergeOp::Unchanged);
		assert_eq!(outcome.agent.full_name.as_deref(), Some("Jane Doe"));
		assert_eq!(outcome.agent.last_updated, OffsetDateTime::UNIX_EPOCH);
	}
}
