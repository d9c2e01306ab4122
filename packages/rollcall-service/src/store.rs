//! Records exchanged with the stores, and their Postgres row forms.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};
use rollcall_domain::{
	CandidateMember, Fingerprint, MasterAgent, MatchResult, MatchRule, MergeOutcome,
};
use rollcall_storage::models::{CandidateRow, MasterAgentRow, MergeDecisionRow};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCandidate {
	pub candidate_id: Uuid,
	pub candidate: CandidateMember,
	/// Decision from the last time this candidate was merged, if any.
	pub previous: Option<MatchResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredAgent {
	pub agent: MasterAgent,
	pub version: i64,
}

/// Everything one candidate merge writes.
#[derive(Clone, Debug)]
pub struct MergeCommit {
	pub run_id: Uuid,
	pub candidate_id: Uuid,
	pub team_id: String,
	pub result: MatchResult,
	pub outcome: MergeOutcome,
	/// `None` when the agent does not exist yet.
	pub expected_version: Option<i64>,
	pub ts: OffsetDateTime,
}

/// What [`crate::MasterStore::upsert_agent`] did with a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
	/// The commit landed. Carries the agent's version afterwards.
	Applied(i64),
	/// Another writer merged the candidate first. Nothing was written.
	AlreadyMerged,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCounts {
	pub candidates: u64,
	pub pending: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
	pub agents: u64,
	pub needs_review: u64,
	pub avg_confidence: Option<f64>,
	pub min_confidence: Option<u8>,
	pub max_confidence: Option<u8>,
	/// Distinct teams holding at least one agent.
	pub teams: u64,
}

pub(crate) fn candidate_row(candidate: &CandidateMember, ingested_at: OffsetDateTime) -> CandidateRow {
	CandidateRow {
		candidate_id: candidate.candidate_id(),
		team_id: candidate.team_id.clone(),
		fingerprint: candidate.fingerprint.to_hex(),
		source_document_id: candidate.source_document_id.clone(),
		display_name: candidate.display_name.clone(),
		emails: candidate.emails.iter().cloned().collect(),
		phones: candidate.phones.iter().cloned().collect(),
		ingested_at,
		processed_at: None,
		matched_agent_id: None,
		match_rule: None,
		match_confidence: None,
	}
}

pub(crate) fn stored_candidate(row: CandidateRow) -> Result<StoredCandidate> {
	let fingerprint = Fingerprint::from_hex(&row.fingerprint).ok_or_else(|| Error::Storage {
		message: format!("Candidate {} has a malformed fingerprint.", row.candidate_id),
	})?;
	let previous = recorded_decision(&row);
	let candidate = CandidateMember {
		source_document_id: row.source_document_id,
		team_id: row.team_id,
		display_name: row.display_name,
		emails: row.emails.into_iter().collect(),
		phones: row.phones.into_iter().collect(),
		fingerprint,
	};

	Ok(StoredCandidate { candidate_id: row.candidate_id, candidate, previous })
}

pub(crate) fn agent_row(agent: &MasterAgent, version: i64) -> MasterAgentRow {
	MasterAgentRow {
		agent_id: agent.agent_id,
		team_id: agent.team_id.clone(),
		full_name: agent.full_name.clone(),
		emails: agent.emails.iter().cloned().collect(),
		phones: agent.phones.iter().cloned().collect(),
		confidence_score: i16::from(agent.confidence_score),
		needs_review: agent.needs_review,
		version,
		created_at: agent.last_updated,
		last_updated: agent.last_updated,
	}
}

pub(crate) fn stored_agent(row: MasterAgentRow) -> Result<StoredAgent> {
	let confidence_score = u8::try_from(row.confidence_score)
		.ok()
		.filter(|score| *score <= 100)
		.ok_or_else(|| Error::Storage {
			message: format!(
				"Agent {} has an out-of-range confidence score {}.",
				row.agent_id, row.confidence_score
			),
		})?;
	let agent = MasterAgent {
		agent_id: row.agent_id,
		team_id: row.team_id,
		full_name: row.full_name,
		emails: row.emails.into_iter().collect(),
		phones: row.phones.into_iter().collect(),
		confidence_score,
		needs_review: row.needs_review,
		last_updated: row.last_updated,
	};

	Ok(StoredAgent { agent, version: row.version })
}

pub(crate) fn decision_row(commit: &MergeCommit) -> MergeDecisionRow {
	MergeDecisionRow {
		decision_id: Uuid::new_v4(),
		run_id: commit.run_id,
		candidate_id: commit.candidate_id,
		agent_id: commit.outcome.agent.agent_id,
		team_id: commit.team_id.clone(),
		rule: commit.result.rule.as_str().to_string(),
		confidence: i16::from(commit.result.confidence),
		op: commit.outcome.op.as_str().to_string(),
		ts: commit.ts,
	}
}

// A no-match decision replays as no-match, which targets the same derived agent.
fn recorded_decision(row: &CandidateRow) -> Option<MatchResult> {
	let rule = MatchRule::parse(row.match_rule.as_deref()?)?;

	if rule == MatchRule::NoMatch {
		return Some(MatchResult::no_match());
	}

	Some(MatchResult {
		agent_id: Some(row.matched_agent_id?),
		confidence: u8::try_from(row.match_confidence?).ok()?,
		rule,
	})
}

pub(crate) fn count(value: i64) -> u64 {
	u64::try_from(value).unwrap_or_default()
}
