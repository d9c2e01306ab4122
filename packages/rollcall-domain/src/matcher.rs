//! Rule-ordered matching of a candidate against a team's master agents.
//!
//! Rules are tried in priority order and the first rule with at least one qualifying agent wins.
//! Agents from other teams never qualify.

use rollcall_config::{EXACT_NAME_CONFIDENCE, Matching};
use uuid::Uuid;

use crate::{
	member::{CandidateMember, MasterAgent},
	normalize,
	similarity::NameSimilarity,
};

const EMAIL_CONFIDENCE: u8 = 100;
const PHONE_CONFIDENCE: u8 = 90;

type RulePredicate = fn(&CandidateMember, &MasterAgent, &MatchPolicy) -> bool;

const RULES: [(MatchRule, RulePredicate); 4] = [
	(MatchRule::Email, email_matches),
	(MatchRule::Phone, phone_matches),
	(MatchRule::ExactName, exact_name_matches),
	(MatchRule::FuzzyName, fuzzy_name_matches),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchRule {
	Email,
	Phone,
	ExactName,
	FuzzyName,
	NoMatch,
}
impl MatchRule {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Email => "email",
			Self::Phone => "phone",
			Self::ExactName => "exact_name",
			Self::FuzzyName => "fuzzy_name",
			Self::NoMatch => "no_match",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"email" => Some(Self::Email),
			"phone" => Some(Self::Phone),
			"exact_name" => Some(Self::ExactName),
			"fuzzy_name" => Some(Self::FuzzyName),
			"no_match" => Some(Self::NoMatch),
			_ => None,
		}
	}

	pub fn confidence(self, policy: &MatchPolicy) -> u8 {
		match self {
			Self::Email => EMAIL_CONFIDENCE,
			Self::Phone => PHONE_CONFIDENCE,
			Self::ExactName => EXACT_NAME_CONFIDENCE,
			Self::FuzzyName => policy.fuzzy_confidence,
			Self::NoMatch => 0,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
	pub agent_id: Option<Uuid>,
	pub confidence: u8,
	pub rule: MatchRule,
}
impl MatchResult {
	pub fn no_match() -> Self {
		Self { agent_id: None, confidence: 0, rule: MatchRule::NoMatch }
	}

	pub fn is_match(&self) -> bool {
		self.agent_id.is_some()
	}
}

#[derive(Clone, Debug)]
pub struct MatchPolicy {
	pub fuzzy_threshold: f64,
	pub fuzzy_confidence: u8,
	pub similarity: NameSimilarity,
}
impl MatchPolicy {
	/// Expects a validated config; an unknown similarity name falls back to the default measure.
	pub fn from_config(cfg: &Matching) -> Self {
		Self {
			fuzzy_threshold: cfg.fuzzy_threshold,
			fuzzy_confidence: cfg.fuzzy_confidence,
			similarity: NameSimilarity::parse(&cfg.name_similarity).unwrap_or_default(),
		}
	}
}
impl Default for MatchPolicy {
	fn default() -> Self {
		Self::from_config(&Matching::default())
	}
}

/// Finds the agent a candidate belongs to. `pool` may contain agents of any team.
///
/// Ties within the winning rule go to the agent with the highest confidence, then to the
/// smallest agent id.
pub fn match_candidate(
	candidate: &CandidateMember,
	pool: &[MasterAgent],
	policy: &MatchPolicy,
) -> MatchResult {
	if candidate.is_empty() {
		return MatchResult::no_match();
	}

	for (rule, predicate) in RULES {
		let winner = pool
			.iter()
			.filter(|agent| agent.team_id == candidate.team_id)
			.filter(|agent| predicate(candidate, agent, policy))
			.min_by(|a, b| {
				b.confidence_score.cmp(&a.confidence_score).then_with(|| a.agent_id.cmp(&b.agent_id))
			});

		if let Some(agent) = winner {
			return MatchResult {
				agent_id: Some(agent.agent_id),
				confidence: rule.confidence(policy),
				rule,
			};
		}
	}

	MatchResult::no_match()
}

/// Like [`match_candidate`], but replays the decision recorded when this candidate was last
/// merged. A candidate's own merged contacts would otherwise count as fresh evidence on a
/// re-run and raise the confidence it earned the first time.
///
/// The recorded decision is dropped when its agent is no longer in the team's pool.
pub fn resolve(
	candidate: &CandidateMember,
	pool: &[MasterAgent],
	previous: Option<&MatchResult>,
	policy: &MatchPolicy,
) -> MatchResult {
	match previous {
		Some(result) if result.agent_id.is_none() => *result,
		Some(result)
			if pool.iter().any(|agent| {
				Some(agent.agent_id) == result.agent_id && agent.team_id == candidate.team_id
			}) =>
			*result,
		_ => match_candidate(candidate, pool, policy),
	}
}

/// Whether `rule` alone would pair the candidate with `agent`. Team scoping is not checked here.
pub fn rule_matches(
	rule: MatchRule,
	candidate: &CandidateMember,
	agent: &MasterAgent,
	policy: &MatchPolicy,
) -> bool {
	RULES
		.iter()
		.find(|(known, _)| *known == rule)
		.is_some_and(|(_, predicate)| predicate(candidate, agent, policy))
}

fn email_matches(candidate: &CandidateMember, agent: &MasterAgent, _: &MatchPolicy) -> bool {
	!candidate.emails.is_disjoint(&agent.emails)
}

fn phone_matches(candidate: &CandidateMember, agent: &MasterAgent, _: &MatchPolicy) -> bool {
	!candidate.phones.is_disjoint(&agent.phones)
}

fn exact_name_matches(candidate: &CandidateMember, agent: &MasterAgent, _: &MatchPolicy) -> bool {
	match comparable_names(candidate, agent) {
		Some((left, right)) => left == right,
		None => false,
	}
}

fn fuzzy_name_matches(candidate: &CandidateMember, agent: &MasterAgent, policy: &MatchPolicy) -> bool {
	match comparable_names(candidate, agent) {
		Some((left, right)) => policy.similarity.score(&left, &right) > policy.fuzzy_threshold,
		None => false,
	}
}

// Stored names may predate the current normalization, so both sides are normalized again.
fn comparable_names(candidate: &CandidateMember, agent: &MasterAgent) -> Option<(String, String)> {
	let left = normalize::normalize_name(&candidate.display_name).to_lowercase();
	let right = normalize::normalize_name(agent.full_name.as_deref()?).to_lowercase();

	if left.is_empty() || right.is_empty() {
		return None;
	}

	Some((left, right))
}
