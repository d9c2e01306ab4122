use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use rollcall_domain::{
	CandidateMember, MasterAgent, MatchPolicy, MatchResult, MatchRule, MergeOp, MergePolicy,
	NameSimilarity,
	matcher::{self, match_candidate},
	merge,
};

fn agent(id: u128, team: &str, name: Option<&str>, emails: &[&str], phones: &[&str]) -> MasterAgent {
	MasterAgent {
		agent_id: Uuid::from_u128(id),
		team_id: team.to_string(),
		full_name: name.map(str::to_string),
		emails: emails.iter().map(|value| value.to_string()).collect(),
		phones: phones.iter().map(|value| value.to_string()).collect(),
		confidence_score: 0,
		needs_review: true,
		last_updated: OffsetDateTime::UNIX_EPOCH,
	}
}

fn apply(candidate: &CandidateMember, pool: &mut Vec<MasterAgent>) -> (MatchResult, MergeOp) {
	apply_recorded(candidate, pool, &mut HashMap::new())
}

fn apply_recorded(
	candidate: &CandidateMember,
	pool: &mut Vec<MasterAgent>,
	decisions: &mut HashMap<Uuid, MatchResult>,
) -> (MatchResult, MergeOp) {
	let previous = decisions.get(&candidate.candidate_id());
	let result = matcher::resolve(candidate, pool, previous, &MatchPolicy::default());
	let target = merge::target_agent_id(candidate, &result);
	let existing = pool.iter().position(|agent| agent.agent_id == target);
	let outcome = merge::merge(
		candidate,
		&result,
		existing.map(|idx| &pool[idx]),
		&MergePolicy::default(),
		OffsetDateTime::now_utc(),
	);

	match existing {
		Some(idx) => pool[idx] = outcome.agent,
		None => pool.push(outcome.agent),
	}

	decisions.insert(candidate.candidate_id(), result);

	(result, outcome.op)
}

#[test]
fn email_match_needs_no_review() {
	let candidate = CandidateMember::new("doc", "T1", "Jane Doe", ["jane@x.com"], []);
	let mut pool = vec![agent(1, "T1", None, &["jane@x.com"], &[])];
	let (result, op) = apply(&candidate, &mut pool);

	assert_eq!(result.rule, MatchRule::Email);
	assert_eq!(result.confidence, 100);
	assert_eq!(op, MergeOp::Updated);
	assert_eq!(pool.len(), 1);
	assert_eq!(pool[0].emails.len(), 1);
	assert_eq!(pool[0].confidence_score, 100);
	assert!(!pool[0].needs_review);
	assert_eq!(pool[0].full_name.as_deref(), Some("Jane Doe"));
}

#[test]
fn phone_in_another_team_creates_agent() {
	let candidate = CandidateMember::new("doc", "T1", "", [], ["5551234567"]);
	let mut pool = vec![agent(1, "T2", Some("Jane"), &[], &["5551234567"])];
	let (result, op) = apply(&candidate, &mut pool);

	assert_eq!(result, MatchResult::no_match());
	assert_eq!(op, MergeOp::Created);
	assert_eq!(pool.len(), 2);
	assert_eq!(pool[1].team_id, "T1");
	assert_eq!(pool[1].confidence_score, 0);
	assert!(pool[1].needs_review);
	assert_eq!(pool[0].phones.len(), 1);
}

#[test]
fn fuzzy_name_match_stays_in_review() {
	let candidate = CandidateMember::new("doc", "T1", "Jon Smith", [], []);
	let mut pool = vec![agent(1, "T1", Some("John Smith"), &["john@x.com"], &[])];
	let (result, _) = apply(&candidate, &mut pool);

	assert_eq!(result.rule, MatchRule::FuzzyName);
	assert_eq!(result.confidence, 60);
	assert_eq!(pool[0].confidence_score, 60);
	assert!(pool[0].needs_review);
	// 60 beats the stored 0, so the candidate's name is taken.
	assert_eq!(pool[0].full_name.as_deref(), Some("Jon Smith"));
}

#[test]
fn fuzzy_name_does_not_override_stronger_name() {
	let candidate = CandidateMember::new("doc", "T1", "Jon Smith", [], []);
	let mut stored = agent(1, "T1", Some("John Smith"), &[], &[]);

	stored.confidence_score = 80;
	stored.needs_review = false;

	let mut pool = vec![stored];
	let (result, op) = apply(&candidate, &mut pool);

	assert_eq!(result.rule, MatchRule::FuzzyName);
	assert_eq!(op, MergeOp::Unchanged);
	assert_eq!(pool[0].full_name.as_deref(), Some("John Smith"));
	assert_eq!(pool[0].confidence_score, 80);
	assert!(!pool[0].needs_review);
}

#[test]
fn higher_confidence_evidence_clears_review() {
	let mut pool = vec![agent(1, "T1", Some("John Smith"), &["john@x.com"], &[])];
	let fuzzy = CandidateMember::new("doc-1", "T1", "Jon Smith", [], []);
	let exact = CandidateMember::new("doc-2", "T1", "John Smith", ["john@x.com"], []);

	apply(&fuzzy, &mut pool);

	assert!(pool[0].needs_review);

	apply(&exact, &mut pool);

	assert_eq!(pool.len(), 1);
	assert_eq!(pool[0].confidence_score, 100);
	assert!(!pool[0].needs_review);
	assert_eq!(pool[0].full_name.as_deref(), Some("John Smith"));
}

#[test]
fn rules_are_tried_in_priority_order() {
	let candidate = CandidateMember::new("doc", "T1", "Jane Doe", ["jane@x.com"], ["5551234567"]);
	let pool = vec![
		agent(1, "T1", Some("Jane Doe"), &[], &[]),
		agent(2, "T1", None, &[], &["5551234567"]),
		agent(3, "T1", None, &["jane@x.com"], &[]),
	];
	let policy = MatchPolicy::default();

	assert_eq!(match_candidate(&candidate, &pool, &policy).agent_id, Some(Uuid::from_u128(3)));
	assert_eq!(match_candidate(&candidate, &pool[..2], &policy).rule, MatchRule::Phone);
	assert_eq!(match_candidate(&candidate, &pool[..1], &policy).rule, MatchRule::ExactName);
}

#[test]
fn ties_prefer_confidence_then_smallest_id() {
	let candidate = CandidateMember::new("doc", "T1", "", ["shared@x.com"], []);
	let mut strong = agent(9, "T1", None, &["shared@x.com"], &[]);

	strong.confidence_score = 90;

	let pool = vec![
		agent(5, "T1", None, &["shared@x.com"], &[]),
		agent(3, "T1", None, &["shared@x.com"], &[]),
		strong,
	];
	let policy = MatchPolicy::default();

	assert_eq!(match_candidate(&candidate, &pool, &policy).agent_id, Some(Uuid::from_u128(9)));
	assert_eq!(match_candidate(&candidate, &pool[..2], &policy).agent_id, Some(Uuid::from_u128(3)));
}

#[test]
fn other_teams_never_match() {
	let candidate = CandidateMember::new("doc", "T1", "Jane Doe", ["jane@x.com"], ["5551234567"]);
	let pool = vec![agent(1, "T2", Some("Jane Doe"), &["jane@x.com"], &["5551234567"])];

	for similarity in [NameSimilarity::JaroWinkler, NameSimilarity::Trigram] {
		let policy = MatchPolicy { similarity, ..MatchPolicy::default() };

		assert!(!match_candidate(&candidate, &pool, &policy).is_match());
	}
}

#[test]
fn repeated_batch_is_idempotent() {
	let batch = vec![
		CandidateMember::new("doc-1", "T1", "Jane Doe", ["jane@x.com"], []),
		CandidateMember::new("doc-1", "T1", "Jane D.", ["jane@x.com", "jd@y.org"], ["5551234567"]),
		CandidateMember::new("doc-1", "T1", "", [], []),
		CandidateMember::new("doc-2", "T2", "Jon Smith", [], ["5550001111"]),
		CandidateMember::new("doc-2", "T2", "John Smith", [], []),
	];
	let mut pool = vec![agent(1, "T2", Some("John Smith"), &[], &[])];
	let mut decisions = HashMap::new();

	for candidate in &batch {
		apply_recorded(candidate, &mut pool, &mut decisions);
	}

	let after_first = pool.clone();

	for candidate in &batch {
		let (_, op) = apply_recorded(candidate, &mut pool, &mut decisions);

		assert_eq!(op, MergeOp::Unchanged);
	}

	assert_eq!(pool, after_first);
}

#[test]
fn merges_never_shrink_or_lower_confidence() {
	let batch = vec![
		CandidateMember::new("d", "T1", "Ann Lee", [], []),
		CandidateMember::new("d", "T1", "Anne Lee", ["ann@x.com"], []),
		CandidateMember::new("d", "T1", "Ann Lee", ["ann@x.com"], ["111"]),
		CandidateMember::new("d", "T1", "A. Lee", [], ["111", "222"]),
		CandidateMember::new("d", "T1", "", ["ann@x.com", "lee@x.com"], []),
	];
	let mut pool = vec![agent(1, "T1", Some("Ann Lee"), &[], &[])];
	let mut previous = pool[0].clone();

	for candidate in &batch {
		apply(candidate, &mut pool);

		let current = pool.iter().find(|agent| agent.agent_id == previous.agent_id).cloned();
		let current = current.expect("Agent must survive merges.");

		assert!(current.confidence_score >= previous.confidence_score);
		assert!(current.emails.is_superset(&previous.emails));
		assert!(current.phones.is_superset(&previous.phones));

		previous = current;
	}
}
