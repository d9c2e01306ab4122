//! In-process stores with the same contract as the Postgres ones.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{Mutex, MutexGuard},
};

use serde_json::Value;
use uuid::Uuid;

use crate::{
	AgentStats, BoxFuture, CandidateCounts, CandidateStore, CommitOutcome, Error, MasterStore,
	MergeCommit, MergeReport, Result, RunLog, StoredAgent, StoredCandidate,
};
use rollcall_domain::{CandidateMember, Fingerprint, MasterAgent, MatchResult, MergeOp, RawDocument};

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
	documents: BTreeMap<String, Value>,
	fingerprints: HashSet<(String, Fingerprint)>,
	/// Ingestion order.
	candidates: Vec<CandidateEntry>,
	agents: HashMap<Uuid, StoredAgent>,
	decisions: Vec<DecisionEntry>,
	runs: Vec<MergeReport>,
}

struct CandidateEntry {
	candidate_id: Uuid,
	candidate: CandidateMember,
	processed: bool,
	previous: Option<MatchResult>,
}

/// One recorded merge decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionEntry {
	pub run_id: Uuid,
	pub candidate_id: Uuid,
	pub agent_id: Uuid,
	pub result: MatchResult,
	pub op: MergeOp,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Agents ordered by id.
	pub fn agents(&self) -> Vec<MasterAgent> {
		let state = self.lock();
		let mut agents =
			state.agents.values().map(|stored| stored.agent.clone()).collect::<Vec<_>>();

		agents.sort_by_key(|agent| agent.agent_id);

		agents
	}

	pub fn agent(&self, agent_id: Uuid) -> Option<StoredAgent> {
		self.lock().agents.get(&agent_id).cloned()
	}

	pub fn candidates(&self) -> Vec<CandidateMember> {
		self.lock().candidates.iter().map(|entry| entry.candidate.clone()).collect()
	}

	pub fn document_count(&self) -> usize {
		self.lock().documents.len()
	}

	pub fn decisions(&self) -> Vec<DecisionEntry> {
		self.lock().decisions.clone()
	}

	pub fn runs(&self) -> Vec<MergeReport> {
		self.lock().runs.clone()
	}

	fn lock(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl MemoryState {
	fn apply_commit(&mut self, commit: &MergeCommit) -> Result<CommitOutcome> {
		let agent = &commit.outcome.agent;
		let Some(entry_idx) =
			self.candidates.iter().position(|entry| entry.candidate_id == commit.candidate_id)
		else {
			return Err(Error::NotFound {
				message: format!("candidate not found; candidate_id={}", commit.candidate_id),
			});
		};

		if self.candidates[entry_idx].processed {
			return Ok(CommitOutcome::AlreadyMerged);
		}

		let current = self.agents.get(&agent.agent_id).map(|stored| stored.version);
		let version = match (commit.outcome.op, commit.expected_version, current) {
			(MergeOp::Unchanged, Some(expected), Some(_)) => expected,
			(MergeOp::Unchanged, _, _) =>
				return Err(Error::InvalidRequest {
					message: format!(
						"Unchanged merge without a stored agent; agent_id={}.",
						agent.agent_id
					),
				}),
			(_, None, None) => 1,
			(_, Some(expected), Some(current)) if expected == current => current + 1,
			(_, None, Some(_)) =>
				return Err(Error::StorageConflict {
					message: format!("master agent already exists; agent_id={}", agent.agent_id),
				}),
			(_, Some(expected), Some(current)) =>
				return Err(Error::StorageConflict {
					message: format!(
						"master agent update conflict; agent_id={} expected_version={expected} current_version={current}",
						agent.agent_id
					),
				}),
			(_, Some(_), None) =>
				return Err(Error::NotFound {
					message: format!("master agent not found; agent_id={}", agent.agent_id),
				}),
		};

		if commit.outcome.op != MergeOp::Unchanged {
			self.agents.insert(agent.agent_id, StoredAgent { agent: agent.clone(), version });
		}

		let entry = &mut self.candidates[entry_idx];

		entry.processed = true;
		entry.previous = Some(commit.result);

		self.decisions.push(DecisionEntry {
			run_id: commit.run_id,
			candidate_id: commit.candidate_id,
			agent_id: agent.agent_id,
			result: commit.result,
			op: commit.outcome.op,
		});

		Ok(CommitOutcome::Applied(version))
	}
}

impl CandidateStore for MemoryStore {
	fn insert_document<'a>(
		&'a self,
		doc: &'a RawDocument,
		_team_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.lock();

			if state.documents.contains_key(&doc.document_id) {
				return Ok(false);
			}

			state.documents.insert(doc.document_id.clone(), doc.payload.clone());

			Ok(true)
		})
	}

	fn insert_candidate<'a>(&'a self, candidate: &'a CandidateMember) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.lock();

			if !state.fingerprints.insert((candidate.team_id.clone(), candidate.fingerprint)) {
				return Ok(false);
			}

			state.candidates.push(CandidateEntry {
				candidate_id: candidate.candidate_id(),
				candidate: candidate.clone(),
				processed: false,
				previous: None,
			});

			Ok(true)
		})
	}

	fn pending_candidates(&self, limit: u32) -> BoxFuture<'_, Result<Vec<StoredCandidate>>> {
		Box::pin(async move {
			let state = self.lock();

			Ok(state
				.candidates
				.iter()
				.filter(|entry| !entry.processed)
				.take(limit as usize)
				.map(|entry| StoredCandidate {
					candidate_id: entry.candidate_id,
					candidate: entry.candidate.clone(),
					previous: entry.previous,
				})
				.collect())
		})
	}

	fn reset_processed(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move {
			let mut state = self.lock();
			let mut reset = 0;

			for entry in state.candidates.iter_mut().filter(|entry| entry.processed) {
				entry.processed = false;
				reset += 1;
			}

			Ok(reset)
		})
	}

	fn candidate_counts(&self) -> BoxFuture<'_, Result<CandidateCounts>> {
		Box::pin(async move {
			let state = self.lock();
			let pending = state.candidates.iter().filter(|entry| !entry.processed).count();

			Ok(CandidateCounts {
				candidates: state.candidates.len() as u64,
				pending: pending as u64,
			})
		})
	}
}

impl MasterStore for MemoryStore {
	fn fetch_team_agents<'a>(&'a self, team_id: &'a str) -> BoxFuture<'a, Result<Vec<StoredAgent>>> {
		Box::pin(async move {
			let state = self.lock();
			let mut agents = state
				.agents
				.values()
				.filter(|stored| stored.agent.team_id == team_id)
				.cloned()
				.collect::<Vec<_>>();

			agents.sort_by_key(|stored| stored.agent.agent_id);

			Ok(agents)
		})
	}

	fn upsert_agent<'a>(&'a self, commit: &'a MergeCommit) -> BoxFuture<'a, Result<CommitOutcome>> {
		Box::pin(async move { self.lock().apply_commit(commit) })
	}

	fn seed_agent<'a>(&'a self, agent: &'a MasterAgent) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let mut state = self.lock();
			let version =
				state.agents.get(&agent.agent_id).map_or(1, |stored| stored.version + 1);

			state.agents.insert(agent.agent_id, StoredAgent { agent: agent.clone(), version });

			Ok(version)
		})
	}

	fn agent_stats(&self) -> BoxFuture<'_, Result<AgentStats>> {
		Box::pin(async move {
			let state = self.lock();
			let agents = state.agents.len() as u64;
			let needs_review =
				state.agents.values().filter(|stored| stored.agent.needs_review).count() as u64;
			let scores =
				state.agents.values().map(|stored| stored.agent.confidence_score).collect::<Vec<_>>();
			let total: u64 = scores.iter().copied().map(u64::from).sum();
			let avg_confidence = (agents > 0).then(|| total as f64 / agents as f64);
			let teams = state
				.agents
				.values()
				.map(|stored| stored.agent.team_id.as_str())
				.collect::<HashSet<_>>()
				.len() as u64;

			Ok(AgentStats {
				agents,
				needs_review,
				avg_confidence,
				min_confidence: scores.iter().copied().min(),
				max_confidence: scores.iter().copied().max(),
				teams,
			})
		})
	}
}

impl RunLog for MemoryStore {
	fn record_run<'a>(&'a self, report: &'a MergeReport) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.lock().runs.push(report.clone());

			Ok(())
		})
	}

	fn latest_run(&self) -> BoxFuture<'_, Result<Option<MergeReport>>> {
		Box::pin(async move { Ok(self.lock().runs.last().cloned()) })
	}
}
