//! The merge batch: drains unprocessed candidates into the master dataset.
//!
//! Candidates are partitioned by team. Teams run concurrently, up to `merge.max_parallel_teams`
//! at a time, while candidates within a team are merged one after another against a cached copy
//! of the team's agents. Every candidate commits on its own, so stopping between candidates
//! never leaves a partial merge behind.

use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::{
	CommitOutcome, Error, MergeCommit, Result, RollcallService, StoredAgent, StoredCandidate, Stores,
};
use rollcall_domain::{
	MasterAgent, MatchPolicy, MergeOp, MergePolicy,
	matcher,
	merge::{self, MergeOutcome},
};

/// Set to stop a running batch after the candidate currently being merged.
pub type CancelFlag = Arc<AtomicBool>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Succeeded,
	Failed,
	Cancelled,
}
impl RunStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"succeeded" => Some(Self::Succeeded),
			"failed" => Some(Self::Failed),
			"cancelled" => Some(Self::Cancelled),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
	pub run_id: Uuid,
	#[serde(with = "time::serde::rfc3339")]
	pub started_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub finished_at: OffsetDateTime,
	/// Candidates committed by this run, whatever the final status.
	pub processed: u64,
	pub created: u64,
	pub updated: u64,
	pub unchanged: u64,
	pub status: RunStatus,
	pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Tally {
	processed: u64,
	created: u64,
	updated: u64,
	unchanged: u64,
	/// Candidates another writer merged before this run could.
	skipped: u64,
}
impl Tally {
	fn record(&mut self, op: MergeOp) {
		self.processed += 1;

		match op {
			MergeOp::Created => self.created += 1,
			MergeOp::Updated => self.updated += 1,
			MergeOp::Unchanged => self.unchanged += 1,
		}
	}

	fn absorb(&mut self, other: Tally) {
		self.processed += other.processed;
		self.created += other.created;
		self.updated += other.updated;
		self.unchanged += other.unchanged;
		self.skipped += other.skipped;
	}

	fn settled(&self) -> u64 {
		self.processed + self.skipped
	}
}

struct BatchContext {
	stores: Stores,
	match_policy: MatchPolicy,
	merge_policy: MergePolicy,
	max_conflict_retries: u32,
	run_id: Uuid,
	cancel: CancelFlag,
	/// Raised by the first team that hits a fatal error so the others stop early.
	abort: AtomicBool,
}
impl BatchContext {
	fn should_stop(&self) -> bool {
		self.cancel.load(Ordering::Relaxed) || self.abort.load(Ordering::Relaxed)
	}
}

struct TeamOutcome {
	tally: Tally,
	error: Option<Error>,
}

/// Cached agents for one team, paired with the versions they were read at.
struct TeamPool {
	agents: Vec<MasterAgent>,
	versions: Vec<i64>,
}
impl TeamPool {
	fn new(stored: Vec<StoredAgent>) -> Self {
		let (agents, versions) = stored.into_iter().map(|stored| (stored.agent, stored.version)).unzip();

		Self { agents, versions }
	}

	fn position(&self, agent_id: Uuid) -> Option<usize> {
		self.agents.iter().position(|agent| agent.agent_id == agent_id)
	}

	fn store(&mut self, agent: MasterAgent, version: i64) {
		match self.position(agent.agent_id) {
			Some(idx) => {
				self.agents[idx] = agent;
				self.versions[idx] = version;
			},
			None => {
				self.agents.push(agent);
				self.versions.push(version);
			},
		}
	}
}

impl RollcallService {
	/// Merges every unprocessed candidate and records one run log entry.
	///
	/// Fatal storage errors and cancellation are reported through [`MergeReport::status`];
	/// candidates committed before the stop stay committed.
	pub async fn merge_batch(&self, cancel: CancelFlag) -> MergeReport {
		let run_id = Uuid::new_v4();
		let started_at = OffsetDateTime::now_utc();
		let ctx = Arc::new(BatchContext {
			stores: self.stores.clone(),
			match_policy: MatchPolicy::from_config(&self.cfg.matching),
			merge_policy: MergePolicy::from_config(&self.cfg.matching),
			max_conflict_retries: self.cfg.merge.max_conflict_retries,
			run_id,
			cancel,
			abort: AtomicBool::new(false),
		});
		let mut tally = Tally::default();
		let mut failure = None;

		tracing::info!(
			run_id = %run_id,
			similarity = ctx.match_policy.similarity.as_str(),
			"Merge run started."
		);

		loop {
			if ctx.should_stop() {
				break;
			}

			let limit = self.cfg.merge.batch_size;
			let page = match self.stores.candidates.pending_candidates(limit).await {
				Ok(page) => page,
				Err(err) => {
					failure = Some(err);

					break;
				},
			};

			if page.is_empty() {
				break;
			}

			let page_len = page.len();
			let outcome = run_teams(ctx.clone(), partition_by_team(page), self.max_parallel_teams())
				.await;

			tally.absorb(outcome.tally);

			if let Some(err) = outcome.error {
				failure = Some(err);

				break;
			}
			// Every candidate on the page either settles or stops the run.
			if outcome.tally.settled() < page_len as u64 && !ctx.should_stop() {
				failure = Some(Error::Internal {
					message: format!(
						"Merge made no progress on {} of {page_len} pending candidates.",
						page_len as u64 - outcome.tally.settled()
					),
				});

				break;
			}
		}

		let status = if failure.is_some() {
			RunStatus::Failed
		} else if ctx.cancel.load(Ordering::Relaxed) {
			RunStatus::Cancelled
		} else {
			RunStatus::Succeeded
		};
		let report = MergeReport {
			run_id,
			started_at,
			finished_at: OffsetDateTime::now_utc(),
			processed: tally.processed,
			created: tally.created,
			updated: tally.updated,
			unchanged: tally.unchanged,
			status,
			error: failure.map(|err| err.to_string()),
		};

		match &report.error {
			Some(error) => tracing::error!(
				run_id = %run_id,
				processed = report.processed,
				error = %error,
				"Merge run failed."
			),
			None => tracing::info!(
				run_id = %run_id,
				processed = report.processed,
				created = report.created,
				updated = report.updated,
				unchanged = report.unchanged,
				status = report.status.as_str(),
				"Merge run finished."
			),
		}

		if let Err(err) = self.stores.runs.record_run(&report).await {
			tracing::error!(run_id = %run_id, error = %err, "Failed to record merge run.");
		}

		report
	}

	fn max_parallel_teams(&self) -> usize {
		usize::try_from(self.cfg.merge.max_parallel_teams).unwrap_or(1).max(1)
	}
}

fn partition_by_team(page: Vec<StoredCandidate>) -> BTreeMap<String, Vec<StoredCandidate>> {
	let mut teams: BTreeMap<String, Vec<StoredCandidate>> = BTreeMap::new();

	for stored in page {
		teams.entry(stored.candidate.team_id.clone()).or_default().push(stored);
	}

	teams
}

async fn run_teams(
	ctx: Arc<BatchContext>,
	teams: BTreeMap<String, Vec<StoredCandidate>>,
	max_parallel: usize,
) -> TeamOutcome {
	let mut tasks = JoinSet::new();
	let mut combined = TeamOutcome { tally: Tally::default(), error: None };
	let mut absorb = |joined: Result<TeamOutcome, JoinError>| {
		let outcome = joined.unwrap_or_else(|err| TeamOutcome {
			tally: Tally::default(),
			error: Some(Error::Internal { message: format!("Team merge task failed: {err}") }),
		});

		combined.tally.absorb(outcome.tally);

		if let Some(err) = outcome.error
			&& combined.error.is_none()
		{
			combined.error = Some(err);
		}
	};

	for (team_id, candidates) in teams {
		while tasks.len() >= max_parallel {
			if let Some(joined) = tasks.join_next().await {
				absorb(joined);
			}
		}

		if ctx.should_stop() {
			break;
		}

		tasks.spawn(merge_team(ctx.clone(), team_id, candidates));
	}

	while let Some(joined) = tasks.join_next().await {
		absorb(joined);
	}

	combined
}

async fn merge_team(
	ctx: Arc<BatchContext>,
	team_id: String,
	candidates: Vec<StoredCandidate>,
) -> TeamOutcome {
	let mut tally = Tally::default();
	let error = match merge_team_inner(&ctx, &team_id, &candidates, &mut tally).await {
		Ok(()) => None,
		Err(err) => {
			ctx.abort.store(true, Ordering::Relaxed);
			tracing::error!(
				team_id = %team_id,
				processed = tally.processed,
				error = %err,
				"Team merge stopped."
			);

			Some(err)
		},
	};

	TeamOutcome { tally, error }
}

async fn merge_team_inner(
	ctx: &BatchContext,
	team_id: &str,
	candidates: &[StoredCandidate],
	tally: &mut Tally,
) -> Result<()> {
	let mut pool = TeamPool::new(ctx.stores.masters.fetch_team_agents(team_id).await?);

	for stored in candidates {
		if ctx.should_stop() {
			break;
		}

		let mut attempts = 0;

		loop {
			match merge_candidate(ctx, stored, &mut pool).await {
				Ok(Some(op)) => {
					tally.record(op);

					break;
				},
				Ok(None) => {
					tally.skipped += 1;

					tracing::info!(
						team_id = %team_id,
						candidate_id = %stored.candidate_id,
						"Candidate already merged by another writer; skipping."
					);

					pool = TeamPool::new(ctx.stores.masters.fetch_team_agents(team_id).await?);

					break;
				},
				Err(err) if err.is_conflict() && attempts < ctx.max_conflict_retries => {
					attempts += 1;

					tracing::warn!(
						team_id = %team_id,
						candidate_id = %stored.candidate_id,
						attempt = attempts,
						error = %err,
						"Merge conflict; reloading team agents."
					);

					pool = TeamPool::new(ctx.stores.masters.fetch_team_agents(team_id).await?);
				},
				Err(err) => return Err(err),
			}
		}
	}

	Ok(())
}

/// Returns `None` when another writer merged the candidate first.
async fn merge_candidate(
	ctx: &BatchContext,
	stored: &StoredCandidate,
	pool: &mut TeamPool,
) -> Result<Option<MergeOp>> {
	let candidate = &stored.candidate;
	let result =
		matcher::resolve(candidate, &pool.agents, stored.previous.as_ref(), &ctx.match_policy);
	let target = merge::target_agent_id(candidate, &result);
	let existing = pool.position(target);
	let now = OffsetDateTime::now_utc();
	let outcome = merge::merge(
		candidate,
		&result,
		existing.map(|idx| &pool.agents[idx]),
		&ctx.merge_policy,
		now,
	);
	let commit = MergeCommit {
		run_id: ctx.run_id,
		candidate_id: stored.candidate_id,
		team_id: candidate.team_id.clone(),
		result,
		outcome,
		expected_version: existing.map(|idx| pool.versions[idx]),
		ts: now,
	};
	let CommitOutcome::Applied(version) = ctx.stores.masters.upsert_agent(&commit).await? else {
		return Ok(None);
	};
	let MergeOutcome { agent, op } = commit.outcome;

	tracing::debug!(
		candidate_id = %stored.candidate_id,
		agent_id = %agent.agent_id,
		rule = result.rule.as_str(),
		confidence = result.confidence,
		op = op.as_str(),
		"Candidate merged."
	);

	pool.store(agent, version);

	Ok(Some(op))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rollcall_domain::CandidateMember;

	fn stored(team: &str, name: &str) -> StoredCandidate {
		let candidate = CandidateMember::new("doc", team, name, [], []);

		StoredCandidate { candidate_id: candidate.candidate_id(), candidate, previous: None }
	}

	#[test]
	fn partition_keeps_ingestion_order_within_team() {
		let teams =
			partition_by_team(vec![stored("T2", "a"), stored("T1", "b"), stored("T2", "c")]);
		let t2 = teams["T2"].iter().map(|s| s.candidate.display_name.as_str()).collect::<Vec<_>>();

		assert_eq!(teams.len(), 2);
		assert_eq!(t2, vec!["a", "c"]);
	}

	#[test]
	fn status_names_parse_back() {
		for status in [RunStatus::Succeeded, RunStatus::Failed, RunStatus::Cancelled] {
			assert_eq!(RunStatus::parse(status.as_str()), Some(status));
		}
	}
}
