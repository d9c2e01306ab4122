use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
	AgentStats, BoxFuture, CandidateCounts, CandidateStore, CommitOutcome, Error, MasterStore,
	MergeCommit, MergeReport, Result, RunLog, RunStatus, StoredAgent, StoredCandidate, store,
};
use rollcall_domain::{CandidateMember, MasterAgent, MergeOp, RawDocument};
use rollcall_storage::{
	agents, candidates,
	db::Db,
	documents,
	models::{MergeRunRow, RawDocumentRow},
	runs,
};

/// Postgres-backed stores. Each agent upsert runs in its own transaction.
#[derive(Clone)]
pub struct PgStore {
	pool: PgPool,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { pool: db.pool }
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	async fn upsert_agent_tx(&self, commit: &MergeCommit) -> Result<CommitOutcome> {
		let agent = &commit.outcome.agent;
		let mut tx = self.pool.begin().await?;
		// Claiming the candidate first serializes concurrent writers on its row.
		let claimed = candidates::mark_candidate_processed(
			&mut *tx,
			commit.candidate_id,
			agent.agent_id,
			commit.result.rule.as_str(),
			i16::from(commit.result.confidence),
			commit.ts,
		)
		.await?;

		if !claimed {
			tx.rollback().await?;

			return Ok(CommitOutcome::AlreadyMerged);
		}

		let version = match (commit.outcome.op, commit.expected_version) {
			// Agents only grow, so an unchanged verdict holds against any later version.
			(MergeOp::Unchanged, Some(version)) => version,
			(MergeOp::Unchanged, None) =>
				return Err(Error::InvalidRequest {
					message: format!("Unchanged merge without a stored agent; agent_id={}.", agent.agent_id),
				}),
			(_, None) => agents::insert_agent(&mut *tx, &store::agent_row(agent, 1)).await?,
			(_, Some(expected)) =>
				agents::update_agent_guarded(&mut *tx, &store::agent_row(agent, expected), expected)
					.await?,
		};

		runs::insert_merge_decision(&mut *tx, &store::decision_row(commit)).await?;

		tx.commit().await?;

		Ok(CommitOutcome::Applied(version))
	}
}

impl CandidateStore for PgStore {
	fn insert_document<'a>(
		&'a self,
		doc: &'a RawDocument,
		team_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let row = RawDocumentRow {
				document_id: doc.document_id.clone(),
				team_id: team_id.map(str::to_string),
				payload: doc.payload.clone(),
				ingested_at: OffsetDateTime::now_utc(),
			};

			Ok(documents::insert_raw_document(&self.pool, &row).await?)
		})
	}

	fn insert_candidate<'a>(&'a self, candidate: &'a CandidateMember) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let row = store::candidate_row(candidate, OffsetDateTime::now_utc());

			Ok(candidates::insert_candidate(&self.pool, &row).await?)
		})
	}

	fn pending_candidates(&self, limit: u32) -> BoxFuture<'_, Result<Vec<StoredCandidate>>> {
		Box::pin(async move {
			let rows = candidates::list_pending_candidates(&self.pool, i64::from(limit)).await?;

			rows.into_iter().map(store::stored_candidate).collect()
		})
	}

	fn reset_processed(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(candidates::reset_processed(&self.pool).await?) })
	}

	fn candidate_counts(&self) -> BoxFuture<'_, Result<CandidateCounts>> {
		Box::pin(async move {
			let counts = candidates::candidate_counts(&self.pool).await?;

			Ok(CandidateCounts {
				candidates: store::count(counts.candidates),
				pending: store::count(counts.pending),
			})
		})
	}
}

impl MasterStore for PgStore {
	fn fetch_team_agents<'a>(&'a self, team_id: &'a str) -> BoxFuture<'a, Result<Vec<StoredAgent>>> {
		Box::pin(async move {
			let rows = agents::list_team_agents(&self.pool, team_id).await?;

			rows.into_iter().map(store::stored_agent).collect()
		})
	}

	fn upsert_agent<'a>(&'a self, commit: &'a MergeCommit) -> BoxFuture<'a, Result<CommitOutcome>> {
		Box::pin(self.upsert_agent_tx(commit))
	}

	fn seed_agent<'a>(&'a self, agent: &'a MasterAgent) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			Ok(agents::replace_agent(&self.pool, &store::agent_row(agent, 1)).await?)
		})
	}

	fn agent_stats(&self) -> BoxFuture<'_, Result<AgentStats>> {
		Box::pin(async move {
			let stats = agents::agent_stats(&self.pool).await?;

			Ok(AgentStats {
				agents: store::count(stats.agents),
				needs_review: store::count(stats.needs_review),
				avg_confidence: stats.avg_confidence,
				min_confidence: stats.min_confidence.and_then(|score| u8::try_from(score).ok()),
				max_confidence: stats.max_confidence.and_then(|score| u8::try_from(score).ok()),
				teams: store::count(stats.teams),
			})
		})
	}
}

impl RunLog for PgStore {
	fn record_run<'a>(&'a self, report: &'a MergeReport) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = MergeRunRow {
				run_id: report.run_id,
				started_at: report.started_at,
				finished_at: report.finished_at,
				processed_count: signed(report.processed),
				created_count: signed(report.created),
				updated_count: signed(report.updated),
				unchanged_count: signed(report.unchanged),
				status: report.status.as_str().to_string(),
				error_message: report.error.clone(),
			};

			Ok(runs::insert_merge_run(&self.pool, &row).await?)
		})
	}

	fn latest_run(&self) -> BoxFuture<'_, Result<Option<MergeReport>>> {
		Box::pin(async move {
			let Some(row) = runs::latest_merge_run(&self.pool).await? else {
				return Ok(None);
			};
			let status = RunStatus::parse(&row.status).ok_or_else(|| Error::Storage {
				message: format!("Merge run {} has unknown status {:?}.", row.run_id, row.status),
			})?;

			Ok(Some(MergeReport {
				run_id: row.run_id,
				started_at: row.started_at,
				finished_at: row.finished_at,
				processed: store::count(row.processed_count),
				created: store::count(row.created_count),
				updated: store::count(row.updated_count),
				unchanged: store::count(row.unchanged_count),
				status,
				error: row.error_message,
			}))
		})
	}
}

fn signed(value: u64) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}
