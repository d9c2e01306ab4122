use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
	Result,
	models::{MergeDecisionRow, MergeRunRow},
};

pub async fn insert_merge_run<'e, E>(executor: E, run: &MergeRunRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO merge_runs (
\trun_id,
\tstarted_at,
\tfinished_at,
\tprocessed_count,
\tcreated_count,
\tupdated_count,
\tunchanged_count,
\tstatus,
\terror_message
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
	)
	.bind(run.run_id)
	.bind(run.started_at)
	.bind(run.finished_at)
	.bind(run.processed_count)
	.bind(run.created_count)
	.bind(run.updated_count)
	.bind(run.unchanged_count)
	.bind(run.status.as_str())
	.bind(run.error_message.as_deref())
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn latest_merge_run<'e, E>(executor: E) -> Result<Option<MergeRunRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, MergeRunRow>(
		"\
SELECT
\trun_id,
\tstarted_at,
\tfinished_at,
\tprocessed_count,
\tcreated_count,
\tupdated_count,
\tunchanged_count,
\tstatus,
\terror_message
FROM merge_runs
ORDER BY started_at DESC
LIMIT 1",
	)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn insert_merge_decision<'e, E>(executor: E, decision: &MergeDecisionRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO merge_decisions (
\tdecision_id,
\trun_id,
\tcandidate_id,
\tagent_id,
\tteam_id,
\trule,
\tconfidence,
\top,
\tts
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
	)
	.bind(decision.decision_id)
	.bind(decision.run_id)
	.bind(decision.candidate_id)
	.bind(decision.agent_id)
	.bind(decision.team_id.as_str())
	.bind(decision.rule.as_str())
	.bind(decision.confidence)
	.bind(decision.op.as_str())
	.bind(decision.ts)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn list_run_decisions<'e, E>(executor: E, run_id: Uuid) -> Result<Vec<MergeDecisionRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, MergeDecisionRow>(
		"\
SELECT decision_id, run_id, candidate_id, agent_id, team_id, rule, confidence, op, ts
FROM merge_decisions
WHERE run_id = $1
ORDER BY ts, decision_id",
	)
	.bind(run_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
