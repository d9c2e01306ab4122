use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{CandidateCounts, CandidateRow},
};

/// Inserts a candidate unless its fingerprint is already known for the team. Returns whether a
/// row was written.
pub async fn insert_candidate<'e, E>(executor: E, row: &CandidateRow) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO candidate_members (
\tcandidate_id,
\tteam_id,
\tfingerprint,
\tsource_document_id,
\tdisplay_name,
\temails,
\tphones,
\tingested_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
ON CONFLICT DO NOTHING",
	)
	.bind(row.candidate_id)
	.bind(row.team_id.as_str())
	.bind(row.fingerprint.as_str())
	.bind(row.source_document_id.as_str())
	.bind(row.display_name.as_str())
	.bind(&row.emails)
	.bind(&row.phones)
	.bind(row.ingested_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Oldest unprocessed candidates first.
pub async fn list_pending_candidates<'e, E>(executor: E, limit: i64) -> Result<Vec<CandidateRow>>
where
	E: PgExecutor<'e>,
{
	if limit <= 0 {
		return Err(Error::InvalidArgument("pending candidate limit must be positive".to_string()));
	}

	let rows = sqlx::query_as::<_, CandidateRow>(
		"\
SELECT
\tcandidate_id,
\tteam_id,
\tfingerprint,
\tsource_document_id,
\tdisplay_name,
\temails,
\tphones,
\tingested_at,
\tprocessed_at,
\tmatched_agent_id,
\tmatch_rule,
\tmatch_confidence
FROM candidate_members
WHERE processed_at IS NULL
ORDER BY ingested_at, candidate_id
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Records the decision a candidate was merged with. Returns `false`, writing nothing, when the
/// candidate was already marked processed by another writer.
pub async fn mark_candidate_processed(
	executor: &mut PgConnection,
	candidate_id: Uuid,
	agent_id: Uuid,
	rule: &str,
	confidence: i16,
	processed_at: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE candidate_members
SET
\tprocessed_at = $2,
\tmatched_agent_id = $3,
\tmatch_rule = $4,
\tmatch_confidence = $5
WHERE candidate_id = $1
\tAND processed_at IS NULL",
	)
	.bind(candidate_id)
	.bind(processed_at)
	.bind(agent_id)
	.bind(rule)
	.bind(confidence)
	.execute(&mut *executor)
	.await?;

	if result.rows_affected() == 1 {
		return Ok(true);
	}

	let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM candidate_members WHERE candidate_id = $1")
		.bind(candidate_id)
		.fetch_optional(&mut *executor)
		.await?;

	match exists {
		Some(_) => Ok(false),
		None => Err(Error::NotFound { entity: "candidate", id: candidate_id }),
	}
}

/// Clears processed markers so every candidate is merged again. Recorded decisions are kept.
pub async fn reset_processed<'e, E>(executor: E) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE candidate_members
SET processed_at = NULL
WHERE processed_at IS NOT NULL",
	)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn candidate_counts<'e, E>(executor: E) -> Result<CandidateCounts>
where
	E: PgExecutor<'e>,
{
	let counts = sqlx::query_as::<_, CandidateCounts>(
		"\
SELECT
\tcount(*) AS candidates,
\tcount(*) FILTER (WHERE processed_at IS NULL) AS pending
FROM candidate_members",
	)
	.fetch_one(executor)
	.await?;

	Ok(counts)
}
