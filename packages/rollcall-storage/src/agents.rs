use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{AgentStats, MasterAgentRow},
};

const AGENT_COLUMNS: &str = "\
agent_id, team_id, full_name, emails, phones, confidence_score, needs_review, version, \
created_at, last_updated";

pub async fn list_team_agents<'e, E>(executor: E, team_id: &str) -> Result<Vec<MasterAgentRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {AGENT_COLUMNS} FROM master_agents WHERE team_id = $1 ORDER BY agent_id");
	let rows =
		sqlx::query_as::<_, MasterAgentRow>(&sql).bind(team_id).fetch_all(executor).await?;

	Ok(rows)
}

pub async fn get_agent<'e, E>(executor: E, agent_id: Uuid) -> Result<Option<MasterAgentRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {AGENT_COLUMNS} FROM master_agents WHERE agent_id = $1");
	let row =
		sqlx::query_as::<_, MasterAgentRow>(&sql).bind(agent_id).fetch_optional(executor).await?;

	Ok(row)
}

/// Inserts a new agent at version 1. An existing row with the same id is a conflict: another
/// writer created it after the caller's read.
pub async fn insert_agent<'e, E>(executor: E, agent: &MasterAgentRow) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let version = sqlx::query_scalar::<_, i64>(
		"\
INSERT INTO master_agents (
\tagent_id,
\tteam_id,
\tfull_name,
\temails,
\tphones,
\tconfidence_score,
\tneeds_review,
\tversion,
\tcreated_at,
\tlast_updated
)
VALUES ($1,$2,$3,$4,$5,$6,$7,1,$8,$9)
ON CONFLICT (agent_id) DO NOTHING
RETURNING version",
	)
	.bind(agent.agent_id)
	.bind(agent.team_id.as_str())
	.bind(agent.full_name.as_deref())
	.bind(&agent.emails)
	.bind(&agent.phones)
	.bind(agent.confidence_score)
	.bind(agent.needs_review)
	.bind(agent.created_at)
	.bind(agent.last_updated)
	.fetch_optional(executor)
	.await?;

	version.ok_or_else(|| {
		Error::Conflict {
			entity: "master agent",
			id: agent.agent_id,
			detail: "already exists".to_string(),
		}
	})
}

/// Creates the agent, or overwrites every field of an existing one and bumps its version. Used
/// to load an existing master dataset. Returns the version written.
pub async fn replace_agent<'e, E>(executor: E, agent: &MasterAgentRow) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let version = sqlx::query_scalar::<_, i64>(
		"\
INSERT INTO master_agents (
\tagent_id,
\tteam_id,
\tfull_name,
\temails,
\tphones,
\tconfidence_score,
\tneeds_review,
\tversion,
\tcreated_at,
\tlast_updated
)
VALUES ($1,$2,$3,$4,$5,$6,$7,1,$8,$9)
ON CONFLICT (agent_id) DO UPDATE
SET
\tteam_id = EXCLUDED.team_id,
\tfull_name = EXCLUDED.full_name,
\temails = EXCLUDED.emails,
\tphones = EXCLUDED.phones,
\tconfidence_score = EXCLUDED.confidence_score,
\tneeds_review = EXCLUDED.needs_review,
\tlast_updated = EXCLUDED.last_updated,
\tversion = master_agents.version + 1
RETURNING version",
	)
	.bind(agent.agent_id)
	.bind(agent.team_id.as_str())
	.bind(agent.full_name.as_deref())
	.bind(&agent.emails)
	.bind(&agent.phones)
	.bind(agent.confidence_score)
	.bind(agent.needs_review)
	.bind(agent.created_at)
	.bind(agent.last_updated)
	.fetch_one(executor)
	.await?;

	Ok(version)
}

/// Overwrites an agent only if it is still at `expected_version`, returning the new version.
pub async fn update_agent_guarded(
	executor: &mut PgConnection,
	agent: &MasterAgentRow,
	expected_version: i64,
) -> Result<i64> {
	let version = sqlx::query_scalar::<_, i64>(
		"\
UPDATE master_agents
SET
\tfull_name = $3,
\temails = $4,
\tphones = $5,
\tconfidence_score = $6,
\tneeds_review = $7,
\tlast_updated = $8,
\tversion = version + 1
WHERE agent_id = $1
\tAND version = $2
RETURNING version",
	)
	.bind(agent.agent_id)
	.bind(expected_version)
	.bind(agent.full_name.as_deref())
	.bind(&agent.emails)
	.bind(&agent.phones)
	.bind(agent.confidence_score)
	.bind(agent.needs_review)
	.bind(agent.last_updated)
	.fetch_optional(&mut *executor)
	.await?;

	if let Some(version) = version {
		return Ok(version);
	}

	let Some(current) = get_agent(&mut *executor, agent.agent_id).await? else {
		return Err(Error::NotFound { entity: "master agent", id: agent.agent_id });
	};

	Err(Error::Conflict {
		entity: "master agent",
		id: agent.agent_id,
		detail: format!("expected version {expected_version}, found {}", current.version),
	})
}

pub async fn agent_stats<'e, E>(executor: E) -> Result<AgentStats>
where
	E: PgExecutor<'e>,
{
	let stats = sqlx::query_as::<_, AgentStats>(
		"\
SELECT
\tcount(*) AS agents,
\tcount(*) FILTER (WHERE needs_review) AS needs_review,
\tavg(confidence_score)::float8 AS avg_confidence,
\tmin(confidence_score) AS min_confidence,
\tmax(confidence_score) AS max_confidence,
\tcount(DISTINCT team_id) AS teams
FROM master_agents",
	)
	.fetch_one(executor)
	.await?;

	Ok(stats)
}
