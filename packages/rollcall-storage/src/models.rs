use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct RawDocumentRow {
	pub document_id: String,
	pub team_id: Option<String>,
	pub payload: Value,
	pub ingested_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub candidate_id: Uuid,
	pub team_id: String,
	/// Lowercase hex.
	pub fingerprint: String,
	pub source_document_id: String,
	pub display_name: String,
	pub emails: Vec<String>,
	pub phones: Vec<String>,
	pub ingested_at: OffsetDateTime,
	pub processed_at: Option<OffsetDateTime>,
	pub matched_agent_id: Option<Uuid>,
	pub match_rule: Option<String>,
	pub match_confidence: Option<i16>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MasterAgentRow {
	pub agent_id: Uuid,
	pub team_id: String,
	pub full_name: Option<String>,
	pub emails: Vec<String>,
	pub phones: Vec<String>,
	pub confidence_score: i16,
	pub needs_review: bool,
	pub version: i64,
	pub created_at: OffsetDateTime,
	pub last_updated: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MergeRunRow {
	pub run_id: Uuid,
	pub started_at: OffsetDateTime,
	pub finished_at: OffsetDateTime,
	pub processed_count: i64,
	pub created_count: i64,
	pub updated_count: i64,
	pub unchanged_count: i64,
	pub status: String,
	pub error_message: Option<String>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MergeDecisionRow {
	pub decision_id: Uuid,
	pub run_id: Uuid,
	pub candidate_id: Uuid,
	pub agent_id: Uuid,
	pub team_id: String,
	pub rule: String,
	pub confidence: i16,
	pub op: String,
	pub ts: OffsetDateTime,
}

#[derive(Debug, Default, sqlx::FromRow)]
pub struct CandidateCounts {
	pub candidates: i64,
	pub pending: i64,
}

#[derive(Debug, Default, sqlx::FromRow)]
pub struct AgentStats {
	pub agents: i64,
	pub needs_review: i64,
	pub avg_confidence: Option<f64>,
	pub min_confidence: Option<i16>,
	pub max_confidence: Option<i16>,
	pub teams: i64,
}
