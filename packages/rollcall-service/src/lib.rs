pub mod ingest;
pub mod memory;
pub mod merge_batch;
pub mod pg;
pub mod seed;
pub mod stats;
pub mod store;

mod error;

pub use error::{Error, Result};
pub use ingest::{IngestReport, RejectedMember};
pub use memory::MemoryStore;
pub use merge_batch::{CancelFlag, MergeReport, RunStatus};
pub use pg::PgStore;
pub use seed::SeedReport;
pub use stats::PipelineStats;
pub use store::{
	AgentStats, CandidateCounts, CommitOutcome, MergeCommit, StoredAgent, StoredCandidate,
};

use std::{future::Future, pin::Pin, sync::Arc};

use rollcall_config::Config;
use rollcall_domain::{CandidateMember, MasterAgent, RawDocument};
use rollcall_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Append-only store of raw documents and the candidates extracted from them.
pub trait CandidateStore
where
	Self: Send + Sync,
{
	/// Returns `false` when the document id was already stored.
	fn insert_document<'a>(
		&'a self,
		doc: &'a RawDocument,
		team_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>>;

	/// Returns `false` when the team already holds a candidate with the same fingerprint.
	fn insert_candidate<'a>(&'a self, candidate: &'a CandidateMember) -> BoxFuture<'a, Result<bool>>;

	/// Unprocessed candidates in ingestion order.
	fn pending_candidates(&self, limit: u32) -> BoxFuture<'_, Result<Vec<StoredCandidate>>>;

	fn reset_processed(&self) -> BoxFuture<'_, Result<u64>>;

	fn candidate_counts(&self) -> BoxFuture<'_, Result<CandidateCounts>>;
}

/// The master agent dataset. Merges write through [`MasterStore::upsert_agent`]; loading an
/// existing dataset writes through [`MasterStore::seed_agent`].
pub trait MasterStore
where
	Self: Send + Sync,
{
	fn fetch_team_agents<'a>(&'a self, team_id: &'a str) -> BoxFuture<'a, Result<Vec<StoredAgent>>>;

	/// Applies the agent write, marks the candidate processed, and records the decision as one
	/// atomic unit.
	///
	/// A candidate that is no longer pending yields [`CommitOutcome::AlreadyMerged`]. A stale
	/// `expected_version`, or an insert racing another insert, fails with
	/// [`Error::StorageConflict`]. Neither case writes anything.
	fn upsert_agent<'a>(&'a self, commit: &'a MergeCommit) -> BoxFuture<'a, Result<CommitOutcome>>;

	/// Creates the agent or overwrites the stored one, returning the version written.
	fn seed_agent<'a>(&'a self, agent: &'a MasterAgent) -> BoxFuture<'a, Result<i64>>;

	fn agent_stats(&self) -> BoxFuture<'_, Result<AgentStats>>;
}

pub trait RunLog
where
	Self: Send + Sync,
{
	fn record_run<'a>(&'a self, report: &'a MergeReport) -> BoxFuture<'a, Result<()>>;

	fn latest_run(&self) -> BoxFuture<'_, Result<Option<MergeReport>>>;
}

#[derive(Clone)]
pub struct Stores {
	pub candidates: Arc<dyn CandidateStore>,
	pub masters: Arc<dyn MasterStore>,
	pub runs: Arc<dyn RunLog>,
}
impl Stores {
	pub fn new(
		candidates: Arc<dyn CandidateStore>,
		masters: Arc<dyn MasterStore>,
		runs: Arc<dyn RunLog>,
	) -> Self {
		Self { candidates, masters, runs }
	}

	pub fn postgres(store: PgStore) -> Self {
		let store = Arc::new(store);

		Self { candidates: store.clone(), masters: store.clone(), runs: store }
	}

	pub fn memory(store: Arc<MemoryStore>) -> Self {
		Self { candidates: store.clone(), masters: store.clone(), runs: store }
	}
}

pub struct RollcallService {
	pub cfg: Config,
	pub stores: Stores,
}
impl RollcallService {
	pub fn new(cfg: Config, stores: Stores) -> Self {
		Self { cfg, stores }
	}

	/// Connects to Postgres and bootstraps the schema.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::new(cfg, Stores::postgres(PgStore::new(db))))
	}

	/// Clears processed markers so the next merge batch revisits every candidate.
	pub async fn reprocess_all(&self) -> Result<u64> {
		let reset = self.stores.candidates.reset_processed().await?;

		tracing::info!(reset, "Candidates queued for reprocessing.");

		Ok(reset)
	}
}
