use serde::{Deserialize, Serialize};

use crate::{MergeReport, Result, RollcallService};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
	pub candidates: u64,
	pub pending_candidates: u64,
	pub agents: u64,
	pub agents_needing_review: u64,
	pub avg_confidence: Option<f64>,
	pub min_confidence: Option<u8>,
	pub max_confidence: Option<u8>,
	pub teams: u64,
	pub last_run: Option<MergeReport>,
}

impl RollcallService {
	pub async fn stats(&self) -> Result<PipelineStats> {
		let counts = self.stores.candidates.candidate_counts().await?;
		let agents = self.stores.masters.agent_stats().await?;
		let last_run = self.stores.runs.latest_run().await?;

		Ok(PipelineStats {
			candidates: counts.candidates,
			pending_candidates: counts.pending,
			agents: agents.agents,
			agents_needing_review: agents.needs_review,
			avg_confidence: agents.avg_confidence,
			min_confidence: agents.min_confidence,
			max_confidence: agents.max_confidence,
			teams: agents.teams,
			last_run,
		})
	}
}
