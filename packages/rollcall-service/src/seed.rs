use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{RejectedMember, Result, RollcallService};
use rollcall_domain::{MergePolicy, seed};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
	pub records: u64,
	pub loaded: u64,
	/// Records are named `#<position>`, counting from 1.
	pub rejected: Vec<RejectedMember>,
}

impl RollcallService {
	/// Loads existing master agents so later merges can match against them.
	///
	/// Records that fail normalization are reported and skipped. Loading a record whose agent id
	/// is already stored overwrites that agent.
	pub async fn load_agents<I>(&self, records: I) -> Result<SeedReport>
	where
		I: IntoIterator<Item = Value>,
	{
		let policy = MergePolicy::from_config(&self.cfg.matching);
		let now = OffsetDateTime::now_utc();
		let mut report = SeedReport::default();

		for record in records {
			report.records += 1;

			let record_id = format!("#{}", report.records);
			let agent = match seed::normalize_agent(&record_id, &record, &policy, now) {
				Ok(agent) => agent,
				Err(err) => {
					tracing::warn!(record = %record_id, path = err.path(), error = %err, "Rejected agent record.");
					report.rejected.push(RejectedMember::from(&err));

					continue;
				},
			};
			let version = self.stores.masters.seed_agent(&agent).await?;

			tracing::debug!(agent_id = %agent.agent_id, team_id = %agent.team_id, version, "Loaded agent.");

			report.loaded += 1;
		}

		tracing::info!(
			records = report.records,
			loaded = report.loaded,
			rejected = report.rejected.len(),
			"Agent load finished."
		);

		Ok(report)
	}
}
