use serde::{Deserialize, Serialize};

use crate::{Result, RollcallService};
use rollcall_domain::{NormalizationError, RawDocument, normalize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
	pub documents: u64,
	pub members_seen: u64,
	pub inserted: u64,
	/// Candidates whose fingerprint was already stored for their team.
	pub duplicates: u64,
	pub rejected: Vec<RejectedMember>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedMember {
	pub document_id: String,
	pub path: String,
	pub message: String,
}
impl From<&NormalizationError> for RejectedMember {
	fn from(err: &NormalizationError) -> Self {
		Self {
			document_id: err.document_id().to_string(),
			path: err.path().to_string(),
			message: err.to_string(),
		}
	}
}

impl RollcallService {
	/// Stores raw documents and the candidates extracted from them.
	///
	/// Re-ingesting a document is a no-op. Malformed documents and members are reported in the
	/// returned [`IngestReport`]; storage failures abort the call.
	pub async fn ingest<I>(&self, documents: I) -> Result<IngestReport>
	where
		I: IntoIterator<Item = RawDocument>,
	{
		let mut report = IngestReport::default();

		for doc in documents {
			report.documents += 1;

			let team_id = doc.team_id();

			self.stores.candidates.insert_document(&doc, team_id.as_deref()).await?;

			let members = match normalize::normalize_document(&doc) {
				Ok(members) => members,
				Err(err) => {
					tracing::warn!(document_id = %doc.document_id, error = %err, "Rejected document.");
					report.rejected.push(RejectedMember::from(&err));

					continue;
				},
			};

			for member in members {
				report.members_seen += 1;

				let candidate = match member {
					Ok(candidate) => candidate,
					Err(err) => {
						tracing::warn!(
							document_id = %doc.document_id,
							path = err.path(),
							error = %err,
							"Rejected malformed member."
						);
						report.rejected.push(RejectedMember::from(&err));

						continue;
					},
				};

				if self.stores.candidates.insert_candidate(&candidate).await? {
					report.inserted += 1;
				} else {
					report.duplicates += 1;
				}
			}
		}

		tracing::info!(
			documents = report.documents,
			members = report.members_seen,
			inserted = report.inserted,
			duplicates = report.duplicates,
			rejected = report.rejected.len(),
			"Ingestion finished."
		);

		Ok(report)
	}
}
