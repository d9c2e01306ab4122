use sqlx::PgExecutor;

use crate::{Result, models::RawDocumentRow};

/// Returns `false` when the document was already stored.
pub async fn insert_raw_document<'e, E>(executor: E, doc: &RawDocumentRow) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO raw_documents (document_id, team_id, payload, ingested_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (document_id) DO NOTHING",
	)
	.bind(doc.document_id.as_str())
	.bind(doc.team_id.as_deref())
	.bind(&doc.payload)
	.bind(doc.ingested_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn get_raw_document<'e, E>(executor: E, document_id: &str) -> Result<Option<RawDocumentRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, RawDocumentRow>(
		"\
SELECT document_id, team_id, payload, ingested_at
FROM raw_documents
WHERE document_id = $1",
	)
	.bind(document_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
