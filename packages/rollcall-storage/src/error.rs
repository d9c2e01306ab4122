use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("No {entity} with id {id}.")]
	NotFound { entity: &'static str, id: Uuid },
	/// A guarded write lost to a concurrent writer.
	#[error("Write conflict on {entity} {id}: {detail}")]
	Conflict { entity: &'static str, id: Uuid, detail: String },
}
