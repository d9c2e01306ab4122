pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage conflict: {message}")]
	StorageConflict { message: String },
	#[error("Storage unavailable: {message}")]
	StorageUnavailable { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	/// Whether a retry against fresh reads may succeed.
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::StorageConflict { .. })
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		let message = err.to_string();

		match &err {
			sqlx::Error::Io(_)
			| sqlx::Error::Tls(_)
			| sqlx::Error::PoolTimedOut
			| sqlx::Error::PoolClosed
			| sqlx::Error::WorkerCrashed => Self::StorageUnavailable { message },
			sqlx::Error::Database(db)
				if matches!(db.code().as_deref(), Some("23505" | "40001" | "40P01")) =>
				Self::StorageConflict { message },
			_ => Self::Storage { message },
		}
	}
}

impl From<rollcall_storage::Error> for Error {
	fn from(err: rollcall_storage::Error) -> Self {
		match err {
			rollcall_storage::Error::Sqlx(inner) => inner.into(),
			rollcall_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			rollcall_storage::Error::NotFound { .. } => Self::NotFound { message: err.to_string() },
			rollcall_storage::Error::Conflict { .. } =>
				Self::StorageConflict { message: err.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_failures_are_unavailable() {
		assert!(matches!(Error::from(sqlx::Error::PoolTimedOut), Error::StorageUnavailable { .. }));
		assert!(matches!(Error::from(sqlx::Error::PoolClosed), Error::StorageUnavailable { .. }));
	}

	#[test]
	fn guarded_write_conflicts_are_retryable() {
		let err = Error::from(rollcall_storage::Error::Conflict {
			entity: "master agent",
			id: uuid::Uuid::nil(),
			detail: "expected version 1, found 2".to_string(),
		});

		assert!(err.is_conflict());
		assert!(!Error::from(sqlx::Error::RowNotFound).is_conflict());
	}
}
