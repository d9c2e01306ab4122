pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid {env} DSN: {message}")]
	InvalidDsn { env: &'static str, message: String },
	#[error("No admin database reachable; tried {tried:?}: {message}")]
	AdminUnreachable { tried: Vec<&'static str>, message: String },
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
