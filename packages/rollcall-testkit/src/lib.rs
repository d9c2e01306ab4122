//! Throwaway Postgres databases for integration tests.
//!
//! Tests read an admin DSN from `ROLLCALL_PG_DSN`, create a uniquely named database next to it,
//! and drop that database when the handle is cleaned up or dropped.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const DSN_ENV: &str = "ROLLCALL_PG_DSN";

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	name: String,
	options: PgConnectOptions,
	admin: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// Creates a database when `ROLLCALL_PG_DSN` is set, and returns `None` otherwise.
	pub async fn from_env() -> Result<Option<Self>> {
		match env_dsn() {
			Some(dsn) => Self::create(&dsn).await.map(Some),
			None => Ok(None),
		}
	}

	pub async fn create(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::InvalidDsn { env: DSN_ENV, message: err.to_string() })?;
		let (admin, mut conn) = admin_connection(&base).await?;
		let name = format!("rollcall_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;

		let options = base.database(&name);

		Ok(Self { name, options, admin, dropped: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dsn(&self) -> String {
		self.options.to_url_lossy().to_string()
	}

	/// Connection settings for the stores under test.
	pub fn postgres(&self, pool_max_conns: u32) -> rollcall_config::Postgres {
		rollcall_config::Postgres { dsn: self.dsn(), pool_max_conns }
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let admin = self.admin.clone();
		// The test's runtime may be shutting down, so the drop runs on a runtime of its own.
		let handle = thread::spawn(move || {
			let outcome = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())
				.and_then(|runtime| {
					runtime.block_on(drop_database(&name, &admin)).map_err(|err| err.to_string())
				});

			if let Err(err) = outcome {
				eprintln!("Failed to drop test database {name}: {err}.");
			}
		});
		let _ = handle.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn admin_connection(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut message = String::new();

	for database in ADMIN_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => message = err.to_string(),
		}
	}

	Err(Error::AdminUnreachable { tried: ADMIN_DATABASES.to_vec(), message })
}

async fn drop_database(name: &str, admin: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await?;

	// Pool connections left open by the test would block the drop.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1
\tAND pid <> pg_backend_pid()",
	)
	.bind(name)
	.execute(&mut conn)
	.await?;
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).await?;

	Ok(())
}
