pub mod feed;

use std::{
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use rollcall_service::{
	CancelFlag, MemoryStore, MergeReport, RollcallService, RunStatus, Stores,
};

#[derive(Debug, Parser)]
#[command(
	version = rollcall_cli::VERSION,
	rename_all = "kebab",
	styles = rollcall_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Store raw documents and extract candidate members.
	Ingest {
		/// Newline-delimited JSON, one team document per line.
		#[arg(long, short = 'i', value_name = "FILE")]
		input: PathBuf,
	},
	/// Load existing master agents so later merges can match against them.
	LoadAgents {
		/// Newline-delimited JSON, one agent record per line.
		#[arg(long, short = 'i', value_name = "FILE")]
		input: PathBuf,
	},
	/// Merge pending candidates into the master agents.
	Merge {
		/// Revisit every candidate, not only new ones.
		#[arg(long)]
		reprocess: bool,
	},
	/// Ingest a feed and merge it in one go.
	Run {
		#[arg(long, short = 'i', value_name = "FILE")]
		input: PathBuf,
		/// Keep everything in memory and leave Postgres untouched.
		#[arg(long)]
		dry_run: bool,
	},
	/// Print candidate, agent, and last run statistics.
	Stats,
}

pub async fn run(args: Args) -> Result<()> {
	let config = rollcall_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	match args.command {
		Command::Ingest { input } => {
			let documents = feed::read_documents(&input)?;
			let service = RollcallService::connect(config).await?;
			let report = service.ingest(documents).await?;

			print_json(&report)
		},
		Command::LoadAgents { input } => {
			let records = feed::read_values(&input)?;
			let service = RollcallService::connect(config).await?;
			let report = service.load_agents(records).await?;

			print_json(&report)
		},
		Command::Merge { reprocess } => {
			let service = RollcallService::connect(config).await?;

			if reprocess {
				service.reprocess_all().await?;
			}

			finish_merge(service.merge_batch(cancel_on_ctrl_c()).await)
		},
		Command::Run { input, dry_run } => {
			let documents = feed::read_documents(&input)?;
			let service = if dry_run {
				RollcallService::new(config, Stores::memory(Arc::new(MemoryStore::new())))
			} else {
				RollcallService::connect(config).await?
			};
			let ingested = service.ingest(documents).await?;

			print_json(&ingested)?;

			finish_merge(service.merge_batch(cancel_on_ctrl_c()).await)
		},
		Command::Stats => {
			let service = RollcallService::connect(config).await?;

			print_json(&service.stats().await?)
		},
	}
}

fn cancel_on_ctrl_c() -> CancelFlag {
	let cancel = Arc::new(AtomicBool::new(false));
	let flag = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Cancellation requested; stopping after the current candidate.");

			flag.store(true, Ordering::Relaxed);
		}
	});

	cancel
}

fn finish_merge(report: MergeReport) -> Result<()> {
	print_json(&report)?;

	match report.status {
		RunStatus::Succeeded => Ok(()),
		RunStatus::Cancelled => Err(eyre::eyre!(
			"Merge run {} was cancelled after {} candidates.",
			report.run_id,
			report.processed
		)),
		RunStatus::Failed => Err(eyre::eyre!(
			"Merge run {} failed after {} candidates: {}",
			report.run_id,
			report.processed,
			report.error.unwrap_or_default()
		)),
	}
}

fn print_json<T>(value: &T) -> Result<()>
where
	T: serde::Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn cli_definition_is_consistent() {
		Args::command().debug_assert();
	}

	#[test]
	fn parses_merge_flags() {
		let args = Args::try_parse_from(["rollcall-worker", "-c", "rollcall.toml", "merge", "--reprocess"])
			.expect("Arguments should parse.");

		assert!(matches!(args.command, Command::Merge { reprocess: true }));
	}

	#[test]
	fn parses_load_agents() {
		let args = Args::try_parse_from([
			"rollcall-worker",
			"-c",
			"rollcall.toml",
			"load-agents",
			"--input",
			"agents.ndjson",
		])
		.expect("Arguments should parse.");

		assert!(
			matches!(args.command, Command::LoadAgents { input } if input == PathBuf::from("agents.ndjson"))
		);
	}

	#[test]
	fn run_requires_input() {
		assert!(Args::try_parse_from(["rollcall-worker", "-c", "rollcall.toml", "run"]).is_err());
	}
}
