use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rollcall_worker::Args::parse();

	rollcall_worker::run(args).await
}
