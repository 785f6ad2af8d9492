use clap::Parser;

use steer_select::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	steer_select::run(args).await
}
