use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre;

use steer_catalog::MemoryCatalog;
use steer_service::{SelectOptions, SelectOutcome, SteerService};

#[derive(Debug, Parser)]
#[command(
	version = steer_cli::VERSION,
	rename_all = "kebab",
	styles = steer_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON candidate catalog.
	#[arg(long, value_name = "FILE")]
	pub catalog: PathBuf,
	#[arg(long, value_name = "N", allow_negative_numbers = true)]
	pub max_candidates: Option<i64>,
	#[arg(long, value_name = "N", allow_negative_numbers = true)]
	pub max_tier: Option<i64>,
	#[arg(long, value_name = "SCORE", allow_negative_numbers = true)]
	pub min_confidence: Option<f64>,
	#[arg(long, value_name = "SCORE", allow_negative_numbers = true)]
	pub domain_confidence_floor: Option<f64>,
	#[arg(long, value_name = "N", allow_negative_numbers = true)]
	pub max_domains: Option<i64>,
	/// Disables the embedding-based domain fallback.
	#[arg(long)]
	pub no_semantic: bool,
	/// Cancellation deadline per query.
	#[arg(long, value_name = "MS", allow_negative_numbers = true)]
	pub timeout_ms: Option<i64>,
	/// Pretty-prints each outcome instead of emitting one JSON line per query.
	#[arg(long)]
	pub pretty: bool,
	#[arg(value_name = "QUERY", required = true)]
	pub queries: Vec<String>,
}
impl Args {
	pub fn select_options(&self) -> SelectOptions {
		SelectOptions {
			max_candidates: self.max_candidates,
			max_tier: self.max_tier,
			min_confidence: self.min_confidence,
			domain_confidence_floor: self.domain_confidence_floor,
			use_semantic_fallback: self.no_semantic.then_some(false),
			max_domains: self.max_domains,
			timeout_ms: self.timeout_ms,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = steer_config::load(&args.config)?;

	steer_cli::init_tracing(&config.service.log_level);

	let catalog = Arc::new(MemoryCatalog::load(&args.catalog)?);

	tracing::info!(candidates = catalog.len(), catalog = %args.catalog.display(), "Catalog ready.");

	let service = SteerService::new(config, catalog.into_sources())?;
	let options = args.select_options();

	for query in &args.queries {
		let outcome = service
			.select(query, options.clone())
			.await
			.map_err(|err| eyre::eyre!("{} ({err})", err.user_message()))?;

		if let SelectOutcome::Rejected(rejected) = &outcome {
			tracing::info!(reason = rejected.reason.as_str(), "{}", rejected.reason.user_message());
		}

		let rendered = if args.pretty {
			serde_json::to_string_pretty(&outcome)?
		} else {
			serde_json::to_string(&outcome)?
		};

		println!("{rendered}");
	}

	Ok(())
}
