mod app;
mod event;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prodq")]
#[command(about = "A terminal client for a products REST API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/prodq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Products API base URL, overriding config and PRODQ_API_URL
  #[arg(long)]
  api_url: Option<String>,

  /// Start with this search applied
  #[arg(short, long)]
  search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = prodq::config::Config::load(args.config.as_deref())?;
  if let Some(url) = &args.api_url {
    config.apply_api_url(url);
  }

  let _log_guard = prodq::logging::init()?;

  // Initialize and run the app
  let mut app = app::App::new(config, args.search.as_deref())?;
  app.run().await?;

  Ok(())
}
