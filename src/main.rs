use clap::Parser;
use tracing_subscriber::EnvFilter;

use shoplist_cli::cli::{self, Cli};
use shoplist_cli::config::Config;

fn init_tracing(debug: bool, configured_level: Option<&str>) {
    let fallback = if debug {
        "debug"
    } else {
        configured_level.unwrap_or("warn")
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(fallback).unwrap_or_else(|_| EnvFilter::new("warn"))
        }))
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    init_tracing(
        cli.debug,
        config.as_ref().ok().map(|c| c.debug.log_level.as_str()),
    );

    let result = match config {
        Ok(config) => cli::run(cli, config).await,
        Err(err) => Err(err.into()),
    };
    match result {
        Ok(output) => {
            println!("{output}");
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(shoplist_err) = err.downcast_ref::<shoplist_cli::error::ShoplistError>() {
                eprintln!("Error: {shoplist_err}");
            } else {
                eprintln!("Error: {err}");
            }
            std::process::ExitCode::from(1)
        }
    }
}
