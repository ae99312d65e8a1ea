//! Batch entrypoint: collect feeds, rewrite, translate, publish, then exit.
//!
//! Exit codes: 0 on success, 1 if any item failed, 2 on invalid configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use blog_automation::config::{self, LogFormat, PipelineConfig, DEFAULT_MAX_ARTICLES};
use blog_automation::telemetry;
use blog_automation::Pipeline;

#[derive(Debug, Parser)]
#[command(name = "blog-automation", version, about)]
struct Cli {
    /// Maximum number of new articles to process.
    #[arg(long, default_value_t = DEFAULT_MAX_ARTICLES)]
    max: usize,

    /// Only list new articles; do not rewrite or publish.
    #[arg(long)]
    collect: bool,

    /// Read articles from a JSON file instead of the feed list.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Report what would be published without writing files.
    #[arg(long)]
    dry_run: bool,

    /// Also print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Environment file loaded before reading configuration.
    #[arg(long, value_name = "FILE", default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env must be applied before LOG_FORMAT/RUST_LOG are read.
    let dotenv = config::load_dotenv(&cli.env_file);
    telemetry::init_tracing(LogFormat::from_env());
    match dotenv {
        Ok(true) => tracing::debug!(path = %cli.env_file.display(), "loaded env file"),
        Ok(false) => {}
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(2);
        }
    }

    let config = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    let mut pipeline = match Pipeline::from_config(&config, cli.input.as_deref(), cli.dry_run) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = ?e, "startup failed");
            return ExitCode::from(2);
        }
    };

    if cli.collect {
        let listing = pipeline.collect(cli.max).await;
        for a in &listing.articles {
            println!("{}\t{}\t{}", a.source_name, a.title, a.url);
        }
        println!(
            "collected {} new article(s), {} retrieval error(s)",
            listing.articles.len(),
            listing.errors.len()
        );
        if cli.json {
            match serde_json::to_string_pretty(&listing.articles) {
                Ok(s) => println!("{s}"),
                Err(e) => tracing::warn!(error = %e, "could not serialize listing"),
            }
        }
        return ExitCode::SUCCESS;
    }

    let summary = pipeline.run(cli.max).await;
    println!("{}", summary.summary_line());
    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::warn!(error = %e, "could not serialize summary"),
        }
    }
    ExitCode::from(summary.exit_code())
}
