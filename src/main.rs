//! # research_crawl
//!
//! Runs one research cycle for a topic from the command line.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... research_crawl "AI chips" -j ./reports
//! ```
//!
//! The structured result is printed to stdout as JSON. Failures exit with a
//! code that says what went wrong:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 1 | configuration, IO, or serialization error |
//! | 2 | no source produced any articles |
//! | 3 | the model could not be reached |
//! | 4 | the model's reply was not usable |

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use research_crawl::cli::Cli;
use research_crawl::outputs::json;
use research_crawl::utils::ensure_writable_dir;
use research_crawl::{run_research_cycle, Error, ResearchContext};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("research_crawl starting up");

    let args = Cli::parse();
    debug!(topic = %args.topic, ?args.json_output_dir, ?args.sources, "Parsed CLI arguments");

    let outcome = run(&args).await;

    let elapsed = start_time.elapsed();
    match outcome {
        Ok(()) => {
            info!(?elapsed, secs = elapsed.as_secs(), millis = elapsed.subsec_millis(), "Execution complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, code = e.exit_code(), ?elapsed, "Research cycle failed");
            eprintln!("research_crawl: {}", user_message(&e));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

#[instrument(level = "info", skip_all, fields(topic = %args.topic))]
async fn run(args: &Cli) -> Result<(), Error> {
    let settings = args.settings().await?;
    info!(provider = ?settings.provider, schema = ?settings.schema_enforcement, "Resolved settings");

    // Early check: fail before crawling if the report cannot be written.
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable (fix perms or choose a different path)");
            return Err(e.into());
        }
    }

    let context = ResearchContext::from_settings(&settings, args.max_retries)?;
    let outcome = run_research_cycle(&args.topic, &context).await?;

    println!("{}", serde_json::to_string_pretty(outcome.result.as_value())?);

    if let Some(dir) = &args.json_output_dir {
        let report = outcome.into_report();
        let path = json::write_report(&report, dir).await?;
        info!(path = %path.display(), "Report saved");
    }
    Ok(())
}

fn user_message(e: &Error) -> String {
    match e {
        Error::AllSourcesEmpty => {
            "no articles could be collected from any source; try again later or check network access".into()
        }
        Error::ModelCall(reason) => {
            format!("the model endpoint could not be reached ({reason}); check --base-url and --api-key")
        }
        Error::ModelParse { reason, preview } if !preview.is_empty() => {
            format!("the model answered but the reply was unusable ({reason}); reply began: {preview}")
        }
        Error::ModelParse { reason, .. } => {
            format!("the model answered but the reply was unusable ({reason})")
        }
        other => other.to_string(),
    }
}
