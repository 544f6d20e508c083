//! composer: generate one instrumental clip and print its record.
//!
//! Logs go to stderr; stdout carries only the JSON record, so the output
//! can be piped straight into whatever stores it.

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use composer::cli::Cli;
use composer::config::ComposerConfig;
use composer::generation::Composer;
use composer::types::{CompositionRecord, GenerationRequest, Style};

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let config = cli.apply(ComposerConfig::from_env());
    if let Some(problem) = config.validate() {
        bail!("invalid configuration: {}", problem);
    }

    let composer = Composer::from_config(&config);
    let style = Style::from_label(&cli.style);
    if !style.is_known() {
        info!(style = %style, "using unlisted style label");
    }

    let request = GenerationRequest::new(style, cli.hint.clone(), cli.duration)?;
    let outcome = composer
        .generate(&request)
        .context("could not store a clip, not even the silent fallback")?;

    let record = CompositionRecord::new(&request.style, &outcome);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
