use std::process::ExitCode;

use clap::Parser;
use lm_sampler::{EngineTier, TokenCostEstimator};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cost-estimator")]
#[command(version, about = "Estimate the token cost of a prompt per engine tier")]
struct Args {
    /// Prompt to price
    prompt: String,

    /// Engine tier: davinci, curie, babbage or ada
    engine: String,
}

fn run(args: &Args) -> lm_sampler::Result<()> {
    // Reject unknown tiers before downloading the tokenizer
    let engine: EngineTier = args.engine.parse()?;
    let estimator = TokenCostEstimator::gpt2()?;
    let estimate = estimator.estimate(&[args.prompt.as_str()], engine)?;

    println!("Total number of tokens: {}", estimate.n_tokens_total);
    println!("Cost for engine {}: {}", estimate.engine, estimate.cost);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
