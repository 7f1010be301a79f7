use clap::Parser;
use std::process::ExitCode;
use vidtidy::cli::{Cli, run_cli};
use vidtidy::logging::init_logging;
use vidtidy::output::OutputFormatter;

fn main() -> ExitCode {
    // Values from .env feed the environment overrides in Settings::load.
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
