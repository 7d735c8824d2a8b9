mod console;
mod repl;
mod runner;

use clap::Parser;
use parley_interpreter::InterpreterConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Fail on list indices past the end instead of growing the list
    #[arg(long)]
    strict_lists: bool,
    /// Significant digits kept by arithmetic
    #[arg(long, value_name = "N")]
    precision: Option<u64>,
    /// Significant digits shown when a number is turned into text
    #[arg(long, value_name = "N")]
    output_digits: Option<u64>,
    /// Radix used to read and write numbers
    #[arg(long, value_name = "N")]
    base: Option<u32>,
    /// Block to start the dialogue at instead of the first one
    #[arg(long, value_name = "BLOCK")]
    start: Option<String>,
    /// Script to run. Starts an interactive session when absent.
    path: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> InterpreterConfig {
        let defaults = InterpreterConfig::default();
        InterpreterConfig {
            strict_lists: self.strict_lists,
            precision: self.precision.unwrap_or(defaults.precision),
            output_digits: self.output_digits.unwrap_or(defaults.output_digits),
            number_base: self.base.unwrap_or(defaults.number_base),
            ..defaults
        }
    }
}

fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();

    let result = match &cli.path {
        None => repl::start(config).map_err(|err| err.to_string()),
        Some(path) => runner::execute(path, config, cli.start.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{message}");
            }
            ExitCode::FAILURE
        }
    }
}
