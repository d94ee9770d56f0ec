use clap::Parser;
use env_logger::Env;
use indigraph::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    run(Cli::parse())
}
