use clap::Parser;
use log::{error, info};

use envmatch::cli::Cli;
use envmatch::config::MatchConfig;
use envmatch::processing::run;

fn main() {
    let args = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = MatchConfig::with_cli_args(&args).and_then(|config| {
        info!("Parsed configuration: {:#?}", config);
        run(&args.input_file, &config)
    });

    match result {
        Ok(output) => info!("Done, results in {}", output.display()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
