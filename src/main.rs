//! txnest - Nested transactions over a single database connection
//!
//! This is the main entry point for the txnest command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use txnest::connection::MemoryConnection;
use txnest::db::{Repl, ReplConfig, ReplError};
use txnest::logging::init_tracing;
use txnest::transaction::{CoordinatorConfig, PoisonPolicy, SharedCoordinator};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut config_path: Option<PathBuf> = None;
    let mut strict = false;
    let mut verbose = false;
    let mut execute: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--strict" => {
                strict = true;
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-e" | "--execute" => {
                i += 1;
                if i < args.len() {
                    execute = Some(args[i].clone());
                }
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("txnest v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    if let Err(e) = init_tracing(verbose) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match load_config(config_path, strict) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let coordinator = SharedCoordinator::with_config(MemoryConnection::new(), config);

    // Execute a script or run the REPL.
    let result = match execute {
        Some(script) => {
            let config = ReplConfig {
                echo: true,
                ..ReplConfig::default()
            };
            let mut repl = Repl::with_config(coordinator, config);
            repl.execute_script(&script, &mut std::io::stdout())
        }
        None => Repl::new(coordinator).run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>, strict: bool) -> Result<CoordinatorConfig, ReplError> {
    let mut config = match path {
        Some(path) => CoordinatorConfig::from_json_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if strict {
        config.poison_policy = PoisonPolicy::Reject;
    }
    Ok(config)
}

fn print_help() {
    println!("txnest - Nested transactions over a single database connection");
    println!();
    println!("Usage: txnest [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH      JSON coordinator config (name, poison_policy)");
    println!("  --strict               Report commits into a rolled-back transaction as errors");
    println!("  -e, --execute SCRIPT   Run ';'-separated commands and exit");
    println!("  -v, --verbose          Log every physical transaction call");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  txnest                                          Start the REPL");
    println!("  txnest -e 'begin; begin; rollback; commit; .log'  Replay a nesting");
}
