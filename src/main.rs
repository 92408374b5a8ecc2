use clap::{Arg, Command};
use std::fs;
use std::path::Path;
use std::process;

/// Environment variable holding the log filter, e.g. `SPRIG_LOG=sprig=debug`.
const LOG_ENV: &str = "SPRIG_LOG";

fn main() {
    init_tracing();

    let matches = Command::new("sprig")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interpreter for the sprig scripting language")
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(file_path) = matches.get_one::<String>("file") {
        if !run_file(file_path) {
            process::exit(1);
        }
        if matches.get_flag("interactive") {
            sprig::start_repl();
        }
    } else {
        sprig::start_repl();
    }
}

/// Logging stays off unless `SPRIG_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var(LOG_ENV).is_ok() {
        let filter = EnvFilter::from_env(LOG_ENV);
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    }
}

fn run_file(path: &str) -> bool {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        return false;
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            let filename = path.display().to_string();
            sprig::run(&source, Some(&filename))
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            false
        }
    }
}
