use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use arcsync::cli::{self, Cli, EXIT_FAILURE, EXIT_SUCCESS};
use arcsync::config::{ArcsyncPaths, Settings};
use arcsync::logging;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version surface as "errors" that are not failures
            let code = if e.use_stderr() { EXIT_FAILURE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let paths = ArcsyncPaths::new().context("Cannot determine the arcsync directory")?;

    if cli.configure {
        logging::init(cli.verbose, None);
        cli::run_configure(&paths)?;
        return Ok(EXIT_SUCCESS);
    }

    if cli.list {
        logging::init(cli.verbose, None);
        let settings = Settings::load(&paths)?;
        cli::list_archives(&settings)?;
        return Ok(EXIT_SUCCESS);
    }

    let log_file = paths.log_file();
    let transcript = if paths.ensure_directories().is_ok() {
        logging::init(cli.verbose, Some(&log_file))
    } else {
        logging::init(cli.verbose, None)
    };

    let settings = Settings::load(&paths)?;
    let report = cli::run_backup(&settings, &paths, cli.full, !cli.no_sync, &transcript);

    Ok(if report.success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}
