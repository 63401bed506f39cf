//! Binary entry point for docqa-rs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use docqa_rs::cli::output::{OutputFormat, format_error};
use docqa_rs::cli::{Cli, execute};
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    docqa_rs::logging::init(cli.verbose);
    let format = OutputFormat::parse(&cli.format);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                // Handle broken pipe gracefully (e.g., when piped to `head` or `jq`)
                if let Err(e) = write!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(kind = e.kind(), "command failed");
            let error_output = format_error(&e, format);
            match format {
                // JSON errors go to stdout for programmatic parsing
                OutputFormat::Json => println!("{error_output}"),
                OutputFormat::Text => eprintln!("Error: {error_output}"),
            }
            ExitCode::FAILURE
        }
    }
}
