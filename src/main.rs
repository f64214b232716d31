//! Binary entrypoint for the `mirrordoc` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match mirrordoc::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
