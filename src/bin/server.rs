//! DeepDive agent binary: reply dispatcher plus participant API.
//! Run with: cargo run --bin deepdive-server

use std::process::ExitCode;

use deepdive_agent::start_deepdive_agent;

fn main() -> ExitCode {
    start_deepdive_agent::run()
}
