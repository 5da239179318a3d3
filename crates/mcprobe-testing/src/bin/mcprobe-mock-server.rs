//! Hello-world MCP server over stdio, with scripted misbehavior.
//!
//! ```text
//! mcprobe-mock-server [--mode <MODE>] [--crash-after <N>]
//! ```

use clap::Parser;
use mcprobe_testing::mock::{MockServer, Mode};
use std::io;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "mcprobe-mock-server", version, about = "Scripted MCP server for harness tests")]
struct Args {
    /// How the server behaves.
    #[arg(long, value_enum, default_value_t = Mode::Conforming)]
    mode: Mode,

    /// Requests answered before a crash in `crash-after` mode.
    #[arg(long, default_value_t = 1)]
    crash_after: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut server = MockServer::new(args.mode).crash_after(args.crash_after);

    match server.serve(io::stdin().lock(), io::stdout().lock(), io::stderr().lock()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("mcprobe-mock-server: {e}");
            ExitCode::FAILURE
        }
    }
}
