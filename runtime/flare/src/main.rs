//! Flare command-line runner.

use flare_cli::{init_tracing, parse_options, run, CliError};

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };
    if options.help {
        print_usage();
        return;
    }

    if let Err(err) = run(&options) {
        match &err {
            CliError::Vm(_) => eprintln!("script error: {err}"),
            _ => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: flare <file> [options]");
    eprintln!();
    eprintln!("Runs a raw action buffer and prints its trace output.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --hex               Input is hex text ('#' starts a comment)");
    eprintln!("  --disasm            Print the disassembly instead of running");
    eprintln!("  --swf-version=<n>   Version the buffer was authored for (default 7)");
    eprintln!("  --frames=<n>        Frames on the root timeline (default 1)");
    eprintln!("  --seed=<n>          Seed for the random number source (default 0)");
    eprintln!("  --strict            Fail on malformed actions instead of skipping");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FLARE_RECURSION_LIMIT, FLARE_BRANCH_LIMIT   Override script limits");
    eprintln!("  RUST_LOG                                    Enable tracing output");
}
