//! The beeb compiler CLI.

use std::path::PathBuf;

use beebc::{build, BuildOptions, Logger, StderrLogger};

fn main() {
    beebc::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "build" => {
            if args.len() < 3 {
                eprintln!("Usage: beeb build <program.dll> [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --entry=<name>   Entry method name (default: Main).");
                eprintln!("                   Unqualified; the first matching definition wins.");
                eprintln!("  -o <path>        Output file");
                eprintln!("  --listing        Also write the assembler listing (.lst)");
                std::process::exit(1);
            }

            let mut options = BuildOptions::new(PathBuf::from(&args[2]));
            let mut i = 3;
            while i < args.len() {
                if let Some(entry) = args[i].strip_prefix("--entry=") {
                    options.entry_point = entry.to_owned();
                    i += 1;
                } else if args[i] == "-o" && i + 1 < args.len() {
                    options.output = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else if args[i] == "--listing" {
                    options.write_listing = true;
                    i += 1;
                } else {
                    eprintln!("error: unknown option `{}`", args[i]);
                    std::process::exit(1);
                }
            }

            let mut logger = StderrLogger;
            // The binary-producing assembler is an external collaborator;
            // without it the output is the assembly text itself.
            if let Err(e) = build(&options, None, &mut logger) {
                logger.message(&format!("error: {e}"));
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        other => {
            eprintln!("error: unknown command `{other}`");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("The beeb compiler: .NET assemblies to BBC Micro assembly");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  beeb build <program.dll> [--entry=<name>] [-o <path>] [--listing]");
    eprintln!("  beeb help");
}
