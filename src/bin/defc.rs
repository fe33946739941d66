//! Build .def files and report what came out.
//!
//! Usage:
//!   defc [OPTIONS] FILE.def [FILE.def ...]
//!
//! Options:
//!   --dump, -d   Print the resolved model as a text tree
//!   --json, -j   Print the resolved model as JSON
//!   --quiet, -q  Suppress the per-file summary line
//!
//! Exits 1 when any file fails to build.

use defwrangler::{dump_json, dump_text, load_def_file};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let dump = take_flag(&mut args, "--dump", "-d");
    let json = take_flag(&mut args, "--json", "-j");
    let quiet = take_flag(&mut args, "--quiet", "-q");

    if args.is_empty() {
        eprintln!("usage: defc [--dump|--json] [--quiet] FILE.def ...");
        std::process::exit(2);
    }

    let mut has_error = false;
    let mut total_warnings = 0usize;

    for path in &args {
        let path = Path::new(path);
        match load_def_file(path) {
            Ok(build) => {
                for d in &build.diagnostics {
                    total_warnings += 1;
                    eprintln!("{}", d);
                }
                if json {
                    print!("{}", dump_json(&build.model));
                } else if dump {
                    print!("{}", dump_text(&build.model));
                }
                if !quiet {
                    eprintln!(
                        "{}: {} message(s), {} enum(s), {} options, {} warning(s)",
                        path.display(),
                        build.model.messages.len(),
                        build.model.enums.len(),
                        build.model.options.len(),
                        build.diagnostics.len()
                    );
                }
            }
            Err(e) => {
                eprintln!("{}: error: {}", path.display(), e);
                has_error = true;
            }
        }
    }

    if total_warnings > 0 && !quiet {
        eprintln!("defc: {} warning(s)", total_warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == long || a == short) {
        args.remove(pos);
        true
    } else {
        false
    }
}
