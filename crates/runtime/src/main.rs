//! `ember` CLI: read a script file, optionally run it through the
//! semicolon sanitizer, compile it, and run it.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ember_rt::InterpretResult;

#[derive(Parser)]
#[command(name = "ember", about = "Run an Ember script")]
struct Cli {
    /// Path to the script to run.
    path: PathBuf,

    /// Run the semicolon-insertion pre-pass before compiling.
    #[arg(long)]
    sanitize: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("Could not open file \"{}\".", cli.path.display());
            return ExitCode::from(74);
        }
    };

    let source = if cli.sanitize {
        ember_sanitizer::sanitize(&source)
    } else {
        source
    };

    match ember_rt::interpret(&source) {
        InterpretResult::Ok => ExitCode::from(0),
        InterpretResult::CompileError => ExitCode::from(65),
        InterpretResult::RuntimeError => ExitCode::from(70),
    }
}
