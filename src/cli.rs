use std::path::PathBuf;
use std::process;

use clap::Parser;

use jackc::driver::{compile_file, resolve_jack_files};

#[derive(Parser)]
#[command(name = "jackc", version, about = "Compiles Jack source to VM code")]
pub struct Cli {
    /// Input .jack file or a directory of .jack files
    pub input: PathBuf,
}

pub fn cmd_compile(args: Cli) {
    let files = resolve_jack_files(&args.input);
    if files.is_empty() {
        eprintln!(
            "error: no .jack files found under '{}'",
            args.input.display()
        );
        process::exit(1);
    }

    let mut had_error = false;
    for path in files {
        match compile_file(&path) {
            Ok(result) => {
                eprintln!(
                    "Compiled {} -> {}",
                    result.source_path.display(),
                    result.output_path.display()
                );
            }
            Err((diag, source)) => {
                diag.render(&path.display().to_string(), &source);
                had_error = true;
            }
        }
    }

    if had_error {
        process::exit(1);
    }
}
