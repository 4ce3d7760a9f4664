use std::path::PathBuf;

use clap::Parser;
use log::error;
use pdf_skeleton::rewrite;

/// Parse a PDF file and write it back, in full or as an incremental update.
#[derive(Debug, Parser)]
#[command(name = "pdf-rewrite", about, version)]
struct Cli {
    /// Path to the PDF file to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Path of the file to write
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Append new objects to OUTPUT instead of rewriting it
    #[arg(long)]
    update: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match rewrite(&cli.input, &cli.output, cli.update) {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            error!("Failed to rewrite {}", cli.input.display());
            eprintln!("Error: {}", e);
            std::process::exit(e.kind().code());
        }
    }
}
