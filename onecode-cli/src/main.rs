//! Onecode CLI - reference tools for the onecode container format.
//!
//! A thin wrapper over `onecode-format`/`onecode-schema` providing the two
//! utilities every onecode toolchain needs: dumping/converting a container
//! (`view`) and summarising its record counts (`stat`).

mod commands;
mod index_spec;
mod time;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use commands::{stat, view};
use std::io;

#[derive(Parser)]
#[command(name = "onecode")]
#[command(author, version, about = "Reference tools for onecode container files")]
#[command(long_about = "
onecode is a reference implementation of the onecode self-describing
record container format: a schema-driven, dual ASCII/binary encoding
with random-access indexing and parallel writer support.

Examples:
  onecode view reads.1seq
  onecode view -b -o reads.bin.1seq reads.1seq
  onecode view --index \"A 0-99\" reads.1seq
  onecode view --write-schema schema.txt reads.1seq
  onecode stat reads.1seq
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump, convert, or subset a container file
    View(view::ViewArgs),

    /// Print per-line-type record counts
    Stat(stat::StatArgs),

    /// Generate shell completion scripts
    #[command(hide = true)]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::View(args) => view::run(args),
        Commands::Stat(args) => stat::run(args),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "onecode", &mut io::stdout());
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
