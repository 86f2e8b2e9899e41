//! MiniC Compiler CLI
//!
//! Command-line interface for compiling MiniC sources to three-address IR
//! and running the basic-block analysis.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use minicc::{blocks, compile_source};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "minicc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MiniC compiler - compile C-like sources to three-address IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to a .ir file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output IR path (defaults to the input path with extension .ir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Perform basic block analysis and print the results
        #[arg(long)]
        analyze_blocks: bool,

        /// Print the symbol table after parsing
        #[arg(long)]
        dump_symbols: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            output,
            analyze_blocks,
            dump_symbols,
        } => {
            let code = build(&input, output.as_deref(), analyze_blocks, dump_symbols);
            process::exit(code);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "minicc", &mut io::stdout());
        }
    }
}

fn build(input: &Path, output: Option<&Path>, analyze_blocks: bool, dump_symbols: bool) -> i32 {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: Cannot open file {}: {}", input.display(), e);
            return 1;
        }
    };

    let compilation = match compile_source(&source) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    for diagnostic in compilation.diagnostics.diagnostics() {
        eprintln!("{}", diagnostic.render());
    }

    if dump_symbols {
        println!("{}", compilation.symbols.render());
    }

    let Some(ir) = &compilation.ir else {
        println!("=== PARSING FAILED ===");
        println!("Total errors: {}", compilation.diagnostics.error_count);
        return 1;
    };

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("ir"),
    };
    if let Err(e) = std::fs::write(&output_path, ir.render()) {
        eprintln!(
            "Error: Cannot open file {} for writing: {}",
            output_path.display(),
            e
        );
        return 1;
    }

    println!("Intermediate code written to: {}", output_path.display());
    println!("Total IR instructions: {}", ir.len());
    if !ir.statics.is_empty() {
        println!("Static variables: {}", ir.statics.len());
    }

    if analyze_blocks {
        println!("\n=== PERFORMING BASIC BLOCK ANALYSIS ===");
        let analysis = blocks::analyze(ir);
        println!("{}", analysis.render(ir));
        println!("=== BASIC BLOCK ANALYSIS COMPLETED ===");
    }

    0
}
