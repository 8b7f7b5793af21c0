//! Weft Compiler CLI
//!
//! Compiles .weft sources into a content-addressed store and runs stored
//! words on the engine. `RUST_LOG=weftc=debug` traces compilation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use weftc::{Session, Store};

#[derive(Parser)]
#[command(name = "weftc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Weft compiler - compile concatenative programs to a content-addressed store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file into the store
    Build {
        /// Input .weft source file
        input: PathBuf,

        /// Store file (created if missing)
        #[arg(long, default_value = "weft.db")]
        db: PathBuf,
    },

    /// Compile a source file, then execute a word from it
    Run {
        /// Input .weft source file
        input: PathBuf,

        /// Word to execute after compilation
        #[arg(short, long)]
        word: String,

        /// Store file (created if missing)
        #[arg(long, default_value = "weft.db")]
        db: PathBuf,

        /// Print the operand stack after execution
        #[arg(short, long)]
        show_stack: bool,
    },

    /// List the words in a store
    Words {
        /// Store file
        #[arg(long, default_value = "weft.db")]
        db: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { input, db } => run_build(&input, &db),
        Commands::Run {
            input,
            word,
            db,
            show_stack,
        } => run_word(&input, &word, &db, show_stack),
        Commands::Words { db } => list_words(&db),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn run_build(input: &PathBuf, db: &PathBuf) -> Result<(), weftc::CompileError> {
    weftc::compile_file(input, db)?;
    println!("compiled {} -> {}", input.display(), db.display());
    Ok(())
}

fn run_word(
    input: &PathBuf,
    word: &str,
    db: &PathBuf,
    show_stack: bool,
) -> Result<(), weftc::CompileError> {
    let source = std::fs::read_to_string(input)?;
    let mut session = Session::new(Store::open(db)?)?;
    session.compile_source(&source)?;
    session.save()?;

    let stack = session.execute(word)?;
    if show_stack {
        println!("stack ({} items):", stack.len());
        for (i, value) in stack.iter().rev().enumerate() {
            println!("  [{i}] = {value}");
        }
    }
    Ok(())
}

fn list_words(db: &PathBuf) -> Result<(), weftc::CompileError> {
    let store = Store::open(db)?;
    let mut words: Vec<_> = store.words().collect();
    words.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (name, record) in words {
        println!("{}:{}  {}  {}", record.namespace, name, record.type_sig, record.def_cid);
    }
    Ok(())
}
