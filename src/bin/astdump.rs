//! astdump CLI
//!
//! Usage: astdump [OPTIONS] [SQL]
//!
//! Parses the SQL text and prints the raw syntax tree of its first SELECT
//! statement as JSON on stdout. Logging goes to stderr and is controlled
//! by `RUST_LOG`.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use astdump::{dump, DumpConfig};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "astdump")]
#[command(version, about, long_about = None)]
struct Opts {
    #[clap(index = 1, help = "SQL text to parse")]
    sql: Option<String>,
    #[clap(
        short,
        long,
        help = "Read the SQL text from a file",
        conflicts_with = "sql"
    )]
    file: Option<PathBuf>,
    #[clap(
        long,
        value_name = "BYTES",
        help = "Truncate the JSON output at this many bytes (overrides ASTDUMP_MAX_OUTPUT)"
    )]
    max_output: Option<usize>,
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("Unable to set up logging: {e}");
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let opts = Opts::parse();

    let sql = match (opts.sql, &opts.file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read SQL from {}", path.display()))?,
        (None, None) => {
            eprintln!("Usage: astdump 'SQL query'");
            eprintln!("Outputs the parsed AST as JSON to stdout.");
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut config = DumpConfig::from_env();
    if opts.max_output.is_some() {
        config = config.with_max_output(opts.max_output);
    }

    match dump(&sql, &config) {
        Ok(json) => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("failed to write JSON to stdout")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
