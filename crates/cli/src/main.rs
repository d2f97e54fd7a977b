use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use lens_protocol::serialize_json;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use command::CommandResponse;

mod command;
mod config;
mod workspace;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "cobol-lens")]
#[command(about = "Code intelligence for COBOL projects", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Config file (default: <project>/cobol-lens.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra COPY member directory, searched after configured ones
    #[arg(long, global = true)]
    pub copy_path: Vec<PathBuf>,

    /// Accept the usual vendor relaxations (Area A, inline comments, long lines, EXEC)
    #[arg(long, global = true)]
    pub relaxed: bool,

    /// Answer from the stored index without re-reading changed sources
    #[arg(long, global = true)]
    pub no_refresh: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Index (or re-index) every program under the project root
    Index {
        /// Ignore stored units and parse everything again
        #[arg(long)]
        full: bool,

        /// Units parsed in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Find names by fragment: exact, then prefix, then substring
    Search {
        query: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Fuzzy ranking only
        #[arg(long)]
        fuzzy: bool,
    },

    /// Where a data item, file, procedure or program is defined
    Definition {
        /// Name, optionally qualified: "BALANCE OF CUSTOMER-REC"
        name: String,

        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Every place a name is used
    References {
        name: String,

        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Statements reading or writing a data item
    Accesses {
        name: String,

        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Call graph around a procedure; program dependencies without one
    Graph {
        /// UNIT/KEY, a key, or a paragraph/section name
        procedure: Option<String>,

        #[arg(short, long)]
        unit: Option<String>,

        #[arg(short, long, default_value_t = 2)]
        depth: u32,

        #[arg(long, value_enum, default_value_t = DirectionArg::Forward)]
        direction: DirectionArg,
    },

    /// Source, edges and data of one procedure, for an explanation service
    Explain {
        procedure: String,

        #[arg(short, long)]
        unit: Option<String>,

        /// Lines of context around the procedure
        #[arg(long, default_value_t = 0)]
        context: u32,

        /// Character budget for the JSON payload
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Findings recorded while indexing
    Diagnostics {
        #[arg(short, long)]
        unit: Option<String>,

        #[arg(long, value_enum)]
        min_severity: Option<SeverityArg>,
    },

    /// Corpus counts, per-unit metrics and program dependencies
    Stats,

    /// Codebase overview, program relationships and refactoring candidates
    Analytics {
        /// Programs with more source lines count as large
        #[arg(long, default_value_t = 1000)]
        max_lines: u32,

        /// Programs with more COPY/CALL dependencies count as highly dependent
        #[arg(long, default_value_t = 10)]
        max_dependencies: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum DirectionArg {
    Forward,
    Backward,
    Both,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum SeverityArg {
    Info,
    Warning,
    Error,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let started = Instant::now();
    let mut response = match command::execute(&cli).await {
        Ok((data, meta)) => CommandResponse::ok(data, meta),
        Err(err) => {
            log::debug!("command failed: {err:?}");
            CommandResponse::error(&err)
        }
    };
    response.meta.duration_ms = Some(started.elapsed().as_millis() as u64);

    print_stdout(&serialize_json(&response)?)?;
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
