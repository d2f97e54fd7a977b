use anyhow::Result;
use lens_frontend::Severity;
use lens_indexer::IngestStats;
use lens_protocol::{CorpusStats, GraphDirection, ProgramDependency, UnitSummary};
use lens_search::{ProcedureRef, QueryEngine, RefactoringThresholds};
use serde::Serialize;
use serde_json::Value;

use super::ResponseMeta;
use crate::config::Overrides;
use crate::workspace::Workspace;
use crate::{Cli, Commands, DirectionArg, SeverityArg};

#[derive(Debug, Serialize)]
struct IndexReport {
    root: String,
    store: String,
    restored: usize,
    stored: usize,
    stats: IngestStats,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    corpus: CorpusStats,
    units: Vec<UnitSummary>,
    programs: Vec<ProgramDependency>,
}

/// Run one command against the project and return its JSON payload
pub async fn execute(cli: &Cli) -> Result<(Value, ResponseMeta)> {
    let overrides = Overrides {
        relaxed: cli.relaxed,
        copy_paths: cli.copy_path.clone(),
        concurrency: match &cli.command {
            Commands::Index { concurrency, .. } => *concurrency,
            _ => None,
        },
    };
    let workspace = Workspace::open(&cli.project, cli.config.as_deref(), &overrides)?;
    let mut meta = ResponseMeta::default();

    if let Commands::Index { full, .. } = &cli.command {
        let restored = if *full { 0 } else { workspace.load().await? };
        let (stats, stored) = workspace.refresh().await?;
        log::info!(
            "Indexed {} units ({} unchanged, {} failed) in {}ms",
            stats.indexed,
            stats.unchanged,
            stats.failed.len(),
            stats.time_ms
        );
        meta.reindexed = Some(stats.indexed);
        let engine = workspace.engine();
        fill_meta(&mut meta, &engine);

        let report = IndexReport {
            root: workspace.root().display().to_string(),
            store: workspace.store_dir().display().to_string(),
            restored,
            stored,
            stats,
        };
        return Ok((serde_json::to_value(report)?, meta));
    }

    workspace.load().await?;
    if !cli.no_refresh {
        let (stats, _) = workspace.refresh().await?;
        meta.reindexed = Some(stats.indexed);
    }
    let engine = workspace.engine();
    fill_meta(&mut meta, &engine);

    let data = match &cli.command {
        Commands::Index { .. } => Value::Null,
        Commands::Search { query, limit, fuzzy } => {
            if *fuzzy {
                serde_json::to_value(engine.suggest(query, *limit)?)?
            } else {
                serde_json::to_value(engine.search(query, *limit)?)?
            }
        }
        Commands::Definition { name, unit } => {
            serde_json::to_value(engine.find_definition(name, unit.as_deref())?)?
        }
        Commands::References { name, unit } => {
            serde_json::to_value(engine.find_references(name, unit.as_deref())?)?
        }
        Commands::Accesses { name, unit } => {
            serde_json::to_value(engine.data_accesses(name, unit.as_deref())?)?
        }
        Commands::Graph {
            procedure,
            unit,
            depth,
            direction,
        } => match procedure {
            Some(procedure) => {
                let reference = ProcedureRef::parse(procedure)?.in_unit(unit.as_deref());
                let graph = engine.call_graph_neighborhood(&reference, *depth, direction.into())?;
                serde_json::to_value(graph)?
            }
            None => serde_json::to_value(engine.program_dependencies())?,
        },
        Commands::Explain {
            procedure,
            unit,
            context,
            max_chars,
        } => {
            let reference = ProcedureRef::parse(procedure)?.in_unit(unit.as_deref());
            serde_json::to_value(engine.excerpt(&reference, *context, *max_chars)?)?
        }
        Commands::Diagnostics { unit, min_severity } => {
            let floor = min_severity.map(Severity::from);
            serde_json::to_value(engine.diagnostics(unit.as_deref(), floor)?)?
        }
        Commands::Stats => serde_json::to_value(StatsReport {
            corpus: engine.stats(),
            units: engine.unit_summaries(None)?,
            programs: engine.program_dependencies(),
        })?,
        Commands::Analytics {
            max_lines,
            max_dependencies,
        } => serde_json::to_value(engine.analytics(&RefactoringThresholds {
            max_source_lines: *max_lines,
            max_dependencies: *max_dependencies,
        }))?,
    };
    Ok((data, meta))
}

fn fill_meta(meta: &mut ResponseMeta, engine: &QueryEngine) {
    meta.units = Some(engine.snapshot().len());
    meta.generation = Some(engine.snapshot().generation());
}

impl From<&DirectionArg> for GraphDirection {
    fn from(arg: &DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => Self::Forward,
            DirectionArg::Backward => Self::Backward,
            DirectionArg::Both => Self::Both,
        }
    }
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Self::Info,
            SeverityArg::Warning => Self::Warning,
            SeverityArg::Error => Self::Error,
        }
    }
}
