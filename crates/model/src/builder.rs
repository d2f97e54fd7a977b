use lens_frontend::{Frontend, FrontendOutput};
use std::path::PathBuf;

use crate::data::DataTable;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::procedure::ProcedureTable;
use crate::types::{ProcedureKind, ProgramModel};

/// Build a [`ProgramModel`] from a parsed unit
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelBuilder;

impl ModelBuilder {
    pub const fn new() -> Self {
        Self
    }

    /// Two passes: data division into the item table, then procedures and edges.
    ///
    /// Never fails: everything the passes object to becomes a diagnostic on the model.
    pub fn build(&self, output: FrontendOutput) -> ProgramModel {
        let FrontendOutput {
            unit,
            tree,
            diagnostics,
        } = output;

        // Phase 1: data items
        let data = DataTable::build(&tree);

        // Phase 2: procedures and control edges
        let procedures = ProcedureTable::build(&tree, &data);

        let mut all = diagnostics;
        all.extend(data.diagnostics);
        all.extend(procedures.diagnostics);
        all.sort_by_key(|d| (d.range.line, d.range.start_col));

        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        let metrics = Metrics {
            source_lines: count(unit.lines.iter().filter(|line| line.depth == 0).count()),
            expanded_lines: count(unit.line_count()),
            statements: procedures.procedures.iter().map(|p| p.statements).sum(),
            decisions: procedures.procedures.iter().map(|p| p.decisions).sum(),
            data_items: count(data.items.len()),
            sections: count(
                procedures
                    .procedures
                    .iter()
                    .filter(|p| p.kind == ProcedureKind::Section)
                    .count(),
            ),
            paragraphs: count(
                procedures
                    .procedures
                    .iter()
                    .filter(|p| p.kind == ProcedureKind::Paragraph)
                    .count(),
            ),
            edges: count(procedures.edges.len()),
            diagnostics: count(all.len()),
        };

        log::debug!(
            "Built model for {}: {} items, {} procedures, {} edges, {} diagnostics",
            unit.id,
            data.items.len(),
            procedures.procedures.len(),
            procedures.edges.len(),
            all.len()
        );

        ProgramModel {
            unit_id: unit.id.clone(),
            program_id: tree.program_id().map(|name| name.upper()),
            path: unit.path.clone(),
            content_hash: unit.content_hash.clone(),
            copybooks: unit.copybooks.clone(),
            external_calls: procedures.external_calls,
            source: unit,
            tree,
            items: data.items,
            names: data.names,
            files: data.files,
            procedures: procedures.procedures,
            procedure_keys: procedures.keys,
            edges: procedures.edges,
            diagnostics: all,
            metrics,
        }
    }

    /// Preprocess, parse and build in one call
    pub fn analyze(
        &self,
        frontend: &Frontend<'_>,
        unit_id: &str,
        path: Option<PathBuf>,
        text: &str,
    ) -> Result<ProgramModel> {
        let output = frontend.analyze(unit_id, path, text)?;
        Ok(self.build(output))
    }
}
