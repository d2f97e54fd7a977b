use log::debug;
use std::path::PathBuf;

use crate::config::FrontendConfig;
use crate::diagnostic::Diagnostic;
use crate::error::Result;
use crate::lexer::Lexer;
use crate::parser::{Parser, ProgramTree};
use crate::preprocess::{MemberResolver, PreprocessOutput, Preprocessor};
use crate::source::SourceUnit;

/// Everything the frontend knows about one unit
#[derive(Debug, Clone)]
pub struct FrontendOutput {
    pub unit: SourceUnit,
    pub tree: ProgramTree,
    /// Preprocessor, lexer and parser findings ordered by position
    pub diagnostics: Vec<Diagnostic>,
}

/// Preprocess → lex → parse for a single unit
pub struct Frontend<'a> {
    config: &'a FrontendConfig,
    resolver: &'a dyn MemberResolver,
}

impl<'a> Frontend<'a> {
    pub fn new(config: &'a FrontendConfig, resolver: &'a dyn MemberResolver) -> Self {
        Self { config, resolver }
    }

    /// COPY/REPLACE expansion only; callers may inspect the hash before going further
    pub fn preprocess(&self, unit_id: &str, path: Option<PathBuf>, text: &str) -> Result<PreprocessOutput> {
        Preprocessor::new(self.config, self.resolver).expand(unit_id, path, text)
    }

    /// Lex and parse an already expanded unit
    pub fn analyze_expanded(&self, expanded: PreprocessOutput) -> Result<FrontendOutput> {
        let PreprocessOutput { unit, diagnostics } = expanded;
        let lexed = Lexer::new(self.config).tokenize(&unit);
        debug!(
            "{}: {} lines, {} tokens",
            unit.id,
            unit.line_count(),
            lexed.tokens.len()
        );

        let parsed = Parser::new(self.config).parse(&unit, &lexed.tokens)?;

        let mut all = diagnostics;
        all.extend(lexed.diagnostics);
        all.extend(parsed.diagnostics);
        all.sort_by_key(|d| (d.range.line, d.range.start_col));
        debug!("{}: parsed with {} diagnostics", unit.id, all.len());

        Ok(FrontendOutput {
            unit,
            tree: parsed.tree,
            diagnostics: all,
        })
    }

    pub fn analyze(&self, unit_id: &str, path: Option<PathBuf>, text: &str) -> Result<FrontendOutput> {
        let expanded = self.preprocess(unit_id, path, text)?;
        self.analyze_expanded(expanded)
    }
}
