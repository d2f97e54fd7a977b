//! Recursive-descent parser over the four divisions.
//!
//! ```text
//! tokens ──> division headers located (fatal: none found / header never ends)
//!    │
//!    ├──> IDENTIFICATION  PROGRAM-ID + free-text paragraphs
//!    ├──> ENVIRONMENT     FILE-CONTROL SELECT entries
//!    ├──> DATA            sections, FD/SD, data description entries
//!    └──> PROCEDURE       sections → paragraphs → sentences → statements
//! ```
//!
//! Anything the grammar does not understand inside a division is kept as an opaque
//! statement with a diagnostic; parsing resumes at the next period.

mod cursor;
mod data;
mod procedure;
mod statement;
mod tree;

pub use tree::{
    Access, CallTarget, DataDivision, DataEntry, DataRef, DataSection, DataSectionKind,
    DivisionHeader, DivisionKind, EnvironmentDivision, FileControl, FileDescription,
    FileDescriptionKind, IdentificationDivision, Name, OccursClause, ParagraphNode,
    PerformStatement, ProcedureDivision, ProgramTree, RenamesClause, SectionNode, Sentence,
    Statement, StatementKind,
};

use std::collections::BTreeMap;

use crate::config::FrontendConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{FrontendError, Result};
use crate::lexer::{Area, Token, TokenKind};
use crate::source::{SourceRange, SourceUnit};
use cursor::Cursor;

/// Parse tree plus syntactic diagnostics
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub tree: ProgramTree,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Parser<'a> {
    config: &'a FrontendConfig,
}

/// Per-unit parse state shared by the division parsers
pub(crate) struct ParseContext<'a> {
    config: &'a FrontendConfig,
    unit: &'a SourceUnit,
    diagnostics: Vec<Diagnostic>,
}

struct HeaderSpan {
    kind: DivisionKind,
    /// Index of the first header token
    start: usize,
    /// Index one past the terminating period
    body_start: usize,
}

impl<'a> Parser<'a> {
    pub fn new(config: &'a FrontendConfig) -> Self {
        Self { config }
    }

    /// Parse one expanded unit. Trivia tokens are ignored.
    pub fn parse(&self, unit: &SourceUnit, tokens: &[Token]) -> Result<ParseOutput> {
        let tokens: Vec<Token> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .cloned()
            .collect();

        let headers = locate_headers(&tokens);
        if headers.is_empty() {
            return Err(FrontendError::NoDivisions {
                unit: unit.id.to_string(),
            });
        }

        let mut ctx = ParseContext {
            config: self.config,
            unit,
            diagnostics: Vec::new(),
        };
        let mut tree = ProgramTree {
            unit: unit.id.clone(),
            headers: Vec::new(),
            identification: None,
            environment: None,
            data: None,
            procedure: None,
        };

        let mut spans = Vec::with_capacity(headers.len());
        for (idx, &(kind, start)) in headers.iter().enumerate() {
            let limit = headers.get(idx + 1).map_or(tokens.len(), |&(_, next)| next);
            let Some(period) = (start..limit).find(|&i| tokens[i].is_period()) else {
                return Err(FrontendError::UnterminatedDivision {
                    range: tokens[start].range.to(&tokens[limit - 1].range),
                });
            };
            spans.push(HeaderSpan {
                kind,
                start,
                body_start: period + 1,
            });
        }

        let mut furthest: Option<DivisionKind> = None;
        for (idx, span) in spans.iter().enumerate() {
            let body_end = spans.get(idx + 1).map_or(tokens.len(), |next| next.start);
            let header_tokens = &tokens[span.start..span.body_start];
            let header_range = header_tokens[0]
                .range
                .to(&header_tokens[header_tokens.len() - 1].range);

            ctx.check_area_a(&header_tokens[0], "division header");
            tree.headers.push(DivisionHeader {
                kind: span.kind,
                range: header_range.clone(),
            });

            if let Some(previous) = furthest {
                if span.kind <= previous {
                    ctx.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DivisionOrder,
                        header_range.clone(),
                        format!(
                            "{} DIVISION follows {} DIVISION",
                            span.kind.as_str(),
                            previous.as_str()
                        ),
                    ));
                }
            }
            furthest = furthest.max(Some(span.kind));

            let body = &tokens[span.body_start..body_end];
            let range = body
                .last()
                .map_or_else(|| header_range.clone(), |last| header_range.to(&last.range));

            match span.kind {
                DivisionKind::Identification if tree.identification.is_none() => {
                    tree.identification = Some(ctx.identification(range, body));
                }
                DivisionKind::Environment if tree.environment.is_none() => {
                    tree.environment = Some(ctx.environment(range, body));
                }
                DivisionKind::Data if tree.data.is_none() => {
                    tree.data = Some(ctx.data_division(range, body));
                }
                DivisionKind::Procedure if tree.procedure.is_none() => {
                    tree.procedure = Some(ctx.procedure_division(range, header_tokens, body));
                }
                kind => {
                    log::debug!("Skipping repeated {} DIVISION in {}", kind.as_str(), unit.id);
                }
            }
        }

        log::debug!(
            "Parsed unit {}: {} divisions, {} diagnostics",
            unit.id,
            tree.headers.len(),
            ctx.diagnostics.len()
        );
        Ok(ParseOutput {
            tree,
            diagnostics: ctx.diagnostics,
        })
    }
}

/// `<kind> DIVISION` pairs as (kind, index of the first token)
fn locate_headers(tokens: &[Token]) -> Vec<(DivisionKind, usize)> {
    tokens
        .windows(2)
        .enumerate()
        .filter_map(|(idx, pair)| {
            let kind = DivisionKind::from_word(&pair[0].text)?;
            (pair[0].kind == TokenKind::Keyword && pair[1].is_keyword("DIVISION")).then_some((kind, idx))
        })
        .collect()
}

impl ParseContext<'_> {
    pub(crate) fn diagnostic(&mut self, kind: DiagnosticKind, range: SourceRange, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, range, message));
    }

    /// Headers and 01/77 entries belong in Area A; outside it they are still accepted
    pub(crate) fn check_area_a(&mut self, token: &Token, what: &str) {
        if token.area != Area::A {
            self.diagnostic(
                DiagnosticKind::AreaAViolation,
                token.range.clone(),
                format!("{what} {} should start in Area A (columns 8-11)", token.text),
            );
        }
    }

    /// Verbatim text between two tokens, inclusive
    pub(crate) fn verbatim(&self, first: &Token, last: &Token) -> String {
        self.unit.slice(&first.range.to(&last.range))
    }

    fn identification(&mut self, range: SourceRange, body: &[Token]) -> IdentificationDivision {
        let mut cursor = Cursor::new(body);
        let mut program_id = None;
        let mut paragraphs = BTreeMap::new();

        while let Some(token) = cursor.next() {
            let key = token.upper();
            if !cursor.at_period() {
                // free text without a paragraph keyword
                cursor.skip_past_period();
                continue;
            }
            cursor.next();

            if key == "PROGRAM-ID" {
                if let Some(name_token) = cursor.next() {
                    program_id = Some(Name {
                        text: name_token
                            .text
                            .trim_matches(|c| c == '"' || c == '\'')
                            .to_string(),
                        range: name_token.range.clone(),
                    });
                }
                cursor.skip_past_period();
                continue;
            }

            // AUTHOR. free text up to the next period
            let text_start = cursor.pos();
            cursor.skip_to_period();
            let words: Vec<&str> = body[text_start..cursor.pos()]
                .iter()
                .map(|t| t.text.as_str())
                .collect();
            cursor.next();
            paragraphs.insert(key, words.join(" "));
        }

        IdentificationDivision {
            range,
            program_id,
            paragraphs,
        }
    }

    fn environment(&mut self, range: SourceRange, body: &[Token]) -> EnvironmentDivision {
        let mut cursor = Cursor::new(body);
        let mut file_controls = Vec::new();

        while let Some(token) = cursor.peek() {
            if token.is_keyword("SELECT") {
                if let Some(select) = self.select_entry(&mut cursor) {
                    file_controls.push(select);
                }
            } else {
                cursor.next();
            }
        }

        EnvironmentDivision {
            range,
            file_controls,
        }
    }

    /// `SELECT [OPTIONAL] file ASSIGN [TO] target [ORGANIZATION ...] [FILE STATUS ...].`
    fn select_entry(&mut self, cursor: &mut Cursor<'_>) -> Option<FileControl> {
        let select = cursor.next()?;
        cursor.eat_keyword("OPTIONAL");
        let name_token = cursor.next()?;
        let name = Name {
            text: name_token.text.clone(),
            range: name_token.range.clone(),
        };

        let mut control = FileControl {
            name,
            assign_to: None,
            organization: None,
            access: None,
            status: None,
            range: select.range.clone(),
        };

        let mut last = name_token;
        while let Some(token) = cursor.next() {
            last = token;
            if token.is_period() {
                break;
            }
            match token.upper().as_str() {
                "ASSIGN" => {
                    cursor.eat_keyword("TO");
                    control.assign_to = cursor.next().map(|t| {
                        last = t;
                        t.text.trim_matches(|c| c == '"' || c == '\'').to_string()
                    });
                }
                "ORGANIZATION" => {
                    cursor.eat_keyword("IS");
                    control.organization = cursor.next().map(|t| {
                        last = t;
                        t.upper()
                    });
                }
                "ACCESS" => {
                    cursor.eat_keyword("MODE");
                    cursor.eat_keyword("IS");
                    control.access = cursor.next().map(|t| {
                        last = t;
                        t.upper()
                    });
                }
                "STATUS" => {
                    cursor.eat_keyword("IS");
                    control.status = statement::data_ref(cursor, Access::Write, &mut Vec::new());
                }
                _ => {}
            }
        }

        control.range = select.range.to(&last.range);
        Some(control)
    }
}
