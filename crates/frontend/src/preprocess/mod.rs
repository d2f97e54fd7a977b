//! COPY / REPLACE expansion.
//!
//! ```text
//! raw text ──> split into fixed-format lines
//!     │
//!     ├──> COPY member [OF lib] [REPLACING ...].
//!     │      └─> directive blanked, member lines spliced in after it (recursive,
//!     │          guarded by the open-member stack and the depth limit)
//!     │
//!     └──> REPLACE ==a== BY ==b==. / REPLACE OFF.
//!            └─> directive blanked, active pairs applied to every following line
//! ```
//!
//! Failures of a single directive (missing member, cycle, depth) leave the directive
//! inert and record a diagnostic; the rest of the unit is still produced.

mod replace;
mod resolver;

pub use replace::{MatchMode, Replacement};
pub use resolver::{member_key, InMemoryResolver, MemberResolver, ResolvedMember, SearchPathResolver};

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{DialectExtension, FrontendConfig};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{FrontendError, Result};
use crate::source::{Origin, SourceLine, SourceRange, SourceUnit, INDICATOR_COLUMN, RIGHT_MARGIN};

static COPY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^COPY\s+("[^"]*"|'[^']*'|[A-Z0-9$#@_\-]+)(?:\s+(?:OF|IN)\s+("[^"]*"|'[^']*'|[A-Z0-9$#@_\-]+))?(?:\s+SUPPRESS)?(?:\s+REPLACING\s+(.*?))?\s*\.$"#,
    )
    .expect("valid COPY regex")
});

static REPLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^REPLACE\s+(.*?)\s*\.$").expect("valid REPLACE regex"));

/// Expanded unit plus everything worth reporting about the expansion
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub unit: SourceUnit,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves COPY and REPLACE directives for one unit at a time
pub struct Preprocessor<'a> {
    config: &'a FrontendConfig,
    resolver: &'a dyn MemberResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Copy,
    Replace,
}

/// A directive statement found in a member: char offsets are into the coding area
struct DirectiveSpan {
    kind: DirectiveKind,
    start_line: usize,
    start_offset: usize,
    end_line: usize,
    end_offset: usize,
    text: String,
    terminated: bool,
}

impl DirectiveSpan {
    const fn keyword(&self) -> &'static str {
        match self.kind {
            DirectiveKind::Copy => "COPY",
            DirectiveKind::Replace => "REPLACE",
        }
    }
}

struct Expansion<'u> {
    unit_id: &'u Arc<str>,
    lines: Vec<SourceLine>,
    diagnostics: Vec<Diagnostic>,
    copybooks: Vec<String>,
    active_replace: Vec<Replacement>,
}

impl Expansion<'_> {
    fn next_number(&self) -> u32 {
        self.lines.len() as u32 + 1
    }

    fn range_at(&self, number: u32, start_col: usize, end_col: usize) -> SourceRange {
        SourceRange::new(
            Arc::clone(self.unit_id),
            number,
            start_col as u32,
            end_col.max(start_col + 1) as u32,
        )
    }
}

/// Member text split into fixed-format pieces
struct MemberLine {
    prefix: String,
    content: String,
    tail: String,
    is_comment: bool,
    replaced: bool,
}

impl<'a> Preprocessor<'a> {
    pub fn new(config: &'a FrontendConfig, resolver: &'a dyn MemberResolver) -> Self {
        Self { config, resolver }
    }

    /// Expand one unit's raw text
    pub fn expand(&self, unit_id: &str, path: Option<PathBuf>, text: &str) -> Result<PreprocessOutput> {
        if text.trim().is_empty() {
            return Err(FrontendError::EmptyContent(unit_id.to_string()));
        }

        let unit_id: Arc<str> = Arc::from(unit_id);
        let file_name = path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map_or_else(|| unit_id.to_string(), str::to_string);

        let mut expansion = Expansion {
            unit_id: &unit_id,
            lines: Vec::new(),
            diagnostics: Vec::new(),
            copybooks: Vec::new(),
            active_replace: Vec::new(),
        };
        let mut stack = vec![member_key(&unit_id)];

        let normalized = normalize_line_endings(text);
        self.expand_member(&file_name, &normalized, 0, &mut stack, &[], &mut expansion);

        log::debug!(
            "Expanded unit {unit_id}: {} lines, {} copybooks, {} diagnostics",
            expansion.lines.len(),
            expansion.copybooks.len(),
            expansion.diagnostics.len()
        );

        let Expansion {
            lines,
            diagnostics,
            copybooks,
            ..
        } = expansion;
        Ok(PreprocessOutput {
            unit: SourceUnit::new(Arc::clone(&unit_id), path, lines, copybooks),
            diagnostics,
        })
    }

    fn margin(&self) -> usize {
        if self.config.allows(DialectExtension::LongLines) {
            usize::MAX
        } else {
            RIGHT_MARGIN
        }
    }

    fn is_comment_indicator(&self, indicator: Option<char>) -> bool {
        match indicator {
            Some('*' | '/') => true,
            Some('D' | 'd') => !self.config.allows(DialectExtension::DebugLines),
            _ => false,
        }
    }

    fn split_member(&self, text: &str, copy_replacing: &[Replacement]) -> Vec<MemberLine> {
        let margin = self.margin();
        text.lines()
            .map(|raw| {
                let chars: Vec<char> = raw.chars().collect();
                let prefix_len = chars.len().min(INDICATOR_COLUMN);
                let content_end = chars.len().min(margin);
                let prefix: String = chars[..prefix_len].iter().collect();
                let content: String = chars[prefix_len..content_end.max(prefix_len)].iter().collect();
                let tail: String = chars[content_end.max(prefix_len)..].iter().collect();
                let is_comment = self.is_comment_indicator(chars.get(INDICATOR_COLUMN - 1).copied());

                let mut line = MemberLine {
                    prefix,
                    content,
                    tail,
                    is_comment,
                    replaced: false,
                };
                if !line.is_comment {
                    if let Some(rewritten) = replace::apply(&line.content, copy_replacing) {
                        line.content = rewritten;
                        line.replaced = true;
                    }
                }
                line
            })
            .collect()
    }

    #[allow(clippy::too_many_lines)]
    fn expand_member(
        &self,
        file: &str,
        text: &str,
        depth: u16,
        stack: &mut Vec<String>,
        copy_replacing: &[Replacement],
        out: &mut Expansion<'_>,
    ) {
        let mut lines = self.split_member(text, copy_replacing);
        let mut idx = 0;

        while idx < lines.len() {
            if lines[idx].is_comment {
                self.emit(file, idx, &lines[idx], depth, out, false);
                idx += 1;
                continue;
            }

            let Some(directive) = find_directive(&lines, idx) else {
                self.emit(file, idx, &lines[idx], depth, out, true);
                idx += 1;
                continue;
            };

            blank_directive(&mut lines, &directive);

            let first_number = out.next_number();
            for line_idx in directive.start_line..=directive.end_line {
                self.emit(file, line_idx, &lines[line_idx], depth, out, true);
            }
            let range = out.range_at(
                first_number,
                directive.start_offset + INDICATOR_COLUMN + 1,
                directive.start_offset + INDICATOR_COLUMN + 1 + directive.text.chars().count(),
            );

            if !directive.terminated {
                out.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedDirective,
                    range,
                    format!("{} statement has no terminating period", directive.keyword()),
                ));
                idx = directive.end_line + 1;
                continue;
            }

            match directive.kind {
                DirectiveKind::Copy => {
                    self.handle_copy(&directive.text, range, depth, stack, out);
                }
                DirectiveKind::Replace => self.handle_replace(&directive.text, range, out),
            }

            idx = directive.end_line + 1;
        }
    }

    fn handle_copy(
        &self,
        statement: &str,
        range: SourceRange,
        depth: u16,
        stack: &mut Vec<String>,
        out: &mut Expansion<'_>,
    ) {
        let Some(caps) = COPY_RE.captures(statement) else {
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedDirective,
                range,
                format!("cannot parse COPY statement: {}", statement.trim()),
            ));
            return;
        };

        let name = caps.get(1).map_or("", |m| m.as_str());
        let library = caps.get(2).map(|m| m.as_str());
        let key = member_key(name);

        let replacing = match caps.get(3).map(|m| m.as_str()) {
            Some(body) => match replace::parse_operands(body) {
                Ok(reps) => reps,
                Err(e) => {
                    out.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MalformedDirective,
                        range.clone(),
                        format!("COPY {key} REPLACING: {e}"),
                    ));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if let Some(pos) = stack.iter().position(|open| *open == key) {
            let mut chain: Vec<&str> = stack[pos..].iter().map(String::as_str).collect();
            chain.push(&key);
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::CircularInclude,
                range,
                format!("circular COPY: {}", chain.join(" -> ")),
            ));
            return;
        }

        if usize::from(depth) + 1 > self.config.max_include_depth {
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncludeTooDeep,
                range,
                format!(
                    "COPY {key} exceeds the include depth limit of {}",
                    self.config.max_include_depth
                ),
            ));
            return;
        }

        let Some(member) = self.resolver.resolve(name, library) else {
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnresolvedInclude,
                range,
                format!("COPY member {key} not found on the search path"),
            ));
            return;
        };

        if !out.copybooks.contains(&member.name) {
            out.copybooks.push(member.name.clone());
        }

        let member_file = member
            .path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map_or_else(|| member.name.clone(), str::to_string);
        let text = normalize_line_endings(&member.text);

        stack.push(key);
        self.expand_member(&member_file, &text, depth + 1, stack, &replacing, out);
        stack.pop();
    }

    fn handle_replace(&self, statement: &str, range: SourceRange, out: &mut Expansion<'_>) {
        let Some(body) = REPLACE_RE
            .captures(statement)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
        else {
            out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedDirective,
                range,
                format!("cannot parse REPLACE statement: {}", statement.trim()),
            ));
            return;
        };

        let scoped = self.config.allows(DialectExtension::ScopedReplace);
        if body.eq_ignore_ascii_case("OFF") {
            if scoped {
                out.active_replace.clear();
            } else {
                log::debug!("REPLACE OFF ignored: dialect has no replace scoping");
            }
            return;
        }

        match replace::parse_operands(body) {
            Ok(reps) if scoped => out.active_replace = reps,
            Ok(reps) => out.active_replace.extend(reps),
            Err(e) => out.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedDirective,
                range,
                format!("REPLACE: {e}"),
            )),
        }
    }

    fn emit(
        &self,
        file: &str,
        idx: usize,
        line: &MemberLine,
        depth: u16,
        out: &mut Expansion<'_>,
        apply_replace: bool,
    ) {
        let mut content = line.content.clone();
        let mut replaced = line.replaced;
        if apply_replace && !line.is_comment {
            if let Some(rewritten) = replace::apply(&content, &out.active_replace) {
                content = rewritten;
                replaced = true;
            }
        }

        let (text, right_margin) = if replaced {
            // identification area is dropped: columns after a rewrite no longer line up
            let mut prefix = line.prefix.clone();
            while prefix.chars().count() < INDICATOR_COLUMN {
                prefix.push(' ');
            }
            let text = format!("{prefix}{content}");
            let width = text.chars().count();
            (text, width.max(self.margin().min(RIGHT_MARGIN)))
        } else {
            (
                format!("{}{}{}", line.prefix, content, line.tail),
                self.margin(),
            )
        };

        let number = out.next_number();
        out.lines.push(SourceLine {
            number,
            text,
            origin: Origin {
                file: file.to_string(),
                line: idx as u32 + 1,
            },
            depth,
            replaced,
            right_margin,
        });
    }
}

/// Locate the first COPY/REPLACE statement starting on line `idx` and its end
fn find_directive(lines: &[MemberLine], idx: usize) -> Option<DirectiveSpan> {
    let (kind, start_offset) = find_directive_word(&lines[idx].content)?;

    let mut text = String::new();
    let mut line_idx = idx;
    let mut offset = start_offset;
    loop {
        let chars: Vec<char> = lines[line_idx].content.chars().collect();
        let mut in_literal: Option<char> = None;
        let mut pos = offset;
        while pos < chars.len() {
            let c = chars[pos];
            text.push(c);
            match in_literal {
                Some(q) if c == q => in_literal = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => in_literal = Some(c),
                None if c == '.' && chars.get(pos + 1).map_or(true, |n| n.is_whitespace()) => {
                    return Some(DirectiveSpan {
                        kind,
                        start_line: idx,
                        start_offset,
                        end_line: line_idx,
                        end_offset: pos + 1,
                        text,
                        terminated: true,
                    });
                }
                None => {}
            }
            pos += 1;
        }

        // statement continues on the next non-comment line
        let Some(next) = (line_idx + 1..lines.len()).find(|&n| !lines[n].is_comment) else {
            // only the first line is treated as part of the broken directive
            let first = &lines[idx].content;
            return Some(DirectiveSpan {
                kind,
                start_line: idx,
                start_offset,
                end_line: idx,
                end_offset: first.chars().count(),
                text: first.chars().skip(start_offset).collect(),
                terminated: false,
            });
        };
        text.push(' ');
        line_idx = next;
        offset = 0;
    }
}

/// First COPY or REPLACE word outside a literal, as a char offset into the coding area
fn find_directive_word(content: &str) -> Option<(DirectiveKind, usize)> {
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    let mut in_literal: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = in_literal {
            if c == q {
                in_literal = None;
            }
            i += 1;
            continue;
        }
        if c == '"' || c == '\'' {
            in_literal = Some(c);
            i += 1;
            continue;
        }
        if c == '*' && chars.get(i + 1) == Some(&'>') {
            return None;
        }

        let at_boundary = i == 0 || chars[i - 1].is_whitespace() || chars[i - 1] == '.';
        if at_boundary && !c.is_whitespace() {
            let end = (i..chars.len())
                .find(|&j| chars[j].is_whitespace() || chars[j] == '.')
                .unwrap_or(chars.len());
            let word: String = chars[i..end].iter().collect();
            let follows_ok = chars.get(end).map_or(true, |n| n.is_whitespace());
            if follows_ok && word.eq_ignore_ascii_case("COPY") {
                return Some((DirectiveKind::Copy, i));
            }
            if follows_ok && word.eq_ignore_ascii_case("REPLACE") {
                return Some((DirectiveKind::Replace, i));
            }
            i = end.max(i + 1);
            continue;
        }
        i += 1;
    }
    None
}

fn blank_directive(lines: &mut [MemberLine], directive: &DirectiveSpan) {
    for line_idx in directive.start_line..=directive.end_line {
        let chars: Vec<char> = lines[line_idx].content.chars().collect();
        let from = if line_idx == directive.start_line {
            directive.start_offset
        } else {
            0
        };
        let to = if line_idx == directive.end_line {
            directive.end_offset
        } else {
            chars.len()
        };
        lines[line_idx].content = chars
            .iter()
            .enumerate()
            .map(|(pos, c)| if pos >= from && pos < to { ' ' } else { *c })
            .collect();
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use pretty_assertions::assert_eq;

    fn expand(resolver: &InMemoryResolver, text: &str) -> PreprocessOutput {
        let config = FrontendConfig::default();
        Preprocessor::new(&config, resolver)
            .expand("MAIN", None, text)
            .expect("expand")
    }

    #[test]
    fn splices_copy_member_with_provenance() {
        let resolver = InMemoryResolver::new()
            .with_member("CUSTREC", "       01 CUSTOMER-REC.\n          05 BALANCE PIC 9(7)V99.\n");
        let out = expand(
            &resolver,
            "       DATA DIVISION.\n       WORKING-STORAGE SECTION.\n       COPY CUSTREC.\n       PROCEDURE DIVISION.\n",
        );

        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let texts: Vec<&str> = out.unit.lines.iter().map(|l| l.text.trim()).collect();
        assert_eq!(
            texts,
            vec![
                "DATA DIVISION.",
                "WORKING-STORAGE SECTION.",
                "",
                "01 CUSTOMER-REC.",
                "05 BALANCE PIC 9(7)V99.",
                "PROCEDURE DIVISION.",
            ]
        );

        let provenance = out.unit.provenance();
        assert_eq!(provenance.len(), 2);
        assert_eq!(provenance[&4].file, "CUSTREC");
        assert_eq!(provenance[&4].line, 1);
        assert_eq!(out.unit.copybooks, vec!["CUSTREC".to_string()]);
    }

    #[test]
    fn missing_member_leaves_directive_inert() {
        let out = expand(
            &InMemoryResolver::new(),
            "       COPY NOPE.\n       PROCEDURE DIVISION.\n",
        );
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnresolvedInclude);
        assert_eq!(out.diagnostics[0].range.line, 1);
        assert_eq!(out.unit.lines.len(), 2);
        assert_eq!(out.unit.lines[0].text.trim(), "");
    }

    #[test]
    fn detects_cycle_through_the_unit_itself() {
        let resolver = InMemoryResolver::new()
            .with_member("B", "       01 FROM-B PIC X.\n       COPY MAIN.\n       01 AFTER-B PIC X.\n");
        let out = expand(&resolver, "       COPY B.\n       01 TAIL PIC X.\n");

        let cycle: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::CircularInclude)
            .collect();
        assert_eq!(cycle.len(), 1);
        assert!(cycle[0].message.contains("MAIN -> B -> MAIN"), "{}", cycle[0].message);

        let text = out.unit.text();
        assert!(text.contains("FROM-B"));
        assert!(text.contains("AFTER-B"));
        assert!(text.contains("TAIL"));
    }

    #[test]
    fn copy_replacing_rewrites_member_text() {
        let resolver =
            InMemoryResolver::new().with_member("TPL", "       01 :P:-REC.\n          05 :P:-ID PIC 9.\n");
        let out = expand(&resolver, "       COPY TPL REPLACING ==:P:== BY ==ACCT==.\n");

        let text = out.unit.text();
        assert!(text.contains("01 ACCT-REC."));
        assert!(text.contains("05 ACCT-ID PIC 9."));
        assert!(out.unit.lines[1].replaced);
    }

    #[test]
    fn replace_applies_until_off() {
        let out = expand(
            &InMemoryResolver::new(),
            "       REPLACE ==OLD-AMT== BY ==NEW-AMT==.\n           MOVE OLD-AMT TO X.\n       REPLACE OFF.\n           MOVE OLD-AMT TO Y.\n",
        );
        let texts: Vec<&str> = out.unit.lines.iter().map(|l| l.text.trim()).collect();
        assert_eq!(texts[1], "MOVE NEW-AMT TO X.");
        assert_eq!(texts[3], "MOVE OLD-AMT TO Y.");
    }

    #[test]
    fn directive_spanning_lines_is_blanked_whole() {
        let resolver = InMemoryResolver::new().with_member("X", "       01 X-REC PIC X.\n");
        let out = expand(&resolver, "       COPY X\n           SUPPRESS.\n       01 Y PIC X.\n");
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(out.unit.lines[0].text.trim(), "");
        assert_eq!(out.unit.lines[1].text.trim(), "");
        assert_eq!(out.unit.lines[2].text.trim(), "01 X-REC PIC X.");
    }

    #[test]
    fn unterminated_directive_is_reported() {
        let out = expand(
            &InMemoryResolver::new(),
            "       PROCEDURE DIVISION.\n       COPY NEVER-ENDS\n           DISPLAY X\n",
        );
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::MalformedDirective);
        assert_eq!(out.unit.lines[1].text.trim(), "");
        assert_eq!(out.unit.lines[2].text.trim(), "DISPLAY X");
    }

    #[test]
    fn copy_inside_literal_is_not_a_directive() {
        let out = expand(
            &InMemoryResolver::new(),
            "           DISPLAY \"COPY THIS.\".\n",
        );
        assert!(out.diagnostics.is_empty());
        assert!(out.unit.text().contains("COPY THIS."));
    }
}
