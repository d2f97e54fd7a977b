//! Fixed-format tokenizer.
//!
//! Works one expanded [`SourceLine`] at a time: columns 1-6 are ignored, column 7 is the
//! indicator, the coding area runs from column 8 to the line's right margin. Literals and
//! words continued with a `-` indicator become one token with several pieces.

mod keywords;
mod token;

pub use keywords::{is_figurative, is_reserved, is_verb};
pub use token::{Area, LiteralKind, Token, TokenKind, TokenPiece};

use std::sync::Arc;

use crate::config::{DialectExtension, FrontendConfig};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::source::{SourceLine, SourceRange, SourceUnit, AREA_A_END, INDICATOR_COLUMN};

/// Tokens for a whole unit plus lexical diagnostics
#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LexOutput {
    /// Tokens without comments and continuation markers
    pub fn significant(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| !t.kind.is_trivia())
    }
}

pub struct Lexer<'a> {
    config: &'a FrontendConfig,
    keep_trivia: bool,
}

struct OpenLiteral {
    token: usize,
    quote: char,
    /// Implied spaces between the end of a short line and its right margin
    pad: usize,
}

struct LexState<'u> {
    unit_id: &'u Arc<str>,
    out: LexOutput,
    open_literal: Option<OpenLiteral>,
    /// Word or number that ended its line and may be continued
    continuable: Option<usize>,
    picture_next: bool,
    line_started: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(config: &'a FrontendConfig) -> Self {
        Self {
            config,
            keep_trivia: false,
        }
    }

    /// Builder: also emit comment and continuation-marker tokens
    #[must_use]
    pub fn with_trivia(mut self, keep: bool) -> Self {
        self.keep_trivia = keep;
        self
    }

    pub fn tokenize(&self, unit: &SourceUnit) -> LexOutput {
        let mut state = LexState {
            unit_id: &unit.id,
            out: LexOutput::default(),
            open_literal: None,
            continuable: None,
            picture_next: false,
            line_started: false,
        };

        for line in &unit.lines {
            self.line(&mut state, line);
        }
        if let Some(open) = state.open_literal.take() {
            state.malformed_literal(open.token, "literal is not closed before end of unit");
        }

        log::debug!(
            "Lexed unit {}: {} tokens, {} diagnostics",
            unit.id,
            state.out.tokens.len(),
            state.out.diagnostics.len()
        );
        state.out
    }

    fn is_comment(&self, indicator: Option<char>) -> bool {
        match indicator {
            Some('*' | '/') => true,
            Some('D' | 'd') => !self.config.allows(DialectExtension::DebugLines),
            _ => false,
        }
    }

    fn line(&self, state: &mut LexState<'_>, line: &SourceLine) {
        let chars: Vec<char> = line.text.chars().collect();
        let margin = line.right_margin.min(chars.len());
        let indicator = chars.get(INDICATOR_COLUMN - 1).copied();
        state.line_started = false;

        if self.is_comment(indicator) {
            if self.keep_trivia {
                state.push(
                    line,
                    TokenKind::Comment,
                    &chars,
                    INDICATOR_COLUMN - 1,
                    margin.max(INDICATOR_COLUMN),
                );
            }
            return;
        }

        let first_code = (INDICATOR_COLUMN..margin).find(|&i| !chars[i].is_whitespace());

        if indicator == Some('-') {
            if self.keep_trivia {
                state.push(
                    line,
                    TokenKind::ContinuationMarker,
                    &chars,
                    INDICATOR_COLUMN - 1,
                    INDICATOR_COLUMN,
                );
            }
            let Some(first) = first_code else {
                return;
            };
            let resume = self.continue_token(state, line, &chars, first, margin);
            self.scan(state, line, &chars, resume, margin);
            return;
        }

        let Some(first) = first_code else {
            // blank lines do not break a pending continuation
            return;
        };
        if let Some(open) = state.open_literal.take() {
            state.malformed_literal(open.token, "literal continued without a '-' indicator");
        }
        state.continuable = None;
        self.scan(state, line, &chars, first, margin);
    }

    /// Extend the pending literal or word with the start of a continuation line.
    /// Returns the index where ordinary scanning resumes.
    fn continue_token(
        &self,
        state: &mut LexState<'_>,
        line: &SourceLine,
        chars: &[char],
        first: usize,
        margin: usize,
    ) -> usize {
        if let Some(open) = state.open_literal.take() {
            if chars[first] != open.quote {
                state.malformed_literal(open.token, "continuation line does not resume the literal with a quote");
                return first;
            }
            let (end, closed) = scan_literal_body(chars, first + 1, margin, open.quote);
            state.out.tokens[open.token].text.extend(std::iter::repeat(' ').take(open.pad));
            state.extend(open.token, line, chars, first + 1, end);
            state.line_started = true;
            if !closed {
                state.open_literal = Some(OpenLiteral {
                    pad: line.right_margin.saturating_sub(chars.len()),
                    ..open
                });
            }
            return end;
        }

        if let Some(idx) = state.continuable.take() {
            if is_word_char(chars[first]) {
                let end = word_end(chars, first, margin);
                state.extend(idx, line, chars, first, end);
                state.line_started = true;
                let token = &mut state.out.tokens[idx];
                if token.kind != TokenKind::Literal(LiteralKind::Numeric) {
                    token.kind = self.word_kind(&token.text);
                }
                return end;
            }
        }
        first
    }

    fn word_kind(&self, word: &str) -> TokenKind {
        if is_reserved(word)
            || self
                .config
                .dialect
                .vendor_verbs
                .iter()
                .any(|verb| verb.eq_ignore_ascii_case(word))
        {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        }
    }

    #[allow(clippy::too_many_lines)]
    fn scan(&self, state: &mut LexState<'_>, line: &SourceLine, chars: &[char], from: usize, margin: usize) {
        let inline_comments = self.config.allows(DialectExtension::InlineComments);
        let mut i = from;

        while i < margin {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }

            if inline_comments && c == '*' && chars.get(i + 1) == Some(&'>') && i + 1 < margin {
                if self.keep_trivia {
                    state.push(line, TokenKind::Comment, chars, i, margin);
                }
                break;
            }

            if state.picture_next && !is_separator_at(chars, i, margin) {
                let end = run_end(chars, i, margin);
                let run: String = chars[i..end].iter().collect();
                if run.eq_ignore_ascii_case("IS") {
                    state.push(line, TokenKind::Keyword, chars, i, end);
                } else {
                    state.picture_next = false;
                    state.push(line, TokenKind::Literal(LiteralKind::Picture), chars, i, end);
                }
                i = end;
                continue;
            }

            if let Some(quote_at) = literal_start(chars, i, margin) {
                let quote = chars[quote_at];
                let (end, closed) = scan_literal_body(chars, quote_at + 1, margin, quote);
                let idx = state.push(line, TokenKind::Literal(LiteralKind::String), chars, i, end);
                if !closed {
                    state.open_literal = Some(OpenLiteral {
                        token: idx,
                        quote,
                        pad: line.right_margin.saturating_sub(chars.len()),
                    });
                }
                i = end;
                continue;
            }

            if c.is_ascii_digit() || (matches!(c, '+' | '-') && state.sign_allowed() && next_is_digit(chars, i, margin)) {
                let end = number_end(chars, i, margin);
                let text: String = chars[i..end].iter().collect();
                let kind = if is_numeric(&text) {
                    TokenKind::Literal(LiteralKind::Numeric)
                } else {
                    self.word_kind(&text)
                };
                state.push(line, kind, chars, i, end);
                i = end;
                continue;
            }

            if is_word_start(c) {
                let end = word_end(chars, i, margin);
                let word: String = chars[i..end].iter().collect();
                let kind = self.word_kind(&word);
                state.push(line, kind, chars, i, end);
                if kind == TokenKind::Keyword
                    && (word.eq_ignore_ascii_case("PIC") || word.eq_ignore_ascii_case("PICTURE"))
                {
                    state.picture_next = true;
                }
                i = end;
                continue;
            }

            let two: String = chars[i..(i + 2).min(margin)].iter().collect();
            if matches!(two.as_str(), "**" | ">=" | "<=" | "<>") {
                state.push(line, TokenKind::Operator, chars, i, i + 2);
                i += 2;
                continue;
            }
            let kind = if matches!(c, '+' | '-' | '*' | '/' | '=' | '<' | '>' | '&') {
                TokenKind::Operator
            } else {
                TokenKind::Separator
            };
            state.push(line, kind, chars, i, i + 1);
            i += 1;
        }

        // a word or number running into the end of the line may continue on the next one
        state.continuable = state.out.tokens.last().and_then(|last| {
            let ends_line = last.range.end_line == line.number;
            let continuable = matches!(
                last.kind,
                TokenKind::Keyword | TokenKind::Identifier | TokenKind::Literal(LiteralKind::Numeric)
            );
            (ends_line && continuable && state.open_literal.is_none())
                .then(|| state.out.tokens.len() - 1)
        });
    }
}

impl LexState<'_> {
    /// Append a token covering `chars[start..end]` (0-based) of the line
    fn push(&mut self, line: &SourceLine, kind: TokenKind, chars: &[char], start: usize, end: usize) -> usize {
        let start_col = start as u32 + 1;
        let end_col = end as u32 + 1;
        let area = if kind.is_trivia() || start < INDICATOR_COLUMN {
            Area::Margin
        } else if start < AREA_A_END {
            Area::A
        } else {
            Area::B
        };

        let starts_line = !kind.is_trivia() && !self.line_started;
        if !kind.is_trivia() {
            self.line_started = true;
        }

        self.out.tokens.push(Token {
            kind,
            text: chars[start..end].iter().collect(),
            range: SourceRange::new(Arc::clone(self.unit_id), line.number, start_col, end_col),
            pieces: vec![TokenPiece {
                line: line.number,
                start_col,
                end_col,
            }],
            area,
            starts_line,
        });
        self.out.tokens.len() - 1
    }

    /// Add a continuation piece to an existing token
    fn extend(&mut self, idx: usize, line: &SourceLine, chars: &[char], start: usize, end: usize) {
        let token = &mut self.out.tokens[idx];
        let piece = TokenPiece {
            line: line.number,
            start_col: start as u32 + 1,
            end_col: end as u32 + 1,
        };
        token.text.extend(&chars[start..end]);
        token.pieces.push(piece);
        token.range.end_line = piece.line;
        token.range.end_col = piece.end_col;
    }

    fn malformed_literal(&mut self, idx: usize, message: &str) {
        let range = self.out.tokens[idx].range.clone();
        self.out
            .diagnostics
            .push(Diagnostic::new(DiagnosticKind::MalformedLiteral, range, message));
    }

    /// A leading sign belongs to a number after keywords, operators and `(`
    fn sign_allowed(&self) -> bool {
        match self.out.tokens.iter().rev().find(|t| !t.kind.is_trivia()) {
            None => true,
            Some(prev) => match prev.kind {
                TokenKind::Keyword | TokenKind::Operator => true,
                TokenKind::Separator => prev.text == "(" || prev.text == ",",
                _ => false,
            },
        }
    }
}

const fn is_word_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#' | '@')
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '$' | '#' | '@')
}

fn word_end(chars: &[char], start: usize, margin: usize) -> usize {
    let mut end = start;
    while end < margin && is_word_char(chars[end]) {
        end += 1;
    }
    end.max(start + 1)
}

/// End of a whitespace-delimited run, leaving a trailing separator period/comma out
fn run_end(chars: &[char], start: usize, margin: usize) -> usize {
    let mut end = start;
    while end < margin && !chars[end].is_whitespace() {
        if matches!(chars[end], '.' | ',' | ';') && is_separator_at(chars, end, margin) {
            break;
        }
        end += 1;
    }
    end.max(start + 1)
}

/// A `.`, `,` or `;` followed by a space or the end of the coding area
fn is_separator_at(chars: &[char], i: usize, margin: usize) -> bool {
    matches!(chars[i], '.' | ',' | ';') && (i + 1 >= margin || chars[i + 1].is_whitespace())
}

fn next_is_digit(chars: &[char], i: usize, margin: usize) -> bool {
    i + 1 < margin && chars[i + 1].is_ascii_digit()
}

/// End of a number or digit-led word (`1000-INIT`), including a decimal part
fn number_end(chars: &[char], start: usize, margin: usize) -> usize {
    let mut end = start + 1;
    while end < margin && is_word_char(chars[end]) {
        end += 1;
    }
    if end + 1 < margin && chars[end] == '.' && chars[end + 1].is_ascii_digit() {
        end += 1;
        while end < margin && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    end
}

fn is_numeric(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|&c| c == '.').count() <= 1
        && body.chars().any(|c| c.is_ascii_digit())
}

/// Index of the opening quote if a literal (optionally X/N/Z/G/NX prefixed) starts at `i`
fn literal_start(chars: &[char], i: usize, margin: usize) -> Option<usize> {
    let is_quote = |idx: usize| idx < margin && matches!(chars[idx], '"' | '\'');
    if is_quote(i) {
        return Some(i);
    }
    let prefix = chars[i].to_ascii_uppercase();
    if matches!(prefix, 'X' | 'N' | 'Z' | 'G' | 'B') && is_quote(i + 1) {
        return Some(i + 1);
    }
    if prefix == 'N' && i + 1 < margin && chars[i + 1].eq_ignore_ascii_case(&'X') && is_quote(i + 2) {
        return Some(i + 2);
    }
    None
}

/// Scan literal characters from `from` up to the closing quote.
/// Returns the end index (exclusive) and whether the literal was closed.
fn scan_literal_body(chars: &[char], from: usize, margin: usize, quote: char) -> (usize, bool) {
    let mut j = from;
    while j < margin {
        if chars[j] == quote {
            if j + 1 < margin && chars[j + 1] == quote {
                j += 2;
                continue;
            }
            return (j + 1, true);
        }
        j += 1;
    }
    (margin, false)
}
