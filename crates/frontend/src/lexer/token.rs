use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::SourceRange;

/// Literal flavors the parser cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    /// Quoted alphanumeric (including X/N/Z/G prefixed forms)
    String,
    Numeric,
    /// The character string following PIC / PICTURE
    Picture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Keyword,
    Identifier,
    Literal(LiteralKind),
    Operator,
    Separator,
    Comment,
    ContinuationMarker,
}

impl TokenKind {
    /// Comments and continuation markers carry no syntax
    #[must_use]
    pub const fn is_trivia(self) -> bool {
        matches!(self, Self::Comment | Self::ContinuationMarker)
    }
}

/// Which fixed-format area the token starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Area {
    /// Columns 8-11
    A,
    /// Column 12 up to the right margin
    B,
    /// Sequence or indicator area (trivia only)
    Margin,
}

/// One physical slice of a token; continued tokens have more than one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPiece {
    pub line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; continued tokens hold the concatenation of their pieces, with a
    /// literal broken on a short line padded out to that line's right margin
    pub text: String,
    /// From the first piece's start to the last piece's end
    pub range: SourceRange,
    pub pieces: Vec<TokenPiece>,
    pub area: Area,
    /// First token on its physical line
    pub starts_line: bool,
}

impl Token {
    /// Upper-cased text, the form every name comparison uses
    #[must_use]
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }

    #[must_use]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(word)
    }

    #[must_use]
    pub fn is_period(&self) -> bool {
        self.kind == TokenKind::Separator && self.text == "."
    }

    #[must_use]
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::Identifier)
    }

    /// Identifier, or an unsigned integer (all-digit paragraph and section names are legal)
    #[must_use]
    pub fn is_procedure_name(&self) -> bool {
        match self.kind {
            TokenKind::Identifier => true,
            TokenKind::Literal(LiteralKind::Numeric) => self.text.chars().all(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.range.line
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} @ {}", self.kind, self.text, self.range)
    }
}
