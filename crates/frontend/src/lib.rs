//! # cobol-lens frontend
//!
//! Turns fixed-format COBOL text into a tolerant parse tree.
//!
//! ## Architecture
//!
//! ```text
//! raw text
//!     │
//!     ├──> Preprocessor (COPY splicing, REPLACE regions, provenance per line)
//!     │         └─> SourceUnit
//!     │
//!     ├──> Lexer (sequence / indicator / Area A / Area B, continuation lines)
//!     │         └─> Token[] with column ranges
//!     │
//!     └──> Parser (divisions → sections → paragraphs → sentences → statements)
//!               └─> ProgramTree + Diagnostic[]
//! ```
//!
//! Only structurally unusable units fail with [`FrontendError`]; everything else is
//! reported as a [`Diagnostic`] and parsing carries on.
//!
//! ## Example
//!
//! ```rust
//! use lens_frontend::{Frontend, FrontendConfig, InMemoryResolver};
//!
//! let config = FrontendConfig::default();
//! let resolver = InMemoryResolver::new();
//! let text = "       IDENTIFICATION DIVISION.\n       PROGRAM-ID. HELLO.\n";
//!
//! let output = Frontend::new(&config, &resolver).analyze("HELLO", None, text).unwrap();
//! assert_eq!(output.tree.program_id().map(|n| n.text.as_str()), Some("HELLO"));
//! ```

mod analysis;
mod config;
mod diagnostic;
mod error;
pub mod lexer;
pub mod parser;
pub mod preprocess;
mod source;

pub use analysis::{Frontend, FrontendOutput};
pub use config::{DialectConfig, DialectExtension, FrontendConfig};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use error::{FrontendError, Result};
pub use lexer::{LexOutput, Lexer, Token, TokenKind};
pub use parser::{ParseOutput, Parser, ProgramTree};
pub use preprocess::{InMemoryResolver, MemberResolver, PreprocessOutput, Preprocessor, SearchPathResolver};
pub use source::{Origin, SourceLine, SourceRange, SourceUnit, AREA_A_END, INDICATOR_COLUMN, RIGHT_MARGIN};
