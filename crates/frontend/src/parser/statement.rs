//! Statement grammar and data-reference extraction.
//!
//! Statements are flat: conditional bodies (IF / EVALUATE / AT END ...) are not nested,
//! every verb simply starts a new statement. Only inline PERFORM bodies nest, because
//! they become their own procedure node.

use super::cursor::Cursor;
use super::tree::{Access, CallTarget, DataRef, Name, PerformStatement, Statement, StatementKind};
use super::ParseContext;
use crate::config::DialectExtension;
use crate::diagnostic::DiagnosticKind;
use crate::lexer::{is_verb, LiteralKind, Token, TokenKind};
use crate::source::SourceRange;

/// Keywords after which operands change role (MOVE a TO b, ADD a TO b GIVING c, ...)
const PHASE_WORDS: &[&str] = &[
    "TO", "FROM", "INTO", "GIVING", "REMAINDER", "BY", "POINTER", "COUNT", "TALLYING",
    "DELIMITER", "REPLACING", "CONVERTING", "FOR", "UP", "DOWN", "USING", "RETURNING", "KEY",
    "VARYING", "AFTER", "UNTIL",
];

/// `name [(subscripts)] [OF|IN qualifier]...`. Names used inside subscripts are pushed to
/// `nested` as reads.
pub(crate) fn data_ref(cursor: &mut Cursor<'_>, access: Access, nested: &mut Vec<DataRef>) -> Option<DataRef> {
    let token = cursor.peek()?;
    if token.kind != TokenKind::Identifier {
        return None;
    }
    cursor.next();

    let mut data_ref = DataRef {
        name: token.text.clone(),
        qualifiers: Vec::new(),
        range: token.range.clone(),
        access,
    };

    loop {
        if cursor.peek().is_some_and(|t| t.text == "(") {
            subscripts(cursor, nested);
            continue;
        }
        let qualifier_follows = cursor.peek_at(1).is_some_and(|t| t.kind == TokenKind::Identifier);
        if qualifier_follows && (cursor.at_keyword("OF") || cursor.at_keyword("IN")) {
            cursor.next();
            if let Some(qualifier) = cursor.next() {
                data_ref.qualifiers.push(qualifier.text.clone());
            }
            continue;
        }
        break;
    }

    Some(data_ref)
}

/// Consume a balanced `( ... )` group
fn subscripts(cursor: &mut Cursor<'_>, nested: &mut Vec<DataRef>) {
    cursor.next();
    let mut depth = 1usize;
    while let Some(token) = cursor.peek() {
        if token.is_period() {
            break;
        }
        match token.text.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    cursor.next();
                    break;
                }
            }
            _ if token.kind == TokenKind::Identifier => {
                if let Some(inner) = data_ref(cursor, Access::Read, nested) {
                    nested.push(inner);
                }
                continue;
            }
            _ => {}
        }
        cursor.next();
    }
}

/// Role of an operand given the verb and the last phase keyword seen
fn access_for(verb: &str, phase: Option<&str>, giving: bool, rewrites: bool, adjusts: bool) -> Access {
    use Access::{Read, ReadWrite, Write};

    match (verb, phase) {
        ("MOVE", Some("TO")) => Write,
        ("ADD", Some("TO")) | ("SUBTRACT", Some("FROM")) | ("MULTIPLY", Some("BY")) | ("DIVIDE", Some("INTO")) => {
            if giving {
                Read
            } else {
                ReadWrite
            }
        }
        ("ADD" | "SUBTRACT" | "MULTIPLY" | "DIVIDE", Some("GIVING" | "REMAINDER")) => Write,
        ("COMPUTE" | "INITIALIZE" | "ACCEPT" | "WRITE" | "REWRITE" | "RELEASE", None) => Write,
        ("SET", None) => {
            if adjusts {
                ReadWrite
            } else {
                Write
            }
        }
        ("READ" | "RETURN" | "STRING" | "UNSTRING", Some("INTO"))
        | ("UNSTRING", Some("DELIMITER" | "COUNT")) => Write,
        ("STRING" | "UNSTRING", Some("POINTER")) | ("UNSTRING" | "INSPECT", Some("TALLYING")) => ReadWrite,
        ("INSPECT", None) => {
            if rewrites {
                ReadWrite
            } else {
                Read
            }
        }
        ("PERFORM" | "SEARCH", Some("VARYING" | "AFTER")) => ReadWrite,
        _ => Read,
    }
}

/// Data references in a statement's tokens, classified by role
pub(crate) fn operands(verb: &str, tokens: &[Token]) -> Vec<DataRef> {
    let has = |word: &str| tokens.iter().any(|t| t.is_keyword(word));
    let giving = has("GIVING");
    let rewrites = has("REPLACING") || has("CONVERTING");
    let adjusts = has("UP") || has("DOWN");

    let mut cursor = Cursor::new(tokens);
    let mut out = Vec::new();
    let mut phase: Option<String> = None;
    let mut after_function = false;

    while let Some(token) = cursor.peek() {
        match token.kind {
            TokenKind::Identifier if after_function => {
                after_function = false;
            }
            TokenKind::Identifier => {
                let mut access = access_for(verb, phase.as_deref(), giving, rewrites, adjusts);
                if verb == "COMPUTE" && phase.is_some() {
                    access = Access::Read;
                }
                let mut nested = Vec::new();
                if let Some(found) = data_ref(&mut cursor, access, &mut nested) {
                    out.push(found);
                    out.append(&mut nested);
                }
                if verb == "INSPECT" && phase.as_deref() == Some("TALLYING") {
                    // only the counter right after TALLYING is updated
                    phase = Some("FOR".to_string());
                }
                continue;
            }
            TokenKind::Operator if token.text == "=" && verb == "COMPUTE" => {
                phase = Some("=".to_string());
            }
            TokenKind::Keyword => {
                let word = token.upper();
                if word == "FUNCTION" {
                    after_function = true;
                } else if PHASE_WORDS.contains(&word.as_str()) {
                    phase = Some(word);
                } else if verb == "COMPUTE" && word == "EQUAL" {
                    phase = Some("=".to_string());
                }
            }
            _ => {}
        }
        cursor.next();
    }

    out
}

fn name_of(token: &Token) -> Name {
    Name {
        text: token.text.clone(),
        range: token.range.clone(),
    }
}

fn span(first: &Token, last: Option<&Token>) -> SourceRange {
    last.map_or_else(|| first.range.clone(), |last| first.range.to(&last.range))
}

impl ParseContext<'_> {
    fn is_statement_start(&self, token: &Token) -> bool {
        if token.kind != TokenKind::Keyword {
            return false;
        }
        if token.is_keyword("EXEC") {
            return self.config.allows(DialectExtension::ExecBlocks);
        }
        is_verb(&token.text)
            || self
                .config
                .dialect
                .vendor_verbs
                .iter()
                .any(|verb| verb.eq_ignore_ascii_case(&token.text))
    }

    /// Words that only close or join conditional phrases
    fn is_connective(token: &Token) -> bool {
        token.kind == TokenKind::Keyword
            && (token.text.to_ascii_uppercase().starts_with("END-")
                || token.is_keyword("ELSE")
                || token.is_keyword("THEN"))
    }

    fn at_boundary(&self, cursor: &Cursor<'_>) -> bool {
        match cursor.peek() {
            None => true,
            Some(token) => {
                token.is_period()
                    || self.is_statement_start(token)
                    || (Self::is_connective(token) && !token.is_keyword("END-EXEC"))
                    || self.header_at(cursor, false).is_some()
            }
        }
    }

    /// Tokens up to the next statement boundary
    fn phrase<'t>(&self, cursor: &mut Cursor<'t>) -> &'t [Token] {
        let start = cursor.pos();
        while !self.at_boundary(cursor) {
            cursor.next();
        }
        &cursor.tokens()[start..cursor.pos()]
    }

    /// Statements up to a period, a procedure header, or END-PERFORM when `in_inline`
    pub(crate) fn statements(&mut self, cursor: &mut Cursor<'_>, in_inline: bool) -> Vec<Statement> {
        let mut out = Vec::new();

        while let Some(token) = cursor.peek() {
            if token.is_period() || self.header_at(cursor, false).is_some() {
                break;
            }
            if in_inline && token.is_keyword("END-PERFORM") {
                break;
            }
            if Self::is_connective(token) {
                cursor.next();
                continue;
            }
            if token.is_keyword("NEXT") && cursor.peek_at(1).is_some_and(|t| t.is_keyword("SENTENCE")) {
                cursor.next();
                cursor.next();
                continue;
            }
            cursor.next();
            if self.is_statement_start(token) {
                let statement = self.statement(cursor, token);
                out.push(statement);
            } else {
                let statement = self.opaque(cursor, token);
                out.push(statement);
            }
        }

        out
    }

    fn statement(&mut self, cursor: &mut Cursor<'_>, verb_token: &Token) -> Statement {
        let verb = verb_token.upper();

        match verb.as_str() {
            "PERFORM" => self.perform(cursor, verb_token),
            "GO" => self.go_to(cursor, verb_token),
            "CALL" => self.call(cursor, verb_token),
            "EXEC" => self.exec(cursor, verb_token),
            _ => {
                let phrase = self.phrase(cursor);
                Statement {
                    range: span(verb_token, phrase.last()),
                    operands: operands(&verb, phrase),
                    verb,
                    kind: StatementKind::Plain,
                }
            }
        }
    }

    fn perform(&mut self, cursor: &mut Cursor<'_>, verb_token: &Token) -> Statement {
        let out_of_line = cursor
            .peek()
            .is_some_and(Token::is_procedure_name)
            && !cursor.peek_at(1).is_some_and(|t| t.is_keyword("TIMES"));

        if out_of_line {
            let target = cursor.next().map(name_of);
            let mut thru = None;
            if cursor.eat_keyword("THRU") || cursor.eat_keyword("THROUGH") {
                thru = cursor
                    .peek()
                    .filter(|t| t.is_procedure_name())
                    .map(name_of);
                if thru.is_some() {
                    cursor.next();
                }
            }
            let phrase = self.phrase(cursor);
            let looping = is_loop(phrase);
            return Statement {
                verb: "PERFORM".to_string(),
                range: span(verb_token, cursor.previous()),
                kind: StatementKind::Perform(PerformStatement {
                    target,
                    thru,
                    inline: Vec::new(),
                    looping,
                }),
                operands: operands("PERFORM", phrase),
            };
        }

        let phrase = self.phrase(cursor);
        let looping = is_loop(phrase);
        let body = self.statements(cursor, true);
        cursor.eat_keyword("END-PERFORM");

        Statement {
            verb: "PERFORM".to_string(),
            range: span(verb_token, cursor.previous()),
            kind: StatementKind::Perform(PerformStatement {
                target: None,
                thru: None,
                inline: body,
                looping,
            }),
            operands: operands("PERFORM", phrase),
        }
    }

    /// `GO [TO] p1 [p2 ...] [DEPENDING [ON] x]`
    fn go_to(&mut self, cursor: &mut Cursor<'_>, verb_token: &Token) -> Statement {
        cursor.eat_keyword("TO");
        let mut targets = Vec::new();
        while let Some(token) = cursor.peek() {
            if token.is_procedure_name() {
                targets.push(name_of(token));
            } else if token.text != "," {
                break;
            }
            cursor.next();
        }

        let mut depending = None;
        let mut operands = Vec::new();
        if cursor.eat_keyword("DEPENDING") {
            cursor.eat_keyword("ON");
            depending = data_ref(cursor, Access::Read, &mut operands);
            if let Some(found) = &depending {
                operands.insert(0, found.clone());
            }
        }
        self.phrase(cursor);

        Statement {
            verb: "GO".to_string(),
            range: span(verb_token, cursor.previous()),
            kind: StatementKind::GoTo { targets, depending },
            operands,
        }
    }

    /// `CALL 'PROG' | id [USING [BY REFERENCE|CONTENT|VALUE] args] [RETURNING x]`
    fn call(&mut self, cursor: &mut Cursor<'_>, verb_token: &Token) -> Statement {
        let mut operands = Vec::new();
        let literal = cursor
            .peek()
            .filter(|t| t.kind == TokenKind::Literal(LiteralKind::String));
        let target = if let Some(token) = literal {
            cursor.next();
            CallTarget::Literal(Name {
                text: token.text.trim_matches(|c| c == '"' || c == '\'').to_string(),
                range: token.range.clone(),
            })
        } else if let Some(dynamic) = data_ref(cursor, Access::Read, &mut operands) {
            operands.insert(0, dynamic.clone());
            CallTarget::Dynamic(dynamic)
        } else {
            let phrase = self.phrase(cursor);
            let text = phrase
                .first()
                .zip(phrase.last())
                .map(|(first, last)| self.verbatim(first, last))
                .unwrap_or_default();
            self.diagnostic(
                DiagnosticKind::OpaqueStatement,
                span(verb_token, cursor.previous()),
                "CALL without a program name",
            );
            return Statement {
                verb: "CALL".to_string(),
                range: span(verb_token, cursor.previous()),
                kind: StatementKind::Opaque { text },
                operands,
            };
        };

        let phrase = self.phrase(cursor);
        let mut args = Cursor::new(phrase);
        let mut access = Access::ReadWrite;
        while let Some(token) = args.peek() {
            if token.kind == TokenKind::Identifier {
                let mut nested = Vec::new();
                if let Some(arg) = data_ref(&mut args, access, &mut nested) {
                    operands.push(arg);
                    operands.append(&mut nested);
                }
                continue;
            }
            match token.upper().as_str() {
                "REFERENCE" | "USING" => access = Access::ReadWrite,
                "CONTENT" | "VALUE" => access = Access::Read,
                "RETURNING" | "GIVING" => access = Access::Write,
                _ => {}
            }
            args.next();
        }

        Statement {
            verb: "CALL".to_string(),
            range: span(verb_token, cursor.previous()),
            kind: StatementKind::Call { target },
            operands,
        }
    }

    /// `EXEC ... END-EXEC` kept verbatim
    fn exec(&mut self, cursor: &mut Cursor<'_>, verb_token: &Token) -> Statement {
        let rest = &cursor.tokens()[cursor.pos()..];
        match rest.iter().position(|t| t.is_keyword("END-EXEC")) {
            Some(offset) => {
                for _ in 0..=offset {
                    cursor.next();
                }
            }
            None => cursor.skip_to_period(),
        }

        let last = cursor.previous().unwrap_or(verb_token);
        Statement {
            verb: "EXEC".to_string(),
            range: span(verb_token, Some(last)),
            kind: StatementKind::Exec {
                text: self.verbatim(verb_token, last),
            },
            operands: Vec::new(),
        }
    }

    /// Rest of the sentence, verbatim, with a diagnostic
    fn opaque(&mut self, cursor: &mut Cursor<'_>, first: &Token) -> Statement {
        while let Some(token) = cursor.peek() {
            if token.is_period() || self.header_at(cursor, false).is_some() {
                break;
            }
            cursor.next();
        }

        let last = cursor.previous().unwrap_or(first);
        let range = span(first, Some(last));
        let text = self.verbatim(first, last);
        self.diagnostic(
            DiagnosticKind::OpaqueStatement,
            range.clone(),
            format!("unrecognized statement: {}", text.trim()),
        );

        Statement {
            verb: first.upper(),
            range,
            kind: StatementKind::Opaque { text },
            operands: Vec::new(),
        }
    }
}

fn is_loop(phrase: &[Token]) -> bool {
    phrase
        .iter()
        .any(|t| t.is_keyword("UNTIL") || t.is_keyword("VARYING") || t.is_keyword("TIMES"))
}
