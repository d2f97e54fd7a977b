use super::cursor::Cursor;
use super::statement::data_ref;
use super::tree::{
    Access, DataDivision, DataEntry, DataSection, DataSectionKind, FileDescription,
    FileDescriptionKind, Name, OccursClause, RenamesClause,
};
use super::ParseContext;
use crate::config::DialectExtension;
use crate::diagnostic::DiagnosticKind;
use crate::lexer::{LiteralKind, Token, TokenKind};
use crate::source::SourceRange;

const USAGE_WORDS: &[&str] = &[
    "DISPLAY", "COMP", "COMP-1", "COMP-2", "COMP-3", "COMP-4", "COMP-5", "COMPUTATIONAL",
    "COMPUTATIONAL-1", "COMPUTATIONAL-2", "COMPUTATIONAL-3", "COMPUTATIONAL-4",
    "COMPUTATIONAL-5", "BINARY", "PACKED-DECIMAL", "INDEX", "POINTER",
];

/// Words that start a new clause and so end a VALUE literal list
const CLAUSE_WORDS: &[&str] = &[
    "PIC", "PICTURE", "USAGE", "OCCURS", "REDEFINES", "VALUE", "VALUES", "RENAMES", "SIGN",
    "JUSTIFIED", "JUST", "SYNCHRONIZED", "SYNC", "BLANK", "EXTERNAL", "GLOBAL",
];

/// Level number of a data description entry, if the token is one
pub(crate) fn level_of(token: &Token) -> Option<u8> {
    if token.kind != TokenKind::Literal(LiteralKind::Numeric) {
        return None;
    }
    let level: u8 = token.text.parse().ok()?;
    matches!(level, 1..=49 | 66 | 77 | 88).then_some(level)
}

fn is_clause_word(token: &Token) -> bool {
    let upper = token.upper();
    token.kind == TokenKind::Keyword
        && (CLAUSE_WORDS.contains(&upper.as_str()) || USAGE_WORDS.contains(&upper.as_str()))
}

fn name_of(token: &Token) -> Name {
    Name {
        text: token.text.clone(),
        range: token.range.clone(),
    }
}

impl ParseContext<'_> {
    pub(crate) fn data_division(&mut self, range: SourceRange, body: &[Token]) -> DataDivision {
        let mut cursor = Cursor::new(body);
        let mut sections: Vec<DataSection> = Vec::new();

        while let Some(token) = cursor.peek() {
            if token.is_word() && cursor.peek_at(1).is_some_and(|t| t.is_keyword("SECTION")) {
                self.check_area_a(token, "section header");
                cursor.next();
                cursor.next();
                let end = cursor.eat_period().unwrap_or(token);
                sections.push(DataSection {
                    kind: DataSectionKind::from_word(&token.text),
                    name: Some(name_of(token)),
                    range: token.range.to(&end.range),
                    files: Vec::new(),
                    entries: Vec::new(),
                });
                continue;
            }

            if token.is_keyword("FD") || token.is_keyword("SD") {
                if let Some(fd) = self.file_description(&mut cursor) {
                    current_section(&mut sections, &fd.range).files.push(fd);
                }
                continue;
            }

            if let Some(level) = level_of(token) {
                cursor.next();
                let entry = self.data_entry(&mut cursor, token, level);
                let section = current_section(&mut sections, &entry.range);
                // records under an FD belong to it until the next FD or section
                match section.files.last_mut() {
                    Some(fd) if section.kind == DataSectionKind::File => fd.records.push(entry),
                    _ => section.entries.push(entry),
                }
                continue;
            }

            if token.is_keyword("EXEC") && self.config.allows(DialectExtension::ExecBlocks) {
                let rest = &cursor.tokens()[cursor.pos()..];
                match rest.iter().position(|t| t.is_keyword("END-EXEC")) {
                    Some(offset) => {
                        for _ in 0..=offset {
                            cursor.next();
                        }
                        cursor.eat_period();
                    }
                    None => {
                        cursor.skip_past_period();
                    }
                }
                continue;
            }

            cursor.next();
            let start = token;
            cursor.skip_to_period();
            let last = cursor.eat_period().or_else(|| cursor.previous()).unwrap_or(start);
            let text = self.verbatim(start, last);
            self.diagnostic(
                DiagnosticKind::OpaqueStatement,
                start.range.to(&last.range),
                format!("unrecognized data description: {}", text.trim()),
            );
        }

        for section in &mut sections {
            let last_entry = section.entries.last().map(|e| e.range.clone());
            let last_file = section.files.last().map(|fd| {
                fd.records
                    .last()
                    .map_or_else(|| fd.range.clone(), |r| r.range.clone())
            });
            let end = last_entry
                .into_iter()
                .chain(last_file)
                .max_by_key(|r| (r.end_line, r.end_col));
            if let Some(end) = end {
                section.range = section.range.to(&end);
            }
            for fd in &mut section.files {
                if let Some(last) = fd.records.last() {
                    fd.range = fd.range.to(&last.range);
                }
            }
        }

        DataDivision { range, sections }
    }

    /// `FD name [clauses].`; records are attached by the caller
    fn file_description(&mut self, cursor: &mut Cursor<'_>) -> Option<FileDescription> {
        let fd_token = cursor.next()?;
        self.check_area_a(fd_token, "file description");
        let kind = if fd_token.is_keyword("SD") {
            FileDescriptionKind::Sd
        } else {
            FileDescriptionKind::Fd
        };

        let Some(name_token) = cursor.peek().filter(|t| t.kind == TokenKind::Identifier) else {
            self.diagnostic(
                DiagnosticKind::OpaqueStatement,
                fd_token.range.clone(),
                format!("{} without a file name", fd_token.text),
            );
            cursor.skip_past_period();
            return None;
        };
        cursor.next();
        let end = cursor.skip_past_period().unwrap_or(name_token);

        Some(FileDescription {
            kind,
            name: name_of(name_token),
            range: fd_token.range.to(&end.range),
            records: Vec::new(),
        })
    }

    /// Clauses of one entry; the level number has already been consumed
    fn data_entry(&mut self, cursor: &mut Cursor<'_>, level_token: &Token, level: u8) -> DataEntry {
        if level == 1 || level == 77 {
            self.check_area_a(level_token, "level");
        }

        let name = match cursor.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                cursor.next();
                Some(name_of(token))
            }
            Some(token) if token.is_keyword("FILLER") => {
                cursor.next();
                None
            }
            _ => None,
        };

        let mut entry = DataEntry {
            level,
            name,
            range: level_token.range.clone(),
            picture: None,
            usage: None,
            redefines: None,
            occurs: None,
            value: None,
            renames: None,
        };

        while let Some(token) = cursor.peek() {
            if token.is_period() {
                break;
            }
            // a new entry on its own line means the period was forgotten
            if token.starts_line && level_of(token).is_some() {
                break;
            }
            cursor.next();

            let upper = token.upper();
            match upper.as_str() {
                "REDEFINES" => {
                    entry.redefines = cursor
                        .peek()
                        .filter(|t| t.kind == TokenKind::Identifier)
                        .map(name_of);
                    if entry.redefines.is_some() {
                        cursor.next();
                    }
                }
                "PIC" | "PICTURE" => {
                    cursor.eat_keyword("IS");
                    entry.picture = cursor.next().map(|t| t.text.clone());
                }
                "USAGE" => {
                    cursor.eat_keyword("IS");
                    entry.usage = cursor.next().map(Token::upper);
                }
                "OCCURS" => entry.occurs = Some(occurs(cursor)),
                "VALUE" | "VALUES" => {
                    cursor.eat_keyword("IS");
                    cursor.eat_keyword("ARE");
                    entry.value = Some(value_text(cursor));
                }
                "RENAMES" => {
                    if let Some(from) = data_ref(cursor, Access::Read, &mut Vec::new()) {
                        let thru = if cursor.eat_keyword("THRU") || cursor.eat_keyword("THROUGH") {
                            data_ref(cursor, Access::Read, &mut Vec::new())
                        } else {
                            None
                        };
                        entry.renames = Some(RenamesClause { from, thru });
                    }
                }
                word if token.kind == TokenKind::Keyword && USAGE_WORDS.contains(&word) => {
                    entry.usage = Some(upper.clone());
                }
                _ => {}
            }
        }

        let last = cursor.eat_period().or_else(|| cursor.previous()).unwrap_or(level_token);
        entry.range = level_token.range.to(&last.range);
        entry
    }
}

/// `OCCURS n [TO m] [TIMES] [DEPENDING [ON] x] [ASCENDING|DESCENDING [KEY] [IS] k...] [INDEXED [BY] i...]`
fn occurs(cursor: &mut Cursor<'_>) -> OccursClause {
    let min = integer(cursor).unwrap_or_default();
    let mut clause = OccursClause {
        min,
        max: min,
        depending_on: None,
        indexed_by: Vec::new(),
    };

    if cursor.eat_keyword("TO") {
        if let Some(max) = integer(cursor) {
            clause.max = max;
        }
    }
    cursor.eat_keyword("TIMES");

    loop {
        if cursor.eat_keyword("DEPENDING") {
            cursor.eat_keyword("ON");
            clause.depending_on = data_ref(cursor, Access::Read, &mut Vec::new());
        } else if cursor.eat_keyword("ASCENDING") || cursor.eat_keyword("DESCENDING") {
            cursor.eat_keyword("KEY");
            cursor.eat_keyword("IS");
            while cursor.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
                cursor.next();
            }
        } else if cursor.eat_keyword("INDEXED") {
            cursor.eat_keyword("BY");
            while let Some(token) = cursor.peek().filter(|t| t.kind == TokenKind::Identifier) {
                clause.indexed_by.push(name_of(token));
                cursor.next();
            }
        } else {
            break;
        }
    }

    clause
}

/// Consume an unsigned integer literal
fn integer(cursor: &mut Cursor<'_>) -> Option<u32> {
    let value = cursor
        .peek()
        .filter(|t| t.kind == TokenKind::Literal(LiteralKind::Numeric))
        .and_then(|t| t.text.parse::<u32>().ok())?;
    cursor.next();
    Some(value)
}

/// Literal text of a VALUE clause up to the next clause or the period
fn value_text(cursor: &mut Cursor<'_>) -> String {
    let mut parts = Vec::new();
    while let Some(token) = cursor.peek() {
        if token.is_period() || is_clause_word(token) {
            break;
        }
        parts.push(token.text.as_str());
        cursor.next();
    }
    parts.join(" ")
}

/// Last section, or an implicit one for entries written before any section header
fn current_section<'s>(sections: &'s mut Vec<DataSection>, range: &SourceRange) -> &'s mut DataSection {
    if sections.is_empty() {
        sections.push(DataSection {
            kind: DataSectionKind::Other,
            name: None,
            range: range.clone(),
            files: Vec::new(),
            entries: Vec::new(),
        });
    }
    let last = sections.len() - 1;
    &mut sections[last]
}
