use super::cursor::Cursor;
use super::statement::data_ref;
use super::tree::{Access, DataRef, Name, ParagraphNode, ProcedureDivision, SectionNode, Sentence};
use super::ParseContext;
use crate::config::DialectExtension;
use crate::diagnostic::DiagnosticKind;
use crate::lexer::{Area, Token, TokenKind};
use crate::source::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderKind {
    Section,
    Paragraph,
}

impl ParseContext<'_> {
    /// Whether a section or paragraph header starts at the cursor.
    ///
    /// Mid-sentence only Area A names count; at a sentence start a name in Area B is a
    /// paragraph too when the dialect relaxes Area A.
    pub(crate) fn header_at(&self, cursor: &Cursor<'_>, sentence_start: bool) -> Option<HeaderKind> {
        let token = cursor.peek()?;
        if !token.is_procedure_name() || !token.starts_line {
            return None;
        }
        let next = cursor.peek_at(1)?;

        if next.is_keyword("SECTION") {
            return Some(HeaderKind::Section);
        }
        if next.is_period() {
            if token.area == Area::A {
                return Some(HeaderKind::Paragraph);
            }
            if sentence_start && self.config.allows(DialectExtension::RelaxedAreaA) {
                return Some(HeaderKind::Paragraph);
            }
        }
        None
    }

    pub(crate) fn procedure_division(
        &mut self,
        range: SourceRange,
        header: &[Token],
        body: &[Token],
    ) -> ProcedureDivision {
        let (using, returning) = header_parameters(header);
        let mut cursor = Cursor::new(body);
        let mut sections: Vec<SectionNode> = Vec::new();

        while let Some(token) = cursor.peek() {
            if token.is_keyword("DECLARATIVES") {
                cursor.skip_past_period();
                continue;
            }
            if token.is_keyword("END") && cursor.peek_at(1).is_some_and(|t| t.is_keyword("DECLARATIVES")) {
                cursor.skip_past_period();
                continue;
            }

            match self.header_at(&cursor, true) {
                Some(HeaderKind::Section) => {
                    self.check_area_a(token, "section header");
                    cursor.next();
                    cursor.next();
                    // optional segment number
                    if cursor
                        .peek()
                        .is_some_and(|t| matches!(t.kind, TokenKind::Literal(_)))
                    {
                        cursor.next();
                    }
                    let end = cursor.eat_period().unwrap_or(token);
                    sections.push(SectionNode {
                        name: Some(name_of(token)),
                        range: token.range.to(&end.range),
                        paragraphs: Vec::new(),
                    });
                }
                Some(HeaderKind::Paragraph) => {
                    if token.area != Area::A {
                        self.diagnostic(
                            DiagnosticKind::AreaAViolation,
                            token.range.clone(),
                            format!("paragraph name {} starts in Area B", token.text),
                        );
                    }
                    cursor.next();
                    let end = cursor.eat_period().unwrap_or(token);
                    let range = token.range.to(&end.range);
                    current_section(&mut sections, &range)
                        .paragraphs
                        .push(ParagraphNode {
                            name: Some(name_of(token)),
                            range,
                            sentences: Vec::new(),
                        });
                }
                None => {
                    if let Some(sentence) = self.sentence(&mut cursor) {
                        current_paragraph(&mut sections, &sentence.range)
                            .sentences
                            .push(sentence);
                    }
                }
            }
        }

        for section in &mut sections {
            for paragraph in &mut section.paragraphs {
                if let Some(last) = paragraph.sentences.last() {
                    paragraph.range = paragraph.range.to(&last.range);
                }
            }
            if let Some(last) = section.paragraphs.last() {
                section.range = section.range.to(&last.range);
            }
        }

        ProcedureDivision {
            range,
            using,
            returning,
            sections,
        }
    }

    /// Statements through the terminating period; `None` for a bare period
    fn sentence(&mut self, cursor: &mut Cursor<'_>) -> Option<Sentence> {
        let first = cursor.peek()?;
        let statements = self.statements(cursor, false);
        let period = cursor.eat_period();

        if statements.is_empty() {
            return None;
        }
        let last = period.or_else(|| cursor.previous()).unwrap_or(first);
        Some(Sentence {
            range: first.range.to(&last.range),
            statements,
        })
    }
}

/// `PROCEDURE DIVISION [USING [BY REFERENCE|VALUE] a b ...] [RETURNING r].`
fn header_parameters(header: &[Token]) -> (Vec<DataRef>, Option<DataRef>) {
    let mut cursor = Cursor::new(header.get(2..).unwrap_or_default());
    let mut using = Vec::new();
    let mut returning = None;
    let mut in_returning = false;

    while let Some(token) = cursor.peek() {
        if token.is_keyword("RETURNING") {
            in_returning = true;
        } else if token.kind == TokenKind::Identifier {
            let access = if in_returning { Access::Write } else { Access::Read };
            if let Some(found) = data_ref(&mut cursor, access, &mut Vec::new()) {
                if in_returning {
                    returning = Some(found);
                } else {
                    using.push(found);
                }
            }
            continue;
        }
        cursor.next();
    }

    (using, returning)
}

fn name_of(token: &Token) -> Name {
    Name {
        text: token.text.clone(),
        range: token.range.clone(),
    }
}

/// Last section, or an implicit one for paragraphs written before any section
fn current_section<'s>(sections: &'s mut Vec<SectionNode>, range: &SourceRange) -> &'s mut SectionNode {
    if sections.is_empty() {
        sections.push(SectionNode {
            name: None,
            range: range.clone(),
            paragraphs: Vec::new(),
        });
    }
    let last = sections.len() - 1;
    &mut sections[last]
}

/// Last paragraph, or an anonymous one for sentences written before any paragraph
fn current_paragraph<'s>(sections: &'s mut Vec<SectionNode>, range: &SourceRange) -> &'s mut ParagraphNode {
    let section = current_section(sections, range);
    if section.paragraphs.is_empty() {
        section.paragraphs.push(ParagraphNode {
            name: None,
            range: range.clone(),
            sentences: Vec::new(),
        });
    }
    let last = section.paragraphs.len() - 1;
    &mut section.paragraphs[last]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse, parse_with};
    use super::super::StatementKind;
    use crate::config::FrontendConfig;
    use crate::diagnostic::DiagnosticKind;
    use crate::config::DialectExtension;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections_paragraphs_and_anonymous_nodes() {
        let out = parse(
            "       PROCEDURE DIVISION USING LK-AREA.\n\
             \x20          DISPLAY 'START'.\n\
             \x20      MAIN-LOGIC SECTION.\n\
             \x20          DISPLAY 'IN SECTION'.\n\
             \x20      STEP-ONE.\n\
             \x20          PERFORM STEP-TWO.\n\
             \x20      STEP-TWO.\n\
             \x20          STOP RUN.\n",
        );
        let procedure = out.tree.procedure.unwrap();
        assert_eq!(procedure.using.len(), 1);
        assert_eq!(procedure.using[0].name, "LK-AREA");

        assert_eq!(procedure.sections.len(), 2);
        let implicit = &procedure.sections[0];
        assert!(implicit.name.is_none());
        assert!(implicit.paragraphs[0].name.is_none());

        let main = &procedure.sections[1];
        assert_eq!(main.name.as_ref().unwrap().text, "MAIN-LOGIC");
        let names: Vec<Option<&str>> = main
            .paragraphs
            .iter()
            .map(|p| p.name.as_ref().map(|n| n.text.as_str()))
            .collect();
        assert_eq!(names, vec![None, Some("STEP-ONE"), Some("STEP-TWO")]);
        assert_eq!(main.range.end_line, 8);
    }

    #[test]
    fn area_b_paragraph_names_depend_on_dialect() {
        let text = "       PROCEDURE DIVISION.\n\
                    \x20          P1.\n\
                    \x20          DISPLAY 'X'.\n";

        let strict = parse(text);
        assert_eq!(strict.diagnostics.len(), 1);
        assert_eq!(strict.diagnostics[0].kind, DiagnosticKind::OpaqueStatement);

        let relaxed_config = FrontendConfig::default().with_extension(DialectExtension::RelaxedAreaA);
        let relaxed = parse_with(&relaxed_config, text).unwrap();
        assert_eq!(relaxed.diagnostics.len(), 1);
        assert_eq!(relaxed.diagnostics[0].kind, DiagnosticKind::AreaAViolation);
        let procedure = relaxed.tree.procedure.unwrap();
        let para = &procedure.sections[0].paragraphs[0];
        assert_eq!(para.name.as_ref().map(|n| n.text.as_str()), Some("P1"));
        assert!(matches!(para.sentences[0].statements[0].kind, StatementKind::Plain));
    }

    #[test]
    fn missing_period_before_area_a_header_still_splits_paragraphs() {
        let out = parse(
            "       PROCEDURE DIVISION.\n\
             \x20      P1.\n\
             \x20          MOVE 1 TO X\n\
             \x20      P2.\n\
             \x20          MOVE 2 TO Y.\n",
        );
        let procedure = out.tree.procedure.unwrap();
        let paragraphs: Vec<_> = procedure.paragraphs().collect();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].sentences.len(), 1);
        assert_eq!(paragraphs[1].sentences[0].statements[0].operands[0].name, "Y");
    }
}
