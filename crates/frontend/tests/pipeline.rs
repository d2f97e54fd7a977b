use lens_frontend::lexer::Lexer;
use lens_frontend::parser::StatementKind;
use lens_frontend::{
    DiagnosticKind, Frontend, FrontendConfig, FrontendError, InMemoryResolver, TokenKind,
};
use pretty_assertions::assert_eq;

const BALANCE_PROGRAM: &str = "\
000100 IDENTIFICATION DIVISION.
000200 PROGRAM-ID. BALUPD.
000300 DATA DIVISION.
000400 WORKING-STORAGE SECTION.
000500 01  CUSTOMER-REC.
000600     05  BALANCE          PIC 9(7)V99.
000700 PROCEDURE DIVISION.
000800 UPDATE-BALANCE.
000900     ADD 100 TO BALANCE.
001000     STOP RUN.
";

#[test]
fn balance_program_parses_cleanly() {
    let config = FrontendConfig::default();
    let resolver = InMemoryResolver::new();
    let out = Frontend::new(&config, &resolver)
        .analyze("BALUPD", None, BALANCE_PROGRAM)
        .unwrap();

    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    assert_eq!(out.tree.program_id().map(|n| n.text.as_str()), Some("BALUPD"));

    let data = out.tree.data.as_ref().unwrap();
    let entries = &data.sections[0].entries;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].name.as_ref().unwrap().text, "BALANCE");
    assert_eq!(entries[1].picture.as_deref(), Some("9(7)V99"));

    let procedure = out.tree.procedure.as_ref().unwrap();
    let paragraph = procedure.paragraphs().next().unwrap();
    assert_eq!(paragraph.name.as_ref().unwrap().text, "UPDATE-BALANCE");
    let add = &paragraph.sentences[0].statements[0];
    assert_eq!(add.verb, "ADD");
    assert_eq!(add.operands[0].name, "BALANCE");
    assert!(add.operands[0].access.writes());
}

#[test]
fn circular_copy_is_inert_and_rest_of_unit_parses() {
    let resolver = InMemoryResolver::new()
        .with_member("A", "       01  A-REC.\n           COPY B.\n")
        .with_member("B", "           05  B-FIELD PIC X.\n           COPY A.\n");
    let text = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. MAIN.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
           COPY A.
       01  WS-AFTER PIC X.
       PROCEDURE DIVISION.
       MAIN-PARA.
           MOVE 'Y' TO WS-AFTER.
";
    let config = FrontendConfig::default();
    let out = Frontend::new(&config, &resolver).analyze("MAIN", None, text).unwrap();
    assert_eq!(out.tree.program_id().map(|n| n.text.as_str()), Some("MAIN"));

    let cycles: Vec<_> = out
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CircularInclude)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].message.contains("A -> B -> A"), "{}", cycles[0].message);
    assert_eq!(out.unit.copybooks, vec!["A".to_string(), "B".to_string()]);

    let names: Vec<_> = out.tree.data.as_ref().unwrap().sections[0]
        .entries
        .iter()
        .filter_map(|e| e.name.as_ref().map(|n| n.text.clone()))
        .collect();
    assert_eq!(names, vec!["A-REC", "B-FIELD", "WS-AFTER"]);

    let procedure = out.tree.procedure.as_ref().unwrap();
    assert_eq!(procedure.paragraphs().count(), 1);
}

#[test]
fn copied_lines_point_back_at_their_member() {
    let resolver = InMemoryResolver::new().with_member("REC", "       01  COPIED-REC PIC X.\n");
    let text = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. PROV.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
           COPY REC.
";
    let config = FrontendConfig::default();
    let out = Frontend::new(&config, &resolver).analyze("PROV", None, text).unwrap();
    assert_eq!(out.tree.program_id().map(|n| n.text.as_str()), Some("PROV"));
    let entry = &out.tree.data.as_ref().unwrap().sections[0].entries[0];
    let origin = out.unit.origin(entry.range.line).unwrap();
    assert_eq!(origin.file, "REC");
    assert_eq!(origin.line, 1);
    assert_eq!(out.unit.provenance().len(), 1);
}

#[test]
fn token_ranges_slice_back_to_token_text() {
    let text = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. ROUND.
       PROCEDURE DIVISION.
       P1.
           DISPLAY 'HELLO, WORLD' X'4F' WS-COUNT.
           COMPUTE WS-TOTAL = WS-A ** 2 + 1.5.
";
    let config = FrontendConfig::default();
    let resolver = InMemoryResolver::new();
    let expanded = Frontend::new(&config, &resolver)
        .preprocess("ROUND", None, text)
        .unwrap();
    let tokens = Lexer::new(&config).tokenize(&expanded.unit).tokens;
    assert!(!tokens.is_empty());

    for token in tokens.iter().filter(|t| t.kind != TokenKind::Comment) {
        let sliced: String = token
            .pieces
            .iter()
            .map(|p| expanded.unit.line(p.line).unwrap().slice(p.start_col, p.end_col))
            .collect();
        assert_eq!(sliced, token.text, "{token:?}");
    }
}

#[test]
fn unit_without_divisions_fails_whole() {
    let config = FrontendConfig::default();
    let resolver = InMemoryResolver::new();
    let err = Frontend::new(&config, &resolver)
        .analyze("NOISE", None, "       01  JUST-DATA PIC X.\n")
        .unwrap_err();
    assert!(matches!(err, FrontendError::NoDivisions { .. }));
    assert!(err.is_fatal_to_unit());
}

#[test]
fn dialect_extensions_change_what_parses() {
    let text = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. SQLPGM.
       PROCEDURE DIVISION.
       P1.
           EXEC SQL SELECT 1 INTO :WS-X FROM DUAL END-EXEC.
           GOBACK.
";
    let resolver = InMemoryResolver::new();

    let relaxed = FrontendConfig::relaxed();
    let out = Frontend::new(&relaxed, &resolver).analyze("SQLPGM", None, text).unwrap();
    assert_eq!(out.tree.program_id().map(|n| n.text.as_str()), Some("SQLPGM"));
    let paragraph = out.tree.procedure.as_ref().unwrap().paragraphs().next().unwrap().clone();
    assert!(matches!(paragraph.sentences[0].statements[0].kind, StatementKind::Exec { .. }));
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let strict = FrontendConfig::standard();
    let out = Frontend::new(&strict, &resolver).analyze("SQLPGM", None, text).unwrap();
    assert!(out
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::OpaqueStatement));
}
