use lens_frontend::parser::Access;
use lens_frontend::{DiagnosticKind, Frontend, FrontendConfig, InMemoryResolver, Severity};
use lens_model::{
    CallGraph, Complexity, EdgeKind, EdgeTarget, ModelBuilder, ProcedureKind, ProgramModel,
};
use pretty_assertions::assert_eq;

fn model(unit: &str, text: &str) -> ProgramModel {
    let config = FrontendConfig::default();
    let resolver = InMemoryResolver::new();
    let frontend = Frontend::new(&config, &resolver);
    ModelBuilder::new()
        .analyze(&frontend, unit, None, text)
        .unwrap()
}

fn kinds(model: &ProgramModel) -> Vec<DiagnosticKind> {
    model.diagnostics.iter().map(|d| d.kind).collect()
}

const BALANCE: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. BALUPD.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01  CUSTOMER-REC.
           05  BALANCE          PIC 9(7)V99.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM UPDATE-BALANCE.
           PERFORM MISSING-PARA.
           STOP RUN.
       UPDATE-BALANCE.
           ADD 100 TO BALANCE.
";

#[test]
fn balance_nests_under_customer_record() {
    let model = model("BALUPD", BALANCE);
    assert_eq!(model.program_id.as_deref(), Some("BALUPD"));

    let ids = model.items_named("balance");
    assert_eq!(ids.len(), 1);
    let balance = model.item(ids[0]).unwrap();
    let parent = model.item(balance.parent.unwrap()).unwrap();
    assert_eq!(parent.name.as_deref(), Some("CUSTOMER-REC"));
    assert_eq!(balance.qualified_name(), "BALANCE OF CUSTOMER-REC");
    assert!(parent.is_group(&model.items));

    let update = model.procedure("UPDATE-BALANCE").unwrap();
    assert_eq!(update.accesses.len(), 1);
    assert_eq!(update.accesses[0].item.resolved, vec![balance.id]);
    assert_eq!(update.accesses[0].access, Access::ReadWrite);
    assert_eq!(update.accesses[0].verb, "ADD");
}

#[test]
fn missing_perform_target_is_an_unresolved_edge() {
    let model = model("BALUPD", BALANCE);

    let edges: Vec<_> = model.outgoing("MAIN-PARA").collect();
    assert_eq!(edges.len(), 2);
    assert_eq!(
        edges[0].target,
        EdgeTarget::Resolved {
            key: "UPDATE-BALANCE".to_string()
        }
    );
    assert_eq!(
        edges[1].target,
        EdgeTarget::Unresolved {
            name: "MISSING-PARA".to_string()
        }
    );

    let dangling: Vec<_> = model
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::DanglingTarget)
        .collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].severity, Severity::Warning);
    assert_eq!(dangling[0].range.line, 10);
    assert!(model.has_diagnostics());
}

#[test]
fn rebuilding_is_byte_identical() {
    let first = serde_json::to_string(&model("BALUPD", BALANCE)).unwrap();
    let second = serde_json::to_string(&model("BALUPD", BALANCE)).unwrap();
    assert_eq!(first, second);
}

const DATA_QUIRKS: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. QUIRKS.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01  ORDER-REC.
           05  ORDER-ID         PIC 9(6).
           05  ORDER-LINE.
               10  ITEM-QTY     PIC 9(3).
             07  ODD-LEVEL      PIC X.
           05  STATUS-CODE      PIC X.
               88  STATUS-OK    VALUE 'Y'.
       01  CUSTOMER-REC.
           05  ORDER-ID         PIC 9(6).
       01  WS-DATE-X REDEFINES WS-DATE.
           05  WS-YEAR          PIC 9(4).
       01  WS-DATE              PIC 9(8).
       01  WS-DATE-Y REDEFINES WS-DATE PIC X(8).
       01  WS-TABLE.
           05  WS-ENTRY OCCURS 1 TO 10 DEPENDING ON WS-MISSING PIC X.
           05  WS-ROW OCCURS 1 TO 10 DEPENDING ON WS-COUNT PIC X.
       77  WS-COUNT             PIC 9(2).
";

#[test]
fn duplicate_names_need_qualification() {
    let model = model("QUIRKS", DATA_QUIRKS);
    assert_eq!(model.program_id.as_deref(), Some("QUIRKS"));
    assert_eq!(model.resolve_item("ORDER-ID", &[]).len(), 2);

    let qualified = model.resolve_item("order-id", &["CUSTOMER-REC".to_string()]);
    assert_eq!(qualified.len(), 1);
    let item = model.item(qualified[0]).unwrap();
    assert_eq!(item.qualification, vec!["CUSTOMER-REC".to_string()]);
}

#[test]
fn parent_chains_strictly_decrease_in_level() {
    let model = model("QUIRKS", DATA_QUIRKS);
    for item in &model.items {
        let mut level = item.level;
        for ancestor in model.parent_chain(item.id) {
            assert!(ancestor.level < level, "{} under {}", item.qualified_name(), ancestor.qualified_name());
            level = ancestor.level;
        }
    }

    let condition = model.item(model.items_named("STATUS-OK")[0]).unwrap();
    assert!(condition.is_condition());
    let owner = model.item(condition.parent.unwrap()).unwrap();
    assert_eq!(owner.name.as_deref(), Some("STATUS-CODE"));
}

#[test]
fn data_quirks_are_reported_not_fatal() {
    let model = model("QUIRKS", DATA_QUIRKS);
    let kinds = kinds(&model);
    assert!(kinds.contains(&DiagnosticKind::LevelNesting));
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == DiagnosticKind::UnresolvedRedefines)
            .count(),
        1
    );
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == DiagnosticKind::UnresolvedOccursCounter)
            .count(),
        1
    );

    let forward = model.item(model.items_named("WS-DATE-X")[0]).unwrap();
    let redefines = forward.redefines.as_ref().unwrap();
    assert!(redefines.resolved.is_empty());

    let backward = model.item(model.items_named("WS-DATE-Y")[0]).unwrap();
    let target = backward.redefines.as_ref().unwrap().unique().unwrap();
    assert!(target < backward.id);
    assert_eq!(model.item(target).unwrap().name.as_deref(), Some("WS-DATE"));

    let row = model.item(model.items_named("WS-ROW")[0]).unwrap();
    let occurs = row.occurs.as_ref().unwrap();
    assert!(occurs.is_variable());
    let counter = occurs.depending_on.as_ref().unwrap().unique().unwrap();
    assert_eq!(model.item(counter).unwrap().level, 77);
}

const CONTROL: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. CONTROL1.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01  WS-I                 PIC 9(2).
       PROCEDURE DIVISION.
       MAIN SECTION.
       START-UP.
           PERFORM STEP-A THRU STEP-C.
           PERFORM VARYING WS-I FROM 1 BY 1 UNTIL WS-I > 3
               PERFORM STEP-B
           END-PERFORM.
           GO TO FINISH.
       STEP-A.
           PERFORM STEP-B.
       STEP-B.
           PERFORM STEP-A.
       STEP-C.
           CALL 'SUBPGM' USING WS-I.
       FINISH.
           STOP RUN.
       AUX SECTION.
       STEP-A.
           EXIT.
";

#[test]
fn procedure_keys_are_scoped_and_stable() {
    let model = model("CONTROL1", CONTROL);
    assert_eq!(model.program_id.as_deref(), Some("CONTROL1"));
    let keys: Vec<&str> = model.procedures.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "MAIN",
            "MAIN::START-UP",
            "MAIN::START-UP::perform#1",
            "MAIN::STEP-A",
            "MAIN::STEP-B",
            "MAIN::STEP-C",
            "MAIN::FINISH",
            "AUX",
            "AUX::STEP-A",
        ]
    );
    let inline = model.procedure("MAIN::START-UP::perform#1").unwrap();
    assert_eq!(inline.kind, ProcedureKind::InlinePerform);
    assert_eq!(inline.parent.as_deref(), Some("MAIN::START-UP"));
    assert_eq!(model.metrics.sections, 2);
    assert_eq!(model.metrics.paragraphs, 6);
}

#[test]
fn same_section_paragraph_wins_over_other_sections() {
    let model = model("CONTROL1", CONTROL);
    let from_b: Vec<_> = model.outgoing("MAIN::STEP-B").collect();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].target.resolved_key(), Some("MAIN::STEP-A"));
    assert!(!kinds(&model).contains(&DiagnosticKind::AmbiguousTarget));

    let thru = model
        .outgoing("MAIN::START-UP")
        .find(|e| e.kind == EdgeKind::Perform)
        .unwrap();
    assert_eq!(thru.thru.as_ref().and_then(EdgeTarget::resolved_key), Some("MAIN::STEP-C"));
}

#[test]
fn calls_are_external_links() {
    let model = model("CONTROL1", CONTROL);
    assert_eq!(model.external_calls, vec!["SUBPGM".to_string()]);
    let call = model
        .outgoing("MAIN::STEP-C")
        .find(|e| e.kind == EdgeKind::Call)
        .unwrap();
    assert_eq!(
        call.target,
        EdgeTarget::External {
            program: "SUBPGM".to_string()
        }
    );
    let info = model
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::ExternalCall)
        .unwrap();
    assert_eq!(info.severity, Severity::Info);
}

#[test]
fn call_graph_finds_perform_cycles_and_reachability() {
    let model = model("CONTROL1", CONTROL);
    let graph = CallGraph::build(&model);

    assert_eq!(
        graph.perform_cycles(),
        vec![vec!["MAIN::STEP-A".to_string(), "MAIN::STEP-B".to_string()]]
    );

    let reached = graph.reachable_from("MAIN::STEP-A").unwrap();
    assert_eq!(
        reached.into_iter().collect::<Vec<_>>(),
        vec!["MAIN::STEP-A".to_string(), "MAIN::STEP-B".to_string()]
    );

    // THRU expands to every paragraph in the range
    let callees = graph.callees("MAIN::START-UP").unwrap();
    assert_eq!(
        callees,
        vec![
            "MAIN::FINISH",
            "MAIN::START-UP::perform#1",
            "MAIN::STEP-A",
            "MAIN::STEP-B",
            "MAIN::STEP-C",
        ]
    );
    assert!(!graph.reachable_from("MAIN::FINISH").unwrap().contains("MAIN::FINISH"));
    assert!(graph.reachable_from("NOPE").is_err());
}

#[test]
fn ambiguous_target_keeps_every_candidate() {
    let model = model(
        "AMBIG",
        "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. AMBIG.
       PROCEDURE DIVISION.
       FIRST-SEC SECTION.
       DUP-PARA.
           EXIT.
       SECOND-SEC SECTION.
       DUP-PARA.
           EXIT.
       THIRD-SEC SECTION.
       CALLER.
           PERFORM DUP-PARA.
",
    );
    assert_eq!(model.program_id.as_deref(), Some("AMBIG"));
    let edge = model.outgoing("THIRD-SEC::CALLER").next().unwrap();
    assert_eq!(
        edge.target,
        EdgeTarget::Ambiguous {
            name: "DUP-PARA".to_string(),
            candidates: vec![
                "FIRST-SEC::DUP-PARA".to_string(),
                "SECOND-SEC::DUP-PARA".to_string(),
            ],
        }
    );
    assert!(kinds(&model).contains(&DiagnosticKind::AmbiguousTarget));
}

#[test]
fn metrics_follow_decisions_and_items() {
    let model = model("CONTROL1", CONTROL);
    assert_eq!(model.metrics.data_items, 1);
    // the inline PERFORM VARYING is the only decision
    assert_eq!(model.metrics.decisions, 1);
    assert_eq!(model.metrics.complexity(), Complexity::Low);
    assert_eq!(model.metrics.source_lines, 24);
}

const NUMBERED: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. NUMBERED.
       PROCEDURE DIVISION.
       0100.
           PERFORM 0200 THRU 0300.
           STOP RUN.
       0200.
           PERFORM 0900.
       0300.
           EXIT.
";

#[test]
fn numeric_paragraph_names_are_procedures() {
    let model = model("NUMBERED", NUMBERED);
    assert_eq!(model.program_id.as_deref(), Some("NUMBERED"));
    let keys: Vec<&str> = model.procedures.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["0100", "0200", "0300"]);
    assert!(!kinds(&model).contains(&DiagnosticKind::OpaqueStatement));

    let perform = model.outgoing("0100").next().unwrap();
    assert_eq!(perform.target.resolved_key(), Some("0200"));
    assert_eq!(perform.thru.as_ref().and_then(EdgeTarget::resolved_key), Some("0300"));

    let dangling = model.outgoing("0200").next().unwrap();
    assert_eq!(
        dangling.target,
        EdgeTarget::Unresolved {
            name: "0900".to_string()
        }
    );
}
