use lens_frontend::{FrontendConfig, InMemoryResolver, Severity};
use lens_indexer::{Corpus, Pipeline};
use lens_protocol::{GraphDirection, MatchKind, ReferenceRole, SymbolKind};
use lens_search::{ProcedureRef, QueryEngine, RefactoringThresholds, SearchError};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const PAYROLL: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. PAYROLL.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
           COPY CUSTREC.
       01  WS-TOTAL           PIC 9(9)V99.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM UPDATE-BALANCE.
           PERFORM LOOP-A.
           CALL 'BILLING'.
           STOP RUN.
       UPDATE-BALANCE.
           ADD 100 TO BALANCE.
           MOVE BALANCE TO WS-TOTAL.
       LOOP-A.
           PERFORM LOOP-B.
       LOOP-B.
           PERFORM LOOP-A.
";

const CUSTREC: &str = "\
\x20      01  CUSTOMER-REC.
           05  BALANCE        PIC 9(7)V99.
";

const BILLING: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. BILLING.
       PROCEDURE DIVISION.
       BILL-PARA.
           GOBACK.
";

const REPORTS: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. REPORTS.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM MISSING-PARA.
           STOP RUN.
";

fn engine_with(units: &[(&str, &str)]) -> QueryEngine {
    let resolver = InMemoryResolver::new().with_member("CUSTREC", CUSTREC);
    let corpus = Arc::new(Corpus::new());
    let pipeline = Pipeline::with_resolver(FrontendConfig::standard(), Arc::new(resolver), Arc::clone(&corpus))
        .expect("pipeline");
    for (unit, text) in units {
        pipeline.ingest_text(unit, None, text).expect("ingest");
    }
    QueryEngine::from_corpus(&corpus)
}

fn engine() -> QueryEngine {
    engine_with(&[("PAYROLL", PAYROLL), ("BILLING", BILLING), ("REPORTS", REPORTS)])
}

fn payroll(target: &str) -> ProcedureRef {
    ProcedureRef::parse(&format!("PAYROLL/{target}")).expect("reference")
}

#[test]
fn definition_of_a_copybook_item_carries_its_origin() {
    let engine = engine();
    let found = engine.find_definition("balance", None).expect("definition");

    assert_eq!(found.len(), 1);
    let balance = &found[0];
    assert_eq!(balance.unit, "PAYROLL");
    assert_eq!(balance.kind, SymbolKind::DataItem);
    assert_eq!(balance.level, Some(5));
    assert!(balance.origin.is_some());

    let qualified = engine
        .find_definition("BALANCE OF CUSTOMER-REC", Some("PAYROLL"))
        .expect("qualified");
    assert_eq!(qualified, found);

    let program = engine.find_definition("BILLING", None).expect("program");
    assert_eq!(program.len(), 1);
    assert_eq!(program[0].kind, SymbolKind::Program);
}

#[test]
fn references_follow_source_order_with_their_roles() {
    let engine = engine();
    let refs = engine.find_references("BALANCE", None).expect("references");

    let roles: Vec<ReferenceRole> = refs.iter().map(|r| r.role).collect();
    assert_eq!(
        roles,
        vec![ReferenceRole::Definition, ReferenceRole::ReadWrite, ReferenceRole::Read]
    );
    assert_eq!(refs[1].procedure.as_deref(), Some("UPDATE-BALANCE"));
    assert_eq!(refs[2].procedure.as_deref(), Some("UPDATE-BALANCE"));

    let performs = engine.find_references("UPDATE-BALANCE", None).expect("performs");
    assert!(performs.iter().any(|r| r.role == ReferenceRole::Perform));
    assert!(performs.iter().any(|r| r.role == ReferenceRole::Definition));
}

#[test]
fn forward_neighborhood_stops_at_depth() {
    let engine = engine();
    let graph = engine
        .call_graph_neighborhood(&payroll("MAIN-PARA"), 1, GraphDirection::Forward)
        .expect("graph");

    let nodes: Vec<(&str, u32)> = graph.nodes.iter().map(|n| (n.id.as_str(), n.distance)).collect();
    assert_eq!(
        nodes,
        vec![
            ("PAYROLL/MAIN-PARA", 0),
            ("PAYROLL/LOOP-A", 1),
            ("PAYROLL/UPDATE-BALANCE", 1),
        ]
    );
    assert_eq!(graph.roots, vec!["PAYROLL/MAIN-PARA".to_string()]);

    let call = graph.edges.iter().find(|e| e.kind == "call").expect("call edge");
    assert!(!call.resolved);
    assert_eq!(call.to, "BILLING");
}

#[test]
fn perform_cycles_terminate_and_report_each_edge_once() {
    let engine = engine();
    let graph = engine
        .call_graph_neighborhood(&payroll("LOOP-A"), 50, GraphDirection::Both)
        .expect("graph");

    let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec![
            "PAYROLL/LOOP-A",
            "PAYROLL/LOOP-B",
            "PAYROLL/MAIN-PARA",
            "PAYROLL/UPDATE-BALANCE",
        ]
    );
    assert_eq!(graph.edges.len(), 5);

    let summaries = engine.unit_summaries(Some("PAYROLL")).expect("summary");
    assert_eq!(
        summaries[0].perform_cycles,
        vec![vec!["LOOP-A".to_string(), "LOOP-B".to_string()]]
    );
}

#[test]
fn ambiguous_names_root_graphs_everywhere_but_refuse_excerpts() {
    let engine = engine();
    let reference = ProcedureRef::parse("MAIN-PARA").expect("reference");

    let graph = engine
        .call_graph_neighborhood(&reference, 0, GraphDirection::Forward)
        .expect("graph");
    assert_eq!(
        graph.roots,
        vec!["PAYROLL/MAIN-PARA".to_string(), "REPORTS/MAIN-PARA".to_string()]
    );

    let err = engine.excerpt(&reference, 0, None).expect_err("ambiguous");
    assert_eq!(err.code(), "ambiguous_procedure");
    assert!(matches!(err, SearchError::AmbiguousProcedure { candidates, .. } if candidates.len() == 2));
}

#[test]
fn search_ranks_exact_then_prefix_then_substring() {
    let engine = engine();
    let hits = engine.search("bal", 50).expect("search");

    let kinds: Vec<MatchKind> = hits.iter().map(|h| h.match_kind).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
    assert_eq!(kinds.first(), Some(&MatchKind::Prefix));
    assert_eq!(kinds.last(), Some(&MatchKind::Substring));

    let exact = engine.search("BALANCE", 50).expect("search");
    assert_eq!(exact[0].match_kind, MatchKind::Exact);
    assert_eq!(exact, engine.search("balance", 50).expect("again"));

    assert_eq!(engine.search("bal", 2).expect("limited").len(), 2);
    assert!(matches!(engine.search("   ", 5), Err(SearchError::EmptyQuery)));
}

#[test]
fn search_falls_back_to_fuzzy_matching() {
    let engine = engine();
    let hits = engine.search("updbal", 5).expect("search");

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.match_kind == MatchKind::Fuzzy && h.score.is_some()));
    assert_eq!(hits[0].text, "UPDATE-BALANCE");
    assert_eq!(hits[0].role, ReferenceRole::Definition);
}

#[test]
fn data_accesses_report_reads_and_writes() {
    let engine = engine();
    let accesses = engine.data_accesses("BALANCE", None).expect("accesses");

    assert_eq!(accesses.len(), 2);
    assert_eq!(accesses[0].verb, "ADD");
    assert!(accesses[0].reads && accesses[0].writes);
    assert_eq!(accesses[1].verb, "MOVE");
    assert!(accesses[1].reads && !accesses[1].writes);

    let items = engine.procedure_data(&payroll("UPDATE-BALANCE")).expect("items");
    let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["BALANCE", "WS-TOTAL"]);
}

#[test]
fn excerpts_shrink_to_the_character_budget() {
    let engine = engine();
    let full = engine.excerpt(&payroll("UPDATE-BALANCE"), 0, None).expect("excerpt");
    assert!(!full.truncated);
    assert!(full.source.iter().any(|line| line.contains("ADD 100 TO BALANCE")));
    assert_eq!(full.incoming.len(), 1);
    assert_eq!(full.data.len(), 2);

    let budget = full.used_chars - 1;
    let trimmed = engine
        .excerpt(&payroll("UPDATE-BALANCE"), 0, Some(budget))
        .expect("trimmed");
    assert!(trimmed.truncated);
    assert!(trimmed.used_chars <= budget);
    assert_eq!(trimmed.used_chars, serde_json::to_string(&trimmed).expect("json").chars().count());
}

#[test]
fn dependencies_link_callers_to_units() {
    let engine = engine();
    let deps = engine.program_dependencies();

    let payroll = deps.iter().find(|d| d.program == "PAYROLL").expect("payroll");
    assert_eq!(payroll.calls.len(), 1);
    assert_eq!(payroll.calls[0].unit.as_deref(), Some("BILLING"));
    assert_eq!(payroll.copybooks, vec!["CUSTREC".to_string()]);

    let billing = deps.iter().find(|d| d.program == "BILLING").expect("billing");
    assert_eq!(billing.called_by, vec!["PAYROLL".to_string()]);
}

#[test]
fn diagnostics_filter_by_unit_and_severity() {
    let engine = engine();
    let reports = engine.diagnostics(Some("REPORTS"), None).expect("diagnostics");
    assert!(reports.iter().any(|d| d.kind == "dangling_target"));

    let errors = engine.diagnostics(None, Some(Severity::Error)).expect("errors");
    assert!(errors.is_empty());

    let err = engine.diagnostics(Some("NOPE"), None).expect_err("unknown unit");
    assert_eq!(err.code(), "unit_not_found");
}

#[test]
fn stats_count_the_whole_corpus() {
    let engine = engine();
    let stats = engine.stats();
    assert_eq!(stats.units, 3);
    for unit in ["PAYROLL", "BILLING", "REPORTS"] {
        let entry = engine.snapshot().unit(unit).expect("unit");
        assert_eq!(entry.model.program_id.as_deref(), Some(unit));
    }
    assert!(stats.failed.is_empty());
    assert!(stats.procedures >= 6);
    assert!(stats.occurrences >= stats.terms);
}

const NUMBERED: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. NUMBERED.
       PROCEDURE DIVISION.
       0100.
           PERFORM 0200.
           STOP RUN.
       0200.
           EXIT.
";

#[test]
fn numeric_paragraphs_answer_definition_and_graph_queries() {
    let engine = engine_with(&[("NUMBERED", NUMBERED)]);

    let found = engine.find_definition("0200", None).expect("definition");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, SymbolKind::Paragraph);

    let graph = engine
        .call_graph_neighborhood(&ProcedureRef::parse("0100").expect("reference"), 1, GraphDirection::Forward)
        .expect("graph");
    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["NUMBERED/0100", "NUMBERED/0200"]);

    let diagnostics = engine.diagnostics(Some("NUMBERED"), None).expect("diagnostics");
    assert!(diagnostics.iter().all(|d| d.kind != "opaque_statement"));
}

#[test]
fn overview_counts_sizes_complexity_and_dependencies() {
    let engine = engine();
    let overview = engine.overview();

    assert_eq!(overview.programs, 3);
    assert_eq!(overview.complexity.low, 3);
    assert_eq!(overview.sizes.small, 3);
    assert_eq!(overview.average_source_lines, overview.source_lines / 3);
    assert_eq!(overview.unique_dependencies, 2);
    let common: Vec<(&str, usize)> = overview
        .common_dependencies
        .iter()
        .map(|d| (d.name.as_str(), d.count))
        .collect();
    assert_eq!(common, vec![("BILLING", 1), ("CUSTREC", 1)]);
}

#[test]
fn relationships_separate_linked_and_isolated_programs() {
    let engine = engine();
    let report = engine.relationships();

    assert_eq!(report.relationships, 2);
    assert_eq!(report.programs_with_dependencies, 1);
    assert_eq!(report.isolated_programs, vec!["BILLING".to_string(), "REPORTS".to_string()]);
    assert_eq!(report.most_depended_on.len(), 1);
    assert_eq!(report.most_depended_on[0].name, "BILLING");
    assert_eq!(
        report.dependency_graph["PAYROLL"],
        vec!["BILLING".to_string(), "CUSTREC".to_string()]
    );
}

#[test]
fn refactoring_candidates_follow_the_thresholds() {
    let twin = PAYROLL.replace("PROGRAM-ID. PAYROLL.", "PROGRAM-ID. PAYCOPY.");
    let engine = engine_with(&[("PAYROLL", PAYROLL), ("PAYCOPY", twin.as_str()), ("BILLING", BILLING)]);

    let relaxed = engine.refactoring_candidates(&RefactoringThresholds::default());
    assert!(relaxed.high_complexity.is_empty());
    assert!(relaxed.large_programs.is_empty());
    assert!(relaxed.highly_dependent.is_empty());
    let isolated: Vec<&str> = relaxed.isolated_programs.iter().map(|p| p.program.as_str()).collect();
    assert_eq!(isolated, vec!["BILLING"]);
    assert_eq!(relaxed.duplicate_dependencies.len(), 1);
    assert_eq!(
        relaxed.duplicate_dependencies[0].dependencies,
        vec!["BILLING".to_string(), "CUSTREC".to_string()]
    );
    assert_eq!(
        relaxed.duplicate_dependencies[0].programs,
        vec!["PAYCOPY".to_string(), "PAYROLL".to_string()]
    );

    let strict = engine.refactoring_candidates(&RefactoringThresholds {
        max_source_lines: 10,
        max_dependencies: 1,
    });
    let large: Vec<&str> = strict.large_programs.iter().map(|p| p.unit.as_str()).collect();
    assert_eq!(large, vec!["PAYCOPY", "PAYROLL"]);
    assert_eq!(strict.highly_dependent.len(), 2);
    assert!(strict.highly_dependent.iter().all(|p| p.dependencies == 2));

    let callers = engine.relationships().most_depended_on;
    assert_eq!(callers[0].name, "BILLING");
    assert_eq!(callers[0].count, 2);
}
