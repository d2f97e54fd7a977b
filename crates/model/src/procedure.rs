//! Pass 2: procedure division → procedure nodes and control edges.

use lens_frontend::parser::{CallTarget, Name, ProgramTree, Statement, StatementKind};
use lens_frontend::{Diagnostic, DiagnosticKind, SourceRange};
use std::collections::BTreeMap;

use crate::data::DataTable;
use crate::types::{DataAccess, Edge, EdgeKind, EdgeTarget, ProcedureKind, ProcedureNode};

#[derive(Debug, Default)]
pub(crate) struct ProcedureTable {
    pub procedures: Vec<ProcedureNode>,
    pub keys: BTreeMap<String, usize>,
    pub edges: Vec<Edge>,
    pub external_calls: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Upper-cased section/paragraph name → node indices
    names: BTreeMap<String, Vec<usize>>,
}

impl ProcedureTable {
    pub(crate) fn build(tree: &ProgramTree, data: &DataTable) -> Self {
        let mut table = Self::default();
        let Some(procedure) = &tree.procedure else {
            return table;
        };

        // nodes first so forward PERFORMs resolve
        let mut work: Vec<(usize, &Statement)> = Vec::new();
        for section in &procedure.sections {
            let section_key = section.name.as_ref().map(|name| {
                let idx = table.add_node(name.upper(), Some(name), ProcedureKind::Section, None, None, &section.range);
                table.key_of(idx)
            });

            for (ordinal, paragraph) in section.paragraphs.iter().enumerate() {
                let base = match (&section_key, &paragraph.name) {
                    (Some(scope), Some(name)) => format!("{scope}::{}", name.upper()),
                    (None, Some(name)) => name.upper(),
                    (Some(scope), None) => format!("{scope}::#{}", ordinal + 1),
                    (None, None) => format!("#{}", ordinal + 1),
                };
                let idx = table.add_node(
                    base,
                    paragraph.name.as_ref(),
                    ProcedureKind::Paragraph,
                    section_key.clone(),
                    section_key.clone(),
                    &paragraph.range,
                );
                if let Some(scope) = &section_key {
                    let child = table.key_of(idx);
                    table.contains(scope, child, &paragraph.range);
                }

                let statements = paragraph.sentences.iter().flat_map(|s| s.statements.iter());
                table.declare_statements(idx, statements, &mut work);
            }
        }

        for (owner, statement) in work {
            table.scan(owner, statement, data);
        }

        log::debug!(
            "{}: {} procedures, {} edges",
            tree.unit,
            table.procedures.len(),
            table.edges.len()
        );
        table
    }

    fn key_of(&self, idx: usize) -> String {
        self.procedures
            .get(idx)
            .map(|node| node.key.clone())
            .unwrap_or_default()
    }

    /// Register a node under a unique key; duplicates get `~2`, `~3`, ...
    fn add_node(
        &mut self,
        base: String,
        name: Option<&Name>,
        kind: ProcedureKind,
        parent: Option<String>,
        section: Option<String>,
        range: &SourceRange,
    ) -> usize {
        let mut key = base.clone();
        let mut n = 2;
        while self.keys.contains_key(&key) {
            key = format!("{base}~{n}");
            n += 1;
        }

        let idx = self.procedures.len();
        if let Some(name) = name {
            self.names.entry(name.upper()).or_default().push(idx);
        }
        self.keys.insert(key.clone(), idx);
        self.procedures.push(ProcedureNode {
            key,
            name: name.map(|name| name.text.clone()),
            kind,
            parent,
            section,
            range: range.clone(),
            name_range: name.map(|name| name.range.clone()),
            position: u32::try_from(idx).unwrap_or(u32::MAX),
            statements: 0,
            decisions: 0,
            accesses: Vec::new(),
        });
        idx
    }

    fn contains(&mut self, from: &str, child: String, range: &SourceRange) {
        self.edges.push(Edge {
            from: from.to_string(),
            kind: EdgeKind::Contains,
            target: EdgeTarget::Resolved { key: child },
            thru: None,
            range: range.clone(),
            thru_range: None,
        });
    }

    /// Count statements against their owner and open a node per inline PERFORM body
    fn declare_statements<'t>(
        &mut self,
        owner: usize,
        statements: impl Iterator<Item = &'t Statement>,
        work: &mut Vec<(usize, &'t Statement)>,
    ) {
        let mut inline_ordinal = 0;
        for statement in statements {
            if let Some(node) = self.procedures.get_mut(owner) {
                node.statements += 1;
                if statement.is_decision() {
                    node.decisions += 1;
                }
            }
            work.push((owner, statement));

            let StatementKind::Perform(perform) = &statement.kind else {
                continue;
            };
            if perform.target.is_some() {
                continue;
            }
            inline_ordinal += 1;
            let owner_key = self.key_of(owner);
            let section = self.procedures.get(owner).and_then(|node| node.section.clone());
            let child = self.add_node(
                format!("{owner_key}::perform#{inline_ordinal}"),
                None,
                ProcedureKind::InlinePerform,
                Some(owner_key.clone()),
                section,
                &statement.range,
            );
            let child_key = self.key_of(child);
            self.contains(&owner_key, child_key, &statement.range);
            self.declare_statements(child, perform.inline.iter(), work);
        }
    }

    fn scan(&mut self, owner: usize, statement: &Statement, data: &DataTable) {
        let accesses: Vec<DataAccess> = statement
            .operands
            .iter()
            .map(|operand| DataAccess {
                item: data.item_ref(operand),
                access: operand.access,
                verb: statement.verb.clone(),
            })
            .collect();
        let Some(node) = self.procedures.get_mut(owner) else {
            return;
        };
        node.accesses.extend(accesses);
        let from = node.key.clone();
        let section = node.section.clone();

        match &statement.kind {
            StatementKind::Perform(perform) => {
                let Some(target) = &perform.target else {
                    return;
                };
                let range = target.range.clone();
                let target = self.resolve(target, section.as_deref(), "PERFORM");
                let thru = perform
                    .thru
                    .as_ref()
                    .map(|thru| self.resolve(thru, section.as_deref(), "PERFORM THRU"));
                self.edges.push(Edge {
                    from,
                    kind: EdgeKind::Perform,
                    target,
                    thru,
                    range,
                    thru_range: perform.thru.as_ref().map(|name| name.range.clone()),
                });
            }
            StatementKind::GoTo { targets, .. } => {
                for name in targets {
                    let target = self.resolve(name, section.as_deref(), "GO TO");
                    self.edges.push(Edge {
                        from: from.clone(),
                        kind: EdgeKind::GoTo,
                        target,
                        thru: None,
                        range: name.range.clone(),
                        thru_range: None,
                    });
                }
            }
            StatementKind::Call { target } => {
                let range = match target {
                    CallTarget::Literal(name) => name.range.clone(),
                    CallTarget::Dynamic(data_ref) => data_ref.range.clone(),
                };
                let (target, message) = match target {
                    CallTarget::Literal(name) => {
                        let program = name.upper();
                        if !self.external_calls.contains(&program) {
                            self.external_calls.push(program.clone());
                        }
                        let message = format!("CALL to external program {program}");
                        (EdgeTarget::External { program }, message)
                    }
                    CallTarget::Dynamic(data_ref) => (
                        EdgeTarget::Dynamic {
                            data_name: data_ref.upper(),
                        },
                        format!("dynamic CALL through {}", data_ref.name),
                    ),
                };
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ExternalCall,
                    statement.range.clone(),
                    message,
                ));
                self.edges.push(Edge {
                    from,
                    kind: EdgeKind::Call,
                    target,
                    thru: None,
                    range,
                    thru_range: None,
                });
            }
            StatementKind::Plain | StatementKind::Exec { .. } | StatementKind::Opaque { .. } => {}
        }
    }

    /// Procedure-name lookup: a unique name wins, otherwise a paragraph of the
    /// caller's own section; anything else stays ambiguous
    fn resolve(&mut self, name: &Name, section: Option<&str>, verb: &str) -> EdgeTarget {
        let candidates = self.names.get(&name.upper()).cloned().unwrap_or_default();

        match candidates.as_slice() {
            [] => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DanglingTarget,
                    name.range.clone(),
                    format!("{verb} target {} is not declared in this unit", name.text),
                ));
                EdgeTarget::Unresolved { name: name.upper() }
            }
            [idx] => EdgeTarget::Resolved {
                key: self.key_of(*idx),
            },
            _ => {
                let local: Vec<usize> = candidates
                    .iter()
                    .copied()
                    .filter(|idx| {
                        self.procedures.get(*idx).is_some_and(|node| {
                            node.kind == ProcedureKind::Paragraph && node.section.as_deref() == section
                        })
                    })
                    .collect();
                if let [idx] = local.as_slice() {
                    return EdgeTarget::Resolved {
                        key: self.key_of(*idx),
                    };
                }

                let mut keys: Vec<String> = candidates.iter().map(|idx| self.key_of(*idx)).collect();
                keys.sort();
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::AmbiguousTarget,
                    name.range.clone(),
                    format!("{verb} target {} matches {}", name.text, keys.join(", ")),
                ));
                EdgeTarget::Ambiguous {
                    name: name.upper(),
                    candidates: keys,
                }
            }
        }
    }
}
