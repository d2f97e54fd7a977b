use lens_frontend::Severity;
use lens_indexer::{Corpus, CorpusSnapshot, Occurrence, Role, UnitEntry};
use lens_model::{CallGraph, ItemId, ItemRef, ProcedureNode, ProgramModel};
use lens_protocol::{
    enforce_max_chars, finalize_used_chars, CallLink, CorpusStats, DataAccessView, DataItemView,
    Definition, DiagnosticView, FailedUnitView, GraphDirection, GraphView, MatchKind,
    ProcedureExcerpt, ProgramDependency, Reference, SearchHit, SymbolKind, UnitSummary,
    PROTOCOL_SCHEMA_VERSION,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::fuzzy::FuzzySearch;
use crate::neighborhood::neighborhood;
use crate::query::{ProcedureRef, QualifiedName};
use crate::views;

/// Read-only queries over one corpus snapshot.
///
/// Every answer is derived from the snapshot captured at construction, so a batch of
/// queries sees one consistent corpus even while ingestion keeps committing.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    snapshot: Arc<CorpusSnapshot>,
}

impl QueryEngine {
    pub fn new(snapshot: Arc<CorpusSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn from_corpus(corpus: &Corpus) -> Self {
        Self::new(corpus.snapshot())
    }

    #[must_use]
    pub fn snapshot(&self) -> &CorpusSnapshot {
        &self.snapshot
    }

    /// Definitions of a data item, condition, file, procedure or program.
    ///
    /// Qualifiers narrow data items (`BALANCE OF CUSTOMER-REC`) and paragraphs
    /// (`STEP-A OF MAIN`); files and programs are only found unqualified.
    pub fn find_definition(&self, name: &str, unit: Option<&str>) -> Result<Vec<Definition>> {
        let query = QualifiedName::parse(name)?;
        let mut found = Vec::new();

        for entry in self.units(unit)? {
            let model = &entry.model;
            let unit_id = entry.unit_id();
            let mut local = Vec::new();

            for id in model.resolve_item(&query.name, &query.qualifiers) {
                let Some(item) = model.item(id) else { continue };
                let range = item.definition_range();
                local.push(Definition {
                    unit: unit_id.to_string(),
                    kind: views::item_kind(item),
                    name: item.name.clone().unwrap_or_else(|| "FILLER".to_string()),
                    qualified_name: item.qualified_name(),
                    location: views::range_key(range),
                    origin: views::origin(model, range),
                    level: Some(item.level),
                    picture: item.picture.clone(),
                });
            }

            for node in model.procedures_named(&query.name) {
                let in_scope = match query.qualifiers.as_slice() {
                    [] => true,
                    [section] => node.section.as_deref() == Some(section.as_str()),
                    _ => false,
                };
                if in_scope {
                    local.push(procedure_definition(model, node));
                }
            }

            if !query.is_qualified() {
                for file in model.files.iter().filter(|f| f.name.eq_ignore_ascii_case(&query.name)) {
                    local.push(Definition {
                        unit: unit_id.to_string(),
                        kind: SymbolKind::File,
                        name: file.name.clone(),
                        qualified_name: file.name.to_ascii_uppercase(),
                        location: views::range_key(&file.range),
                        origin: views::origin(model, &file.range),
                        level: None,
                        picture: None,
                    });
                }

                if let Some(program_id) = model.tree.program_id() {
                    if program_id.text.eq_ignore_ascii_case(&query.name) {
                        local.push(Definition {
                            unit: unit_id.to_string(),
                            kind: SymbolKind::Program,
                            name: program_id.text.clone(),
                            qualified_name: program_id.upper(),
                            location: views::range_key(&program_id.range),
                            origin: None,
                            level: None,
                            picture: None,
                        });
                    }
                }
            }

            local.sort_by(|a, b| a.location.cmp(&b.location));
            found.extend(local);
        }

        log::debug!("definition {name:?}: {} hit(s)", found.len());
        Ok(found)
    }

    /// Every occurrence of a name: definitions, statement uses, clauses, PERFORM / GO TO
    /// / CALL targets. Unit order, then source order.
    pub fn find_references(&self, name: &str, unit: Option<&str>) -> Result<Vec<Reference>> {
        let query = QualifiedName::parse(name)?;
        let mut found = Vec::new();

        for entry in self.units(unit)? {
            let wanted = query
                .is_qualified()
                .then(|| entry.model.resolve_item(&query.name, &query.qualifiers));

            for occurrence in entry.index.exact(&query.name) {
                if let Some(ids) = &wanted {
                    if !refers_to(&entry.model, occurrence, ids) {
                        continue;
                    }
                }
                found.push(reference(entry, occurrence));
            }
        }
        Ok(found)
    }

    /// Procedures within `depth` control edges of the referenced procedure(s).
    ///
    /// An ambiguous name roots the neighborhood at every candidate.
    pub fn call_graph_neighborhood(
        &self,
        reference: &ProcedureRef,
        depth: u32,
        direction: GraphDirection,
    ) -> Result<GraphView> {
        let roots = self.resolve_procedures(reference)?;
        Ok(neighborhood(&roots, depth, direction))
    }

    /// Names containing `fragment`: exact matches first, then prefix, then substring;
    /// ties by unit, then position. Falls back to fuzzy matching when nothing contains
    /// the fragment.
    pub fn search(&self, fragment: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let needle = fragment.to_ascii_uppercase();

        let mut hits = Vec::new();
        for entry in self.snapshot.units() {
            for (term, occurrences) in entry.index.containing(&needle) {
                let match_kind = if term == needle {
                    MatchKind::Exact
                } else if term.starts_with(&needle) {
                    MatchKind::Prefix
                } else {
                    MatchKind::Substring
                };
                hits.extend(occurrences.iter().map(|occurrence| SearchHit {
                    unit: entry.unit_id().to_string(),
                    text: occurrence.text.clone(),
                    match_kind,
                    role: views::reference_role(occurrence.role),
                    location: views::range_key(&occurrence.range),
                    score: None,
                }));
            }
        }

        if hits.is_empty() {
            log::debug!("search {fragment:?}: no substring match, trying fuzzy");
            return self.suggest(fragment, limit);
        }

        hits.sort_by(|a, b| {
            (a.match_kind, &a.unit, &a.location).cmp(&(b.match_kind, &b.unit, &b.location))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Fuzzy-ranked names, one hit per distinct name per unit (its definition when
    /// indexed, else its first use)
    pub fn suggest(&self, fragment: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let candidates: Vec<(&UnitEntry, &str)> = self
            .snapshot
            .units()
            .flat_map(|entry| entry.index.terms().map(move |term| (entry, term)))
            .collect();
        let names: Vec<&str> = candidates.iter().map(|(_, term)| *term).collect();

        let mut fuzzy = FuzzySearch::new();
        let mut hits = Vec::new();
        for (idx, score) in fuzzy.rank(fragment, &names, limit) {
            let (entry, term) = candidates[idx];
            let occurrences = entry.index.exact(term);
            let Some(best) = occurrences
                .iter()
                .find(|occ| occ.role == Role::Definition)
                .or_else(|| occurrences.first())
            else {
                continue;
            };
            hits.push(SearchHit {
                unit: entry.unit_id().to_string(),
                text: best.text.clone(),
                match_kind: MatchKind::Fuzzy,
                role: views::reference_role(best.role),
                location: views::range_key(&best.range),
                score: Some(score),
            });
        }
        Ok(hits)
    }

    /// Statements that read or write the named item, unit order then source order
    pub fn data_accesses(&self, name: &str, unit: Option<&str>) -> Result<Vec<DataAccessView>> {
        let query = QualifiedName::parse(name)?;
        let mut found = Vec::new();

        for entry in self.units(unit)? {
            let model = &entry.model;
            let wanted = model.resolve_item(&query.name, &query.qualifiers);

            let mut local = Vec::new();
            for node in &model.procedures {
                for access in &node.accesses {
                    if !access.item.name.eq_ignore_ascii_case(&query.name) {
                        continue;
                    }
                    let matches = if access.item.resolved.is_empty() {
                        !query.is_qualified()
                    } else {
                        access.item.resolved.iter().any(|id| wanted.contains(id))
                    };
                    if !matches {
                        continue;
                    }
                    local.push(DataAccessView {
                        unit: entry.unit_id().to_string(),
                        procedure: node.key.clone(),
                        item: written_name(&access.item),
                        verb: access.verb.clone(),
                        reads: access.access.reads(),
                        writes: access.access.writes(),
                        location: views::range_key(&access.item.range),
                    });
                }
            }
            local.sort_by(|a, b| a.location.cmp(&b.location));
            found.extend(local);
        }
        Ok(found)
    }

    /// Data items a procedure (and any paragraph or inline body nested in it) touches
    pub fn procedure_data(&self, reference: &ProcedureRef) -> Result<Vec<DataItemView>> {
        let (entry, node) = self.resolve_one(reference)?;
        Ok(procedure_items(&entry.model, node))
    }

    /// Source of one procedure with its edges and data, sized to `max_chars` of JSON
    /// when given. Lines are dropped from the end first, then data, then edges.
    pub fn excerpt(
        &self,
        reference: &ProcedureRef,
        context_lines: u32,
        max_chars: Option<usize>,
    ) -> Result<ProcedureExcerpt> {
        let (entry, node) = self.resolve_one(reference)?;
        let model = &entry.model;
        let last_line = u32::try_from(model.source.line_count()).unwrap_or(u32::MAX);

        let first = node.range.line.saturating_sub(context_lines).max(1);
        let last = node.range.end_line.saturating_add(context_lines).min(last_line);
        let source = (first..=last)
            .filter_map(|number| model.source.line(number))
            .map(|line| line.text.trim_end().to_string())
            .collect();

        let edges = |positions: &[usize]| {
            positions
                .iter()
                .filter_map(|&pos| model.edges.get(pos))
                .map(|edge| views::edge(entry, edge))
                .collect::<Vec<_>>()
        };

        let mut excerpt = ProcedureExcerpt {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            unit: entry.unit_id().to_string(),
            key: node.key.clone(),
            kind: views::procedure_kind(node.kind),
            location: views::range_key(&node.range),
            source,
            first_line: first,
            outgoing: edges(entry.index.outgoing(&node.key)),
            incoming: edges(entry.index.incoming(&node.key)),
            data: procedure_items(model, node),
            truncated: false,
            used_chars: 0,
        };

        let set_used = |excerpt: &mut ProcedureExcerpt, used: usize| excerpt.used_chars = used;
        match max_chars {
            Some(max) => {
                enforce_max_chars(
                    &mut excerpt,
                    max,
                    set_used,
                    |excerpt| excerpt.truncated = true,
                    shrink_excerpt,
                )?;
            }
            None => {
                finalize_used_chars(&mut excerpt, set_used)?;
            }
        }
        Ok(excerpt)
    }

    /// CALL links between units; a callee resolves to the unit whose PROGRAM-ID
    /// matches, otherwise stays external
    pub fn program_dependencies(&self) -> Vec<ProgramDependency> {
        let mut called_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in self.snapshot.units() {
            for callee in &entry.model.external_calls {
                called_by
                    .entry(callee.to_ascii_uppercase())
                    .or_default()
                    .insert(entry.model.program_name());
            }
        }

        self.snapshot
            .units()
            .map(|entry| {
                let model = &entry.model;
                let program = model.program_name();
                let calls = model
                    .external_calls
                    .iter()
                    .map(|callee| CallLink {
                        program: callee.to_ascii_uppercase(),
                        unit: self
                            .snapshot
                            .unit_for_program(callee)
                            .map(|target| target.unit_id().to_string()),
                    })
                    .collect();
                ProgramDependency {
                    called_by: called_by
                        .get(&program)
                        .map(|callers| callers.iter().cloned().collect())
                        .unwrap_or_default(),
                    program,
                    unit: entry.unit_id().to_string(),
                    calls,
                    copybooks: model.copybooks.clone(),
                }
            })
            .collect()
    }

    /// Diagnostics at or above `min_severity`, unit order then source order
    pub fn diagnostics(
        &self,
        unit: Option<&str>,
        min_severity: Option<Severity>,
    ) -> Result<Vec<DiagnosticView>> {
        let floor = min_severity.unwrap_or(Severity::Info);
        let mut found = Vec::new();
        for entry in self.units(unit)? {
            let mut local: Vec<_> = entry
                .model
                .diagnostics
                .iter()
                .filter(|diagnostic| diagnostic.severity >= floor)
                .collect();
            local.sort_by_key(|diagnostic| {
                (diagnostic.range.line, diagnostic.range.start_col)
            });
            found.extend(
                local
                    .into_iter()
                    .map(|diagnostic| views::diagnostic(&entry.model, diagnostic)),
            );
        }
        Ok(found)
    }

    pub fn unit_summaries(&self, unit: Option<&str>) -> Result<Vec<UnitSummary>> {
        Ok(self.units(unit)?.into_iter().map(summary).collect())
    }

    pub fn stats(&self) -> CorpusStats {
        let mut stats = CorpusStats {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            units: self.snapshot.len(),
            failed: self
                .snapshot
                .failed()
                .iter()
                .map(|(unit, reason)| FailedUnitView {
                    unit: unit.clone(),
                    reason: reason.clone(),
                })
                .collect(),
            procedures: 0,
            edges: 0,
            data_items: 0,
            diagnostics: 0,
            terms: 0,
            occurrences: 0,
        };
        for entry in self.snapshot.units() {
            stats.procedures += entry.model.procedures.len();
            stats.edges += entry.model.edges.len();
            stats.data_items += entry.model.items.len();
            stats.diagnostics += entry.model.diagnostics.len();
            stats.terms += entry.index.term_count();
            stats.occurrences += entry.index.occurrence_count();
        }
        stats
    }

    fn units(&self, unit: Option<&str>) -> Result<Vec<&UnitEntry>> {
        let units: Vec<&UnitEntry> = self.snapshot.scope(unit).collect();
        match unit {
            Some(unit) if units.is_empty() => Err(SearchError::UnitNotFound(unit.to_string())),
            _ => Ok(units),
        }
    }

    /// Procedures a reference denotes: an exact key wins over a name lookup
    fn resolve_procedures(&self, reference: &ProcedureRef) -> Result<Vec<(&UnitEntry, &ProcedureNode)>> {
        let units = self.units(reference.unit.as_deref())?;
        let upper = reference.target.to_ascii_uppercase();

        let by_key: Vec<_> = units
            .iter()
            .filter_map(|entry| {
                entry
                    .model
                    .procedure(&reference.target)
                    .or_else(|| entry.model.procedure(&upper))
                    .map(|node| (*entry, node))
            })
            .collect();
        if !by_key.is_empty() {
            return Ok(by_key);
        }

        let by_name: Vec<_> = units
            .iter()
            .flat_map(|entry| {
                entry
                    .model
                    .procedures
                    .iter()
                    .filter(|node| {
                        node.name
                            .as_deref()
                            .is_some_and(|name| name.eq_ignore_ascii_case(&reference.target))
                    })
                    .map(move |node| (*entry, node))
            })
            .collect();
        if by_name.is_empty() {
            return Err(SearchError::ProcedureNotFound(reference.to_string()));
        }
        Ok(by_name)
    }

    fn resolve_one(&self, reference: &ProcedureRef) -> Result<(&UnitEntry, &ProcedureNode)> {
        let mut candidates = self.resolve_procedures(reference)?;
        if candidates.len() == 1 {
            return Ok(candidates.remove(0));
        }
        Err(SearchError::AmbiguousProcedure {
            name: reference.to_string(),
            candidates: candidates
                .iter()
                .map(|(entry, node)| views::node_id(entry.unit_id(), &node.key))
                .collect(),
        })
    }
}

fn procedure_definition(model: &ProgramModel, node: &ProcedureNode) -> Definition {
    let range = node.definition_range();
    Definition {
        unit: model.unit_id.to_string(),
        kind: views::procedure_kind(node.kind),
        name: node.display_name().to_string(),
        qualified_name: node.key.clone(),
        location: views::range_key(range),
        origin: views::origin(model, range),
        level: None,
        picture: None,
    }
}

fn reference(entry: &UnitEntry, occurrence: &Occurrence) -> Reference {
    Reference {
        unit: entry.unit_id().to_string(),
        name: occurrence.text.clone(),
        role: views::reference_role(occurrence.role),
        procedure: occurrence.procedure.clone(),
        location: views::range_key(&occurrence.range),
        origin: views::origin(&entry.model, &occurrence.range),
    }
}

/// Does this occurrence denote one of `ids`? Definitions match on their name range,
/// uses on the ids their reference resolved to.
fn refers_to(model: &ProgramModel, occurrence: &Occurrence, ids: &[ItemId]) -> bool {
    if occurrence.role == Role::Definition {
        return ids.iter().any(|id| {
            model
                .item(*id)
                .is_some_and(|item| item.definition_range() == &occurrence.range)
        });
    }
    item_refs(model).any(|item_ref| {
        item_ref.range == occurrence.range && item_ref.resolved.iter().any(|id| ids.contains(id))
    })
}

/// Every resolved data reference in a model: statement accesses and clauses
fn item_refs(model: &ProgramModel) -> impl Iterator<Item = &ItemRef> {
    let accesses = model
        .procedures
        .iter()
        .flat_map(|node| node.accesses.iter().map(|access| &access.item));
    let clauses = model.items.iter().flat_map(|item| {
        let renames = item.renames.iter().flat_map(|r| std::iter::once(&r.from).chain(r.thru.iter()));
        item.redefines
            .iter()
            .chain(item.occurs.iter().filter_map(|occurs| occurs.depending_on.as_ref()))
            .chain(renames)
    });
    let statuses = model.files.iter().filter_map(|file| file.status.as_ref());
    accesses.chain(clauses).chain(statuses)
}

/// `BALANCE OF CUSTOMER-REC` as the statement spelled it
fn written_name(item: &ItemRef) -> String {
    let mut text = item.name.clone();
    for qualifier in &item.qualifiers {
        text.push_str(" OF ");
        text.push_str(qualifier);
    }
    text
}

fn procedure_items(model: &ProgramModel, node: &ProcedureNode) -> Vec<DataItemView> {
    let nested = format!("{}::", node.key);
    let ids: BTreeSet<ItemId> = model
        .procedures
        .iter()
        .filter(|candidate| candidate.key == node.key || candidate.key.starts_with(&nested))
        .flat_map(|candidate| candidate.accesses.iter())
        .flat_map(|access| access.item.resolved.iter().copied())
        .collect();
    ids.into_iter()
        .filter_map(|id| model.item(id))
        .map(views::data_item)
        .collect()
}

fn shrink_excerpt(excerpt: &mut ProcedureExcerpt) -> bool {
    if excerpt.source.len() > 1 {
        return excerpt.source.pop().is_some();
    }
    excerpt.data.pop().is_some()
        || excerpt.incoming.pop().is_some()
        || excerpt.outgoing.pop().is_some()
        || excerpt.source.pop().is_some()
}

fn summary(entry: &UnitEntry) -> UnitSummary {
    let model = &entry.model;
    let metrics = &model.metrics;
    UnitSummary {
        unit: entry.unit_id().to_string(),
        program: model.program_name(),
        path: model.path.as_ref().map(|path| path.display().to_string()),
        source_lines: metrics.source_lines,
        expanded_lines: metrics.expanded_lines,
        statements: metrics.statements,
        decisions: metrics.decisions,
        data_items: metrics.data_items,
        sections: metrics.sections,
        paragraphs: metrics.paragraphs,
        edges: metrics.edges,
        diagnostics: metrics.diagnostics,
        complexity: metrics.complexity().as_str().to_string(),
        copybooks: model.copybooks.clone(),
        perform_cycles: CallGraph::build(model).perform_cycles(),
    }
}
