//! Pass 1: data division → item table.

use lens_frontend::parser::{DataEntry, DataRef, DataSectionKind, Name, ProgramTree};
use lens_frontend::{Diagnostic, DiagnosticKind};
use std::collections::BTreeMap;

use crate::types::{DataItem, FileInfo, ItemId, ItemRef, Occurs, Renames};

#[derive(Debug, Default)]
pub(crate) struct DataTable {
    pub items: Vec<DataItem>,
    pub names: BTreeMap<String, Vec<ItemId>>,
    pub files: Vec<FileInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Open groups of the record being built plus the last item a level 88 attaches to
#[derive(Default)]
struct LevelStack {
    open: Vec<ItemId>,
    last: Option<ItemId>,
}

impl DataTable {
    pub(crate) fn build(tree: &ProgramTree) -> Self {
        let mut table = Self::default();
        table.add_selects(tree);

        let Some(data) = &tree.data else {
            table.resolve_file_status(tree);
            return table;
        };

        for section in &data.sections {
            let mut pending: Vec<(&DataEntry, Option<&Name>)> =
                section.entries.iter().map(|entry| (entry, None)).collect();
            for fd in &section.files {
                table.add_file_description(fd.kind, &fd.name, &fd.range);
                pending.extend(fd.records.iter().map(|record| (record, Some(&fd.name))));
            }
            pending.sort_by_key(|(entry, _)| (entry.range.line, entry.range.start_col));

            let mut levels = LevelStack::default();
            let mut current_file: Option<String> = None;
            for (entry, file) in pending {
                let file = file.map(Name::upper);
                if file != current_file {
                    levels = LevelStack::default();
                    current_file.clone_from(&file);
                }
                table.add_entry(entry, section.kind, file, &mut levels);
            }
        }

        table.resolve_redefines(data_entries(tree));
        table.resolve_clauses(data_entries(tree));
        table.resolve_file_status(tree);
        table
    }

    fn add_selects(&mut self, tree: &ProgramTree) {
        let Some(env) = &tree.environment else {
            return;
        };
        for select in &env.file_controls {
            self.files.push(FileInfo {
                name: select.name.upper(),
                kind: None,
                range: select.range.clone(),
                assign_to: select.assign_to.clone(),
                organization: select.organization.clone(),
                access: select.access.clone(),
                status: None,
                records: Vec::new(),
            });
        }
    }

    fn add_file_description(
        &mut self,
        kind: lens_frontend::parser::FileDescriptionKind,
        name: &Name,
        range: &lens_frontend::SourceRange,
    ) {
        let upper = name.upper();
        match self.files.iter_mut().find(|file| file.name == upper) {
            Some(file) => {
                file.kind = Some(kind);
                file.range = range.clone();
            }
            None => self.files.push(FileInfo {
                name: upper,
                kind: Some(kind),
                range: range.clone(),
                assign_to: None,
                organization: None,
                access: None,
                status: None,
                records: Vec::new(),
            }),
        }
    }

    fn diagnostic(&mut self, kind: DiagnosticKind, range: &lens_frontend::SourceRange, message: String) {
        self.diagnostics.push(Diagnostic::new(kind, range.clone(), message));
    }

    fn add_entry(
        &mut self,
        entry: &DataEntry,
        section: DataSectionKind,
        file: Option<String>,
        levels: &mut LevelStack,
    ) {
        let id = ItemId::try_from(self.items.len()).unwrap_or(ItemId::MAX);
        let label = entry
            .name
            .as_ref()
            .map_or_else(|| "FILLER".to_string(), |name| name.text.clone());

        let parent = match entry.level {
            1 | 77 => {
                levels.open.clear();
                None
            }
            88 => {
                if levels.last.is_none() {
                    self.diagnostic(
                        DiagnosticKind::LevelNesting,
                        &entry.range,
                        format!("condition name {label} has no item to attach to"),
                    );
                }
                levels.last
            }
            66 => {
                let record = levels.open.first().copied();
                if record.is_none() {
                    self.diagnostic(
                        DiagnosticKind::LevelNesting,
                        &entry.range,
                        format!("level 66 {label} outside any record"),
                    );
                }
                record
            }
            level => self.nest(level, &label, &entry.range, levels),
        };

        let mut qualification = Vec::new();
        match parent.and_then(|p| self.items.get(p as usize)) {
            Some(group) => {
                qualification.extend(group.upper_name());
                qualification.extend(group.qualification.iter().cloned());
            }
            None => qualification.extend(file.clone()),
        }

        let item = DataItem {
            id,
            level: entry.level,
            name: entry.name.as_ref().map(|name| name.text.clone()),
            range: entry.range.clone(),
            name_range: entry.name.as_ref().map(|name| name.range.clone()),
            section,
            file: file.clone(),
            parent,
            children: Vec::new(),
            qualification,
            picture: entry.picture.clone(),
            usage: entry.usage.clone(),
            value: entry.value.clone(),
            redefines: None,
            occurs: None,
            renames: None,
        };

        if let Some(upper) = item.upper_name() {
            self.names.entry(upper).or_default().push(id);
        }
        if let Some(group) = parent.and_then(|p| self.items.get_mut(p as usize)) {
            group.children.push(id);
        }
        if entry.level == 1 {
            if let Some(file) = file.and_then(|name| self.files.iter_mut().find(|f| f.name == name)) {
                file.records.push(id);
            }
        }

        if matches!(entry.level, 1..=49) {
            levels.open.push(id);
        }
        if entry.level != 88 {
            levels.last = Some(id);
        }
        self.items.push(item);
    }

    /// Parent of a level 02-49 entry: the nearest open group with a lower level
    fn nest(
        &mut self,
        level: u8,
        label: &str,
        range: &lens_frontend::SourceRange,
        levels: &mut LevelStack,
    ) -> Option<ItemId> {
        let mut closed_level = None;
        while let Some(&top) = levels.open.last() {
            let top_level = self.items.get(top as usize).map_or(0, |item| item.level);
            if top_level < level {
                break;
            }
            closed_level = Some(top_level);
            levels.open.pop();
        }

        let Some(&parent) = levels.open.last() else {
            self.diagnostic(
                DiagnosticKind::LevelNesting,
                range,
                format!("level {level:02} {label} has no enclosing group"),
            );
            return None;
        };

        // level falls between the group and the sibling it follows
        if let Some(sibling) = closed_level.filter(|sibling| *sibling > level) {
            self.diagnostic(
                DiagnosticKind::LevelNesting,
                range,
                format!("level {level:02} {label} does not match preceding sibling level {sibling:02}"),
            );
        }
        Some(parent)
    }

    /// REDEFINES must name an item declared earlier in the table
    fn resolve_redefines<'t>(&mut self, entries: impl Iterator<Item = &'t DataEntry>) {
        let mut updates = Vec::new();
        for (idx, entry) in entries.enumerate() {
            let Some(target) = &entry.redefines else {
                continue;
            };
            let id = ItemId::try_from(idx).unwrap_or(ItemId::MAX);
            let Some(item) = self.items.get(idx) else {
                continue;
            };

            let candidates = self.names.get(&target.upper()).cloned().unwrap_or_default();
            let earlier: Vec<ItemId> = candidates.iter().copied().filter(|c| *c < id).collect();
            let chosen = earlier
                .iter()
                .rev()
                .find(|c| self.items.get(**c as usize).is_some_and(|other| other.parent == item.parent))
                .or_else(|| earlier.last())
                .copied();

            if chosen.is_none() {
                let why = if candidates.is_empty() {
                    "is not defined"
                } else {
                    "is declared later"
                };
                self.diagnostic(
                    DiagnosticKind::UnresolvedRedefines,
                    &target.range,
                    format!("REDEFINES target {} {why}", target.text),
                );
            }

            updates.push((
                idx,
                ItemRef {
                    name: target.text.clone(),
                    qualifiers: Vec::new(),
                    range: target.range.clone(),
                    resolved: chosen.into_iter().collect(),
                },
            ));
        }

        for (idx, redefines) in updates {
            if let Some(item) = self.items.get_mut(idx) {
                item.redefines = Some(redefines);
            }
        }
    }

    /// OCCURS DEPENDING counters, RENAMES operands and FILE STATUS items may be declared
    /// anywhere, so they resolve against the finished table
    fn resolve_clauses<'t>(&mut self, entries: impl Iterator<Item = &'t DataEntry>) {
        let mut occurs_updates = Vec::new();
        let mut renames_updates = Vec::new();

        for (idx, entry) in entries.enumerate() {
            if let Some(occurs) = &entry.occurs {
                let depending_on = occurs.depending_on.as_ref().map(|counter| {
                    let resolved = self.item_ref(counter);
                    if resolved.resolved.len() != 1 {
                        let why = if resolved.resolved.is_empty() { "is not defined" } else { "is ambiguous" };
                        self.diagnostic(
                            DiagnosticKind::UnresolvedOccursCounter,
                            &counter.range,
                            format!("OCCURS DEPENDING ON {} {why}", counter.name),
                        );
                    }
                    resolved
                });
                occurs_updates.push((
                    idx,
                    Occurs {
                        min: occurs.min,
                        max: occurs.max,
                        depending_on,
                        indexed_by: occurs.indexed_by.iter().map(Name::upper).collect(),
                    },
                ));
            }
            if let Some(renames) = &entry.renames {
                renames_updates.push((
                    idx,
                    Renames {
                        from: self.item_ref(&renames.from),
                        thru: renames.thru.as_ref().map(|thru| self.item_ref(thru)),
                    },
                ));
            }
        }

        for (idx, occurs) in occurs_updates {
            if let Some(item) = self.items.get_mut(idx) {
                item.occurs = Some(occurs);
            }
        }
        for (idx, renames) in renames_updates {
            if let Some(item) = self.items.get_mut(idx) {
                item.renames = Some(renames);
            }
        }
    }

    pub(crate) fn item_ref(&self, data_ref: &DataRef) -> ItemRef {
        item_ref(&self.items, &self.names, data_ref)
    }

    fn resolve_file_status(&mut self, tree: &ProgramTree) {
        let Some(env) = &tree.environment else {
            return;
        };
        for select in &env.file_controls {
            let Some(status) = &select.status else {
                continue;
            };
            let resolved = self.item_ref(status);
            let name = select.name.upper();
            if let Some(file) = self.files.iter_mut().find(|file| file.name == name) {
                file.status = Some(resolved);
            }
        }
    }
}

/// Entries in the order they were added to the table
fn data_entries(tree: &ProgramTree) -> impl Iterator<Item = &DataEntry> {
    let mut entries: Vec<&DataEntry> = Vec::new();
    if let Some(data) = &tree.data {
        for section in &data.sections {
            let mut pending: Vec<&DataEntry> = section.entries.iter().collect();
            pending.extend(section.files.iter().flat_map(|fd| fd.records.iter()));
            pending.sort_by_key(|entry| (entry.range.line, entry.range.start_col));
            entries.extend(pending);
        }
    }
    entries.into_iter()
}

pub(crate) fn item_ref(items: &[DataItem], names: &BTreeMap<String, Vec<ItemId>>, data_ref: &DataRef) -> ItemRef {
    let qualifiers: Vec<String> = data_ref
        .qualifiers
        .iter()
        .map(|q| q.to_ascii_uppercase())
        .collect();
    ItemRef {
        name: data_ref.name.clone(),
        resolved: resolve(items, names, &data_ref.name, &qualifiers),
        qualifiers,
        range: data_ref.range.clone(),
    }
}

/// Items named `name` whose qualification chain contains `qualifiers` in order
pub(crate) fn resolve(
    items: &[DataItem],
    names: &BTreeMap<String, Vec<ItemId>>,
    name: &str,
    qualifiers: &[String],
) -> Vec<ItemId> {
    let Some(ids) = names.get(&name.to_ascii_uppercase()) else {
        return Vec::new();
    };
    ids.iter()
        .copied()
        .filter(|id| {
            items
                .get(*id as usize)
                .is_some_and(|item| qualifies(&item.qualification, qualifiers))
        })
        .collect()
}

fn qualifies(chain: &[String], qualifiers: &[String]) -> bool {
    let mut chain = chain.iter();
    qualifiers
        .iter()
        .all(|q| chain.any(|link| link.eq_ignore_ascii_case(q)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(links: &[&str]) -> Vec<String> {
        links.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn qualifiers_must_appear_in_order() {
        let links = chain(&["DETAIL", "CUSTOMER-REC", "CUST-FILE"]);
        assert!(qualifies(&links, &[]));
        assert!(qualifies(&links, &chain(&["CUSTOMER-REC"])));
        assert!(qualifies(&links, &chain(&["detail", "CUST-FILE"])));
        assert!(!qualifies(&links, &chain(&["CUST-FILE", "DETAIL"])));
        assert!(!qualifies(&links, &chain(&["OTHER-REC"])));
    }
}
