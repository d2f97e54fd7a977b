use lens_model::ProgramModel;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::unit_index::{Occurrence, UnitIndex};

/// A unit's model together with the index built from it
#[derive(Debug, Clone)]
pub struct UnitEntry {
    pub model: Arc<ProgramModel>,
    pub index: Arc<UnitIndex>,
}

impl UnitEntry {
    pub fn new(model: ProgramModel) -> Self {
        let index = UnitIndex::build(&model);
        Self {
            model: Arc::new(model),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.model.unit_id
    }
}

/// Immutable view of every committed unit.
///
/// Readers hold an `Arc` to one snapshot; commits build the next snapshot off to the
/// side, so a reader never sees a half-replaced unit.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    units: BTreeMap<String, UnitEntry>,
    /// Units whose last ingestion failed as a whole → reason
    failed: BTreeMap<String, String>,
    generation: u64,
}

impl CorpusSnapshot {
    #[must_use]
    pub fn unit(&self, unit_id: &str) -> Option<&UnitEntry> {
        self.units.get(unit_id)
    }

    /// Units in id order
    pub fn units(&self) -> impl Iterator<Item = &UnitEntry> {
        self.units.values()
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn failed(&self) -> &BTreeMap<String, String> {
        &self.failed
    }

    /// Bumped by every commit or removal
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Units restricted to `unit_id` when given
    pub fn scope<'a>(&'a self, unit_id: Option<&str>) -> impl Iterator<Item = &'a UnitEntry> + 'a {
        let wanted = unit_id.map(str::to_owned);
        self.units
            .iter()
            .filter(move |(id, _)| {
                wanted
                    .as_deref()
                    .map_or(true, |wanted| wanted.eq_ignore_ascii_case(id))
            })
            .map(|(_, entry)| entry)
    }

    /// Occurrences of `name` across units (or within one), unit order then source order
    pub fn occurrences<'a>(
        &'a self,
        name: &'a str,
        unit_id: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a UnitEntry, &'a Occurrence)> + 'a {
        self.scope(unit_id)
            .flat_map(move |entry| entry.index.exact(name).iter().map(move |occ| (entry, occ)))
    }

    /// Unit whose PROGRAM-ID (or unit id) is `program`
    #[must_use]
    pub fn unit_for_program(&self, program: &str) -> Option<&UnitEntry> {
        self.units
            .values()
            .find(|entry| entry.model.program_name().eq_ignore_ascii_case(program))
    }
}

/// Shared corpus: one write partition per unit, swapped in atomically
#[derive(Debug, Default)]
pub struct Corpus {
    current: RwLock<Arc<CorpusSnapshot>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed state; cheap, never blocks on index construction
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace (or add) one unit. The index is built before the lock is taken.
    pub fn commit(&self, model: ProgramModel) -> Arc<CorpusSnapshot> {
        self.commit_entry(UnitEntry::new(model))
    }

    pub fn commit_entry(&self, entry: UnitEntry) -> Arc<CorpusSnapshot> {
        let unit_id = entry.unit_id().to_string();
        self.update(move |next| {
            next.failed.remove(&unit_id);
            next.units.insert(unit_id, entry);
        })
    }

    /// Drop a unit and any record of its failure
    pub fn remove(&self, unit_id: &str) -> Arc<CorpusSnapshot> {
        self.update(|next| {
            next.units.remove(unit_id);
            next.failed.remove(unit_id);
        })
    }

    /// Record a fatal-to-unit failure; any previous model for the unit is discarded
    pub fn mark_failed(&self, unit_id: &str, reason: impl Into<String>) -> Arc<CorpusSnapshot> {
        let reason = reason.into();
        self.update(|next| {
            next.units.remove(unit_id);
            next.failed.insert(unit_id.to_string(), reason);
        })
    }

    fn update(&self, apply: impl FnOnce(&mut CorpusSnapshot)) -> Arc<CorpusSnapshot> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = CorpusSnapshot::clone(&guard);
        apply(&mut next);
        next.generation += 1;
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_frontend::{Frontend, FrontendConfig, InMemoryResolver};
    use lens_model::ModelBuilder;

    fn model(unit: &str, paragraph: &str) -> ProgramModel {
        let text = format!(
            "       IDENTIFICATION DIVISION.\n       PROGRAM-ID. {unit}.\n       PROCEDURE DIVISION.\n       {paragraph}.\n           STOP RUN.\n"
        );
        let config = FrontendConfig::standard();
        let resolver = InMemoryResolver::new();
        let frontend = Frontend::new(&config, &resolver);
        ModelBuilder::new()
            .analyze(&frontend, unit, None, &text)
            .unwrap()
    }

    #[test]
    fn readers_keep_their_snapshot_across_commits() {
        let corpus = Corpus::new();
        corpus.commit(model("PAY01", "OLD-PARA"));
        let before = corpus.snapshot();

        corpus.commit(model("PAY01", "NEW-PARA"));
        let after = corpus.snapshot();

        assert_eq!(before.occurrences("OLD-PARA", None).count(), 1);
        assert_eq!(before.occurrences("NEW-PARA", None).count(), 0);
        assert_eq!(after.occurrences("OLD-PARA", None).count(), 0);
        assert_eq!(after.occurrences("NEW-PARA", None).count(), 1);
        assert!(after.generation() > before.generation());
    }

    #[test]
    fn units_are_independent_partitions() {
        let corpus = Corpus::new();
        corpus.commit(model("PAY01", "MAIN-PARA"));
        corpus.commit(model("PAY02", "MAIN-PARA"));
        let pay02 = Arc::clone(&corpus.snapshot().unit("PAY02").unwrap().index);

        corpus.commit(model("PAY01", "OTHER-PARA"));
        let snapshot = corpus.snapshot();
        assert!(Arc::ptr_eq(&pay02, &snapshot.unit("PAY02").unwrap().index));
        assert_eq!(snapshot.occurrences("MAIN-PARA", Some("PAY02")).count(), 1);
        assert_eq!(snapshot.occurrences("MAIN-PARA", Some("PAY01")).count(), 0);
    }

    fn scoped<'a>(snapshot: &'a CorpusSnapshot, unit: &str) -> Vec<&'a UnitEntry> {
        let wanted = unit.to_ascii_lowercase();
        snapshot.scope(Some(&wanted)).collect()
    }

    #[test]
    fn scope_outlives_the_filter_key() {
        let corpus = Corpus::new();
        corpus.commit(model("PAY01", "MAIN-PARA"));
        corpus.commit(model("PAY02", "MAIN-PARA"));
        let snapshot = corpus.snapshot();

        let units = scoped(&snapshot, "PAY02");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id(), "PAY02");
        assert!(scoped(&snapshot, "PAY03").is_empty());
        assert_eq!(snapshot.scope(None).count(), 2);
    }

    #[test]
    fn failure_replaces_the_model_and_commit_clears_it() {
        let corpus = Corpus::new();
        corpus.commit(model("PAY01", "MAIN-PARA"));
        corpus.mark_failed("PAY01", "no division headers found");
        let snapshot = corpus.snapshot();
        assert!(snapshot.unit("PAY01").is_none());
        assert!(snapshot.failed().contains_key("PAY01"));

        corpus.commit(model("PAY01", "MAIN-PARA"));
        assert!(corpus.snapshot().failed().is_empty());
        corpus.remove("PAY01");
        assert!(corpus.snapshot().is_empty());
    }
}
