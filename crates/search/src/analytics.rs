use lens_indexer::UnitEntry;
use lens_model::Complexity;
use lens_protocol::{
    AnalyticsReport, CodebaseOverview, ComplexityDistribution, DependencyPattern, NameCount,
    ProgramFigures, RefactoringReport, RelationshipReport, SizeDistribution,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::QueryEngine;

const TOP_DEPENDENCIES: usize = 5;

/// Cut-offs that make a program a refactoring candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefactoringThresholds {
    /// More source lines than this is a large program
    pub max_source_lines: u32,
    /// More distinct dependencies than this is a highly dependent program
    pub max_dependencies: usize,
}

impl Default for RefactoringThresholds {
    fn default() -> Self {
        Self {
            max_source_lines: 1000,
            max_dependencies: 10,
        }
    }
}

impl QueryEngine {
    /// Corpus-wide size, complexity and dependency figures
    pub fn overview(&self) -> CodebaseOverview {
        let mut programs = 0usize;
        let mut source_lines = 0u64;
        let mut complexity = ComplexityDistribution::default();
        let mut sizes = SizeDistribution::default();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        for entry in self.snapshot().units() {
            let metrics = &entry.model.metrics;
            programs += 1;
            source_lines += u64::from(metrics.source_lines);
            match metrics.complexity() {
                Complexity::Low => complexity.low += 1,
                Complexity::Medium => complexity.medium += 1,
                Complexity::High => complexity.high += 1,
            }
            match metrics.source_lines {
                0..=99 => sizes.small += 1,
                100..=499 => sizes.medium += 1,
                500..=999 => sizes.large += 1,
                _ => sizes.very_large += 1,
            }
            for dependency in dependencies(entry) {
                *counts.entry(dependency).or_default() += 1;
            }
        }

        CodebaseOverview {
            programs,
            source_lines,
            average_source_lines: source_lines.checked_div(programs as u64).unwrap_or(0),
            complexity,
            sizes,
            unique_dependencies: counts.len(),
            common_dependencies: ranked(counts),
        }
    }

    /// Who depends on what, and which programs stand alone
    pub fn relationships(&self) -> RelationshipReport {
        let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut callers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut relationships = 0;
        let mut programs_with_dependencies = 0;
        let mut isolated_programs = Vec::new();

        for entry in self.snapshot().units() {
            let program = entry.model.program_name();
            let deps = dependencies(entry);
            relationships += deps.len();
            if deps.is_empty() {
                isolated_programs.push(program.clone());
            } else {
                programs_with_dependencies += 1;
            }
            for callee in &entry.model.external_calls {
                callers
                    .entry(callee.to_ascii_uppercase())
                    .or_default()
                    .insert(program.clone());
            }
            graph.entry(program).or_default().extend(deps);
        }

        RelationshipReport {
            relationships,
            programs_with_dependencies,
            isolated_programs,
            most_depended_on: ranked(
                callers
                    .into_iter()
                    .map(|(callee, callers)| (callee, callers.len()))
                    .collect(),
            ),
            dependency_graph: graph
                .into_iter()
                .map(|(program, deps)| (program, deps.into_iter().collect()))
                .collect(),
        }
    }

    pub fn refactoring_candidates(&self, thresholds: &RefactoringThresholds) -> RefactoringReport {
        let mut report = RefactoringReport {
            high_complexity: Vec::new(),
            large_programs: Vec::new(),
            highly_dependent: Vec::new(),
            isolated_programs: Vec::new(),
            duplicate_dependencies: Vec::new(),
        };
        let mut patterns: BTreeMap<Vec<String>, Vec<String>> = BTreeMap::new();

        for entry in self.snapshot().units() {
            let metrics = &entry.model.metrics;
            let deps = dependencies(entry);
            let figures = ProgramFigures {
                program: entry.model.program_name(),
                unit: entry.unit_id().to_string(),
                source_lines: metrics.source_lines,
                complexity: metrics.complexity().as_str().to_string(),
                dependencies: deps.len(),
            };

            if metrics.complexity() == Complexity::High {
                report.high_complexity.push(figures.clone());
            }
            if metrics.source_lines > thresholds.max_source_lines {
                report.large_programs.push(figures.clone());
            }
            if deps.len() > thresholds.max_dependencies {
                report.highly_dependent.push(figures.clone());
            }
            if deps.is_empty() {
                report.isolated_programs.push(figures.clone());
            }
            // a single shared copybook is not a pattern
            if deps.len() > 1 {
                patterns.entry(deps).or_default().push(figures.program);
            }
        }

        report.duplicate_dependencies = patterns
            .into_iter()
            .filter(|(_, programs)| programs.len() > 1)
            .map(|(dependencies, programs)| DependencyPattern {
                dependencies,
                programs,
            })
            .collect();
        report
    }

    pub fn analytics(&self, thresholds: &RefactoringThresholds) -> AnalyticsReport {
        AnalyticsReport {
            overview: self.overview(),
            relationships: self.relationships(),
            refactoring: self.refactoring_candidates(thresholds),
        }
    }
}

/// COPY members and literal CALL targets, upper-cased, sorted and distinct
fn dependencies(entry: &UnitEntry) -> Vec<String> {
    let model = &entry.model;
    model
        .copybooks
        .iter()
        .chain(&model.external_calls)
        .map(|name| name.to_ascii_uppercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Highest counts first, ties by name
fn ranked(counts: BTreeMap<String, usize>) -> Vec<NameCount> {
    let mut ranked: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount { name, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_DEPENDENCIES);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_breaks_ties_by_name_and_keeps_the_top() {
        let counts: BTreeMap<String, usize> = [("ZETA", 2), ("ALPHA", 2), ("MID", 5), ("A", 1), ("B", 1), ("C", 1)]
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        let names: Vec<(String, usize)> = ranked(counts)
            .into_iter()
            .map(|entry| (entry.name, entry.count))
            .collect();
        assert_eq!(
            names,
            vec![
                ("MID".to_string(), 5),
                ("ALPHA".to_string(), 2),
                ("ZETA".to_string(), 2),
                ("A".to_string(), 1),
                ("B".to_string(), 1),
            ]
        );
    }

    #[test]
    fn default_thresholds() {
        let thresholds = RefactoringThresholds::default();
        assert_eq!(thresholds.max_source_lines, 1000);
        assert_eq!(thresholds.max_dependencies, 10);
    }
}
