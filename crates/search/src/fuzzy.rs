use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};

/// Fuzzy ranking of indexed names using nucleo-matcher
pub struct FuzzySearch {
    matcher: Matcher,
}

impl FuzzySearch {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    /// Score every candidate against `query`.
    /// Returns (candidate index, score), best first, ties in candidate order
    pub fn rank(&mut self, query: &str, candidates: &[&str], limit: usize) -> Vec<(usize, u32)> {
        let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);

        let mut scored: Vec<(usize, u32)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(idx, candidate)| {
                let haystack = Utf32String::from(*candidate);
                pattern
                    .score(haystack.slice(..), &mut self.matcher)
                    .map(|score| (idx, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_names_rank_first() {
        let mut fuzzy = FuzzySearch::new();
        let names = ["CUSTOMER-REC", "UPDATE-BALANCE", "BALANCE"];
        let results = fuzzy.rank("updbal", &names, 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn matching_ignores_case() {
        let mut fuzzy = FuzzySearch::new();
        let results = fuzzy.rank("balance", &["BALANCE"], 5);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let mut fuzzy = FuzzySearch::new();
        assert!(fuzzy.rank("zzq", &["BALANCE", "MAIN-PARA"], 5).is_empty());
    }
}
