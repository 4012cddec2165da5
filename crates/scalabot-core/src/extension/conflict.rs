//! Conflict detection over search results.
//!
//! A coordinate is only loaded when exactly one package wins the search.
//! Several packages claiming the same coordinate at the winning tier could
//! be a planted package shadowing the intended one, so they are never
//! loaded.

use std::fmt::Write as _;

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::finder::SearchResult;
use crate::extension::package::ResolvedPackage;

/// Decision for one search result.
#[derive(Debug, Clone)]
pub enum Verdict {
    NotFound,
    /// Hits of the winning tier.
    Conflict(SearchResult),
    Unique(ResolvedPackage),
}

/// Keep only the finders sharing the lowest priority among non-empty
/// results.
pub fn highest_priority_results(result: &SearchResult) -> SearchResult {
    let non_empty = result.hits.iter().filter(|h| !h.packages.is_empty());
    let Some(top) = non_empty.clone().map(|h| h.priority).min() else {
        return SearchResult::default();
    };
    SearchResult::new(non_empty.filter(|h| h.priority == top).cloned().collect())
}

/// Whether the winning tier is ambiguous.
///
/// True when more than one finder of the winning tier produced packages, or
/// when its single finder produced more than one package.
pub fn has_conflict(result: &SearchResult) -> bool {
    let top = highest_priority_results(result);
    match top.hits.as_slice() {
        [] => false,
        [only] => only.packages.len() > 1,
        _ => true,
    }
}

/// Decide what to load for a search result.
pub fn evaluate(result: &SearchResult) -> Verdict {
    let top = highest_priority_results(result);
    match top.hits.as_slice() {
        [] => Verdict::NotFound,
        [only] if only.packages.len() == 1 => Verdict::Unique(only.packages[0].clone()),
        _ => Verdict::Conflict(top),
    }
}

/// Render the operator-facing report for a conflicting coordinate.
pub fn describe_conflict(bot: &str, coordinate: &ExtensionCoordinate, result: &SearchResult) -> String {
    let mut message = format!(
        "[Bot {}] Extension package {} matches multiple packages and was not loaded:",
        bot, coordinate
    );
    for hits in &result.hits {
        let _ = write!(
            message,
            "\n\t- Finder `{}` (Priority: {}) found the following packages:",
            hits.finder, hits.priority
        );
        for package in &hits.packages {
            let _ = write!(message, "\n\t\t* {}", package.origin);
        }
    }
    message
}
