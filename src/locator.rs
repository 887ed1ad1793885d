use crate::host::FolderNode;
use serde::Serialize;

/// Which naming convention a library folder satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchRule {
    /// Name contains `"{marker} {n}"`.
    MarkerSpaced,
    /// Name contains `"{marker}{n}"`.
    MarkerJoined,
    /// Name starts with `"{n} "`.
    NumberPrefix,
    /// Name is exactly `"{n}"`.
    ExactNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMatch {
    pub folder: FolderNode,
    pub rule: MatchRule,
}

/// Finds the library folder for a lesson number.
///
/// Matching is substring/prefix based: with the default permissive mode a
/// folder named `"{marker} 15"` also satisfies lesson 1. `strict` rejects a
/// marker match whose number continues with another digit.
#[derive(Debug, Clone)]
pub struct Locator {
    marker: String,
    strict: bool,
}

impl Locator {
    pub fn new(marker: &str, strict: bool) -> Self {
        Self {
            marker: marker.trim().to_string(),
            strict,
        }
    }

    pub fn rule_for(&self, name: &str, number: u32) -> Option<MatchRule> {
        let n = number.to_string();
        if self.contains(name, &format!("{} {}", self.marker, n)) {
            return Some(MatchRule::MarkerSpaced);
        }
        if self.contains(name, &format!("{}{}", self.marker, n)) {
            return Some(MatchRule::MarkerJoined);
        }
        if name.starts_with(&format!("{} ", n)) {
            return Some(MatchRule::NumberPrefix);
        }
        if name == n {
            return Some(MatchRule::ExactNumber);
        }
        None
    }

    /// First candidate, in enumeration order, that matches `number`.
    pub fn find_next<'a>(&self, candidates: &'a [FolderNode], number: u32) -> Option<&'a FolderNode> {
        candidates
            .iter()
            .find(|c| self.rule_for(&c.name, number).is_some())
    }

    /// Every matching candidate in enumeration order.
    pub fn matching(&self, candidates: &[FolderNode], number: u32) -> Vec<FolderMatch> {
        candidates
            .iter()
            .filter_map(|c| {
                self.rule_for(&c.name, number).map(|rule| FolderMatch {
                    folder: c.clone(),
                    rule,
                })
            })
            .collect()
    }

    fn contains(&self, haystack: &str, needle: &str) -> bool {
        if !self.strict {
            return haystack.contains(needle);
        }
        haystack.match_indices(needle).any(|(at, m)| {
            !haystack[at + m.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        })
    }
}
