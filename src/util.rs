//! Keyword matching helpers.
//!
//! Term lists are compiled into case-insensitive regular expressions once
//! and shared through a process-wide cache keyed by a hash of the list.

use ahash::AHasher;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A compiled term list. Matches when any of its terms is found anywhere in
/// the haystack, ignoring case.
#[derive(Clone, Debug)]
pub struct TermMatcher {
    patterns: Vec<Regex>,
}

impl TermMatcher {
    /// Compile `terms`. Each term is trimmed and treated as a pattern; a term
    /// that does not compile is matched literally instead.
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Self {
        let patterns = terms
            .iter()
            .map(|t| compile_term(t.as_ref().trim()))
            .collect();
        Self { patterns }
    }

    pub fn is_match(&self, hay: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(hay))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_term(term: &str) -> Regex {
    match RegexBuilder::new(term).case_insensitive(true).build() {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(term = %term, error = %err, "term is not a valid pattern, matching literally");
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
                .expect("escaped literal compiles")
        }
    }
}

static MATCHER_CACHE: Lazy<DashMap<u64, Arc<TermMatcher>>> = Lazy::new(DashMap::new);

/// Return the shared matcher for `terms`, compiling it on first use.
pub fn matcher_for<S: AsRef<str>>(terms: &[S]) -> Arc<TermMatcher> {
    let mut hasher = AHasher::default();
    for term in terms {
        term.as_ref().hash(&mut hasher);
    }
    let key = hasher.finish();
    if let Some(existing) = MATCHER_CACHE.get(&key) {
        return existing.clone();
    }
    let matcher = Arc::new(TermMatcher::new(terms));
    MATCHER_CACHE.insert(key, matcher.clone());
    matcher
}

/// True when `body` is present, non-empty and contains any of `terms`
/// (case-insensitive).
pub fn has_matches<S: AsRef<str>>(body: Option<&str>, terms: &[S]) -> bool {
    match body {
        None | Some("") => false,
        Some(text) => matcher_for(terms).is_match(text),
    }
}
