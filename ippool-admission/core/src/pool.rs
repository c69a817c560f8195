use crate::k8s::IP_POOL_ANNOTATION;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// The raw value of a template's IP-pool annotation.
///
/// An empty spec means no static pool was requested. Entries are separated
/// by literal commas and are not trimmed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PoolSpec(String);

/// Reads the IP-pool annotation from a template's annotations.
///
/// Returns the value (empty when absent) and whether the annotation was set.
/// Callers treat an explicitly empty annotation the same as a missing one.
pub fn read_pool(annotations: Option<&BTreeMap<String, String>>) -> (PoolSpec, bool) {
    match annotations.and_then(|anns| anns.get(IP_POOL_ANNOTATION)) {
        Some(value) => (PoolSpec(value.clone()), true),
        None => (PoolSpec::default(), false),
    }
}

/// Returns the entries present in exactly one of `old` and `new`.
///
/// Both sides are treated as sets, so ordering and duplicates never produce
/// a difference.
pub fn diff<'a>(
    old: impl IntoIterator<Item = &'a str>,
    new: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<&'a str> {
    let old = old.into_iter().collect::<BTreeSet<_>>();
    let new = new.into_iter().collect::<BTreeSet<_>>();
    old.symmetric_difference(&new).copied().collect()
}

// === impl PoolSpec ===

impl PoolSpec {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the pool's entries.
    ///
    /// An empty spec has no entries. Splitting it naively would yield a single
    /// empty entry, making "no pool" look different from "no pool".
    pub fn pools(&self) -> impl Iterator<Item = &str> + '_ {
        let raw = (!self.0.is_empty()).then_some(self.0.as_str());
        raw.into_iter().flat_map(|raw| raw.split(','))
    }

    /// Returns true if the two specs name different sets of entries.
    pub fn differs(&self, other: &Self) -> bool {
        !diff(self.pools(), other.pools()).is_empty()
    }

    /// Entries in `self` that `prior` did not have.
    pub fn added_since<'a>(&'a self, prior: &'a Self) -> BTreeSet<&'a str> {
        let prior = prior.pools().collect::<BTreeSet<_>>();
        self.pools().filter(|p| !prior.contains(p)).collect()
    }
}

impl From<String> for PoolSpec {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for PoolSpec {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for PoolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
