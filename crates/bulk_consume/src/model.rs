//! The data model shared by every component of the bulk consume coordinator.
//!
//! Types here are intentionally thin: the core only needs to know enough
//! about a [`FieldFilter`] to conjoin it with an `indexTime` bound, and
//! enough about [`BulkConsumeState`] to validate and round-trip it through
//! the cursor codec.

use serde::{
    Deserialize,
    Serialize,
};

/// Milliseconds since the Unix epoch. Signed because range-finder arithmetic
/// can transiently underflow zero before being rejected by validation.
pub type IndexTime = i64;

/// A leaf comparator inside a [`FieldFilter`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

/// A recursive `{Must, Should, MustNot}` predicate tree over leaf
/// `(fieldName, comparator, value?)` triples. The core never interprets a
/// leaf's meaning; it only knows how to conjoin the whole tree with an
/// `indexTime` range clause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
pub enum FieldFilter {
    Must(Vec<FieldFilter>),
    Should(Vec<FieldFilter>),
    MustNot(Box<FieldFilter>),
    Leaf {
        field: String,
        comparator: Comparator,
        value: Option<String>,
    },
}

impl FieldFilter {
    /// Conjoin an optional field filter with `indexTime ≥ from ∧ indexTime <
    /// to`, preserving the semantics of a top-level `Should`.
    ///
    /// A bare top-level `Should` is a disjunction; ANDing the time clause
    /// directly onto it would let any one of the disjuncts satisfy the whole
    /// expression without the time bound ever being checked. Wrapping it in
    /// a `Must` first is mandatory (see `spec.md` §3 / §9).
    pub fn conjoin_time_range(filter: Option<FieldFilter>, from: IndexTime, to: IndexTime) -> Self {
        let time_clause = FieldFilter::Must(vec![
            FieldFilter::Leaf {
                field: "indexTime".to_string(),
                comparator: Comparator::Gte,
                value: Some(from.to_string()),
            },
            FieldFilter::Leaf {
                field: "indexTime".to_string(),
                comparator: Comparator::Lt,
                value: Some(to.to_string()),
            },
        ]);
        match filter {
            None => time_clause,
            Some(should @ FieldFilter::Should(_)) => {
                FieldFilter::Must(vec![FieldFilter::Must(vec![should]), time_clause])
            },
            Some(other) => FieldFilter::Must(vec![other, time_clause]),
        }
    }
}

/// A `(path, recursive?)` pair. Canonicalizes `("/", true)` — "match
/// everything under the root, recursively" — to "no path filter at all",
/// since they're equivalent and the latter is cheaper to evaluate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
pub struct PathFilter {
    pub path: String,
    pub recursive: bool,
}

impl PathFilter {
    pub fn new(path: impl Into<String>, recursive: bool) -> Option<Self> {
        let path = path.into();
        if path == "/" && recursive {
            None
        } else {
            Some(Self { path, recursive })
        }
    }
}

/// The invariant selection criteria of an iteration session: the parameters
/// a [`ThinSearch`](crate::search_probe::ThinSearch) probe needs besides the
/// time range itself.
#[derive(Clone, Debug, PartialEq)]
pub struct ThinSearchParams {
    pub path_filter: Option<PathFilter>,
    pub field_filter: Option<FieldFilter>,
    pub with_history: bool,
    pub with_deleted: bool,
}

/// The opaque cursor payload. Created on the first request (`from = 0`),
/// mutated only by the server between chunks, never inspected or mutated by
/// the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
pub struct BulkConsumeState {
    pub from: IndexTime,
    pub to: Option<IndexTime>,
    pub path: Option<String>,
    pub with_history: bool,
    pub with_deleted: bool,
    pub recursive: bool,
    pub chunk_size_hint: u32,
    pub field_filter: Option<FieldFilter>,
}

impl BulkConsumeState {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.from < 0 {
            return Err("from must be >= 0");
        }
        if let Some(to) = self.to
            && to <= self.from
        {
            return Err("toOpt must be > from");
        }
        if self.chunk_size_hint == 0 {
            return Err("chunkSizeHint must be > 0");
        }
        Ok(())
    }

    pub fn path_filter(&self) -> Option<PathFilter> {
        PathFilter::new(self.path.clone()?, self.recursive)
    }

    pub fn thin_search_params(&self) -> ThinSearchParams {
        ThinSearchParams {
            path_filter: self.path_filter(),
            field_filter: self.field_filter.clone(),
            with_history: self.with_history,
            with_deleted: self.with_deleted,
        }
    }
}

/// The resolved `[from, to)` range for the current chunk, plus an optional
/// cheaply-learned upper bound for the *next* chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrRange {
    pub from: IndexTime,
    pub to: IndexTime,
    pub next_to_hint: Option<IndexTime>,
}

impl CurrRange {
    pub fn new(from: IndexTime, to: IndexTime, next_to_hint: Option<IndexTime>) -> Self {
        Self {
            from,
            to,
            next_to_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_filter_canonicalizes_root_recursive() {
        assert_eq!(PathFilter::new("/", true), None);
        assert!(PathFilter::new("/", false).is_some());
        assert!(PathFilter::new("/foo", true).is_some());
    }

    #[test]
    fn conjoin_wraps_top_level_should() {
        let should = FieldFilter::Should(vec![FieldFilter::Leaf {
            field: "a".to_string(),
            comparator: Comparator::Eq,
            value: Some("1".to_string()),
        }]);
        let conjoined = FieldFilter::conjoin_time_range(Some(should.clone()), 0, 100);
        match conjoined {
            FieldFilter::Must(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], FieldFilter::Must(vec![should]));
            },
            other => panic!("expected Must wrapper, got {other:?}"),
        }
    }

    #[test]
    fn conjoin_with_no_filter_is_just_time_clause() {
        let conjoined = FieldFilter::conjoin_time_range(None, 10, 20);
        match conjoined {
            FieldFilter::Must(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected Must wrapper, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_bad_state() {
        let mut s = BulkConsumeState {
            from: -1,
            to: None,
            path: None,
            with_history: false,
            with_deleted: false,
            recursive: true,
            chunk_size_hint: 100,
            field_filter: None,
        };
        assert!(s.validate().is_err());
        s.from = 0;
        assert!(s.validate().is_ok());
        s.to = Some(0);
        assert!(s.validate().is_err());
        s.to = Some(1);
        assert!(s.validate().is_ok());
        s.chunk_size_hint = 0;
        assert!(s.validate().is_err());
    }
}
