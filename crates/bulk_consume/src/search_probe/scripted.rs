//! An in-memory, deterministic [`ThinSearch`] double for unit-testing the
//! Range Finder without standing up a real index. Grounded on the scripted
//! trait-object test doubles the teacher uses in `database`'s query tests:
//! closures/fixtures stand in for a backing service so state-machine tests
//! assert against exact probe call sequences.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    Pagination,
    ProbeResult,
    Sort,
    ThinSearch,
};
use crate::model::{
    IndexTime,
    ThinSearchParams,
};

/// Records every `probe` call it receives and answers from a caller-supplied
/// closure. Use [`ScriptedThinSearch::seeded`] for a fixed total record
/// count, or [`ScriptedThinSearch::with_responder`] for full control.
pub struct ScriptedThinSearch {
    responder: Box<dyn Fn(&ThinSearchParams, Pagination, Option<Sort>) -> ProbeResult + Send + Sync>,
    calls: Mutex<Vec<(Pagination, Option<Sort>)>>,
}

impl ScriptedThinSearch {
    pub fn with_responder(
        responder: impl Fn(&ThinSearchParams, Pagination, Option<Sort>) -> ProbeResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A corpus with exactly `total` records, uniformly spaced one
    /// millisecond apart starting at `indexTime = 0`. The seed probe returns
    /// the `(offset)`-th timestamp when present.
    pub fn seeded(first_index_time: Option<IndexTime>) -> Self {
        Self::with_responder(move |_params, pagination, sort| {
            if sort == Some(Sort::IndexTimeAsc) {
                ProbeResult {
                    total: 0,
                    first_index_time: if pagination.offset == 0 {
                        None
                    } else {
                        first_index_time
                    },
                }
            } else {
                ProbeResult::default()
            }
        })
    }

    /// A count probe responder: `f(params, from, to) -> total`. Panics if
    /// called as a seed probe (no time range to extract `from`/`to` from).
    pub fn counting(f: impl Fn(&ThinSearchParams, IndexTime, IndexTime) -> u64 + Send + Sync + 'static) -> Self {
        Self::with_responder(move |params, _pagination, _sort| {
            let (from, to) = extract_time_range(params)
                .expect("counting probe requires a conjoined indexTime range");
            ProbeResult {
                total: f(params, from, to),
                first_index_time: None,
            }
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Pulls the `indexTime` bounds out of a filter produced by
/// `FieldFilter::conjoin_time_range`. That constructor has two shapes: with
/// no prior filter, the two range leaves sit directly in the top-level
/// `Must`; with a prior filter, they're nested one `Must` deeper alongside
/// it. Both are checked here.
fn extract_time_range(params: &ThinSearchParams) -> Option<(IndexTime, IndexTime)> {
    use crate::model::{
        Comparator,
        FieldFilter,
    };

    fn leaves(clauses: &[FieldFilter]) -> Option<(IndexTime, IndexTime)> {
        let mut from = None;
        let mut to = None;
        for leaf in clauses {
            if let FieldFilter::Leaf {
                field,
                comparator,
                value,
            } = leaf
            {
                if field != "indexTime" {
                    continue;
                }
                let v: IndexTime = value.as_ref()?.parse().ok()?;
                match comparator {
                    Comparator::Gte => from = Some(v),
                    Comparator::Lt => to = Some(v),
                    _ => {},
                }
            }
        }
        Some((from?, to?))
    }

    let FieldFilter::Must(clauses) = params.field_filter.as_ref()? else {
        return None;
    };
    leaves(clauses).or_else(|| {
        clauses.iter().rev().find_map(|c| match c {
            FieldFilter::Must(inner) => leaves(inner),
            _ => None,
        })
    })
}

#[async_trait]
impl ThinSearch for ScriptedThinSearch {
    async fn probe(
        &self,
        params: &ThinSearchParams,
        pagination: Pagination,
        sort: Option<Sort>,
    ) -> anyhow::Result<ProbeResult> {
        self.calls.lock().push((pagination, sort));
        Ok((self.responder)(params, pagination, sort))
    }
}
