//! The Search Probe component (`spec.md` §4.1): a thin wrapper around the
//! external full-text/indexed-search engine (the [`ThinSearch`] trait is the
//! boundary) that issues exactly the two call shapes the Range Finder needs.

use async_trait::async_trait;

use crate::model::{
    IndexTime,
    ThinSearchParams,
};

/// How many results to skip / take. Mirrors the `(offset, limit)` pairs
/// `spec.md` §4.1 names for the seed and count probes.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub offset: u32,
    pub limit: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sort {
    IndexTimeAsc,
}

/// The result of one probe: a match count, and — only populated when the
/// probe requested results — the first result's `indexTime`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeResult {
    pub total: u64,
    pub first_index_time: Option<IndexTime>,
}

/// The external collaborator: a count-only ("thin") search against the
/// backing index. Implementations are free to be a real search engine (see
/// [`tantivy_backed`]) or a scripted double for tests (see [`scripted`]).
#[async_trait]
pub trait ThinSearch: Send + Sync {
    async fn probe(
        &self,
        params: &ThinSearchParams,
        pagination: Pagination,
        sort: Option<Sort>,
    ) -> anyhow::Result<ProbeResult>;
}

/// Wraps a [`ThinSearch`] implementation and exposes exactly the seed/count
/// operations the Range Finder calls, so callers never have to get the
/// pagination/sort/filter-conjunction contract wrong.
pub struct SearchProbe<S> {
    inner: S,
}

impl<S: ThinSearch> SearchProbe<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Seed probe: offset 1000, limit 1, sorted by `indexTime` ascending, no
    /// upper time bound on the field filter. Returns the 1001st record's
    /// `indexTime`, or `None` if there are fewer than 1001 matching records.
    pub async fn seed(&self, params: &ThinSearchParams) -> anyhow::Result<Option<IndexTime>> {
        let result = self
            .inner
            .probe(
                params,
                Pagination {
                    offset: *crate::knobs::SEED_PROBE_OFFSET,
                    limit: 1,
                },
                Some(Sort::IndexTimeAsc),
            )
            .await?;
        Ok(result.first_index_time)
    }

    /// Count probe: offset 0, limit 1, no sort, field filter conjoined with
    /// `[from, to)`. Only the match count is consumed.
    pub async fn count(
        &self,
        params: &ThinSearchParams,
        from: IndexTime,
        to: IndexTime,
    ) -> anyhow::Result<u64> {
        let bounded = crate::model::ThinSearchParams {
            path_filter: params.path_filter.clone(),
            field_filter: Some(crate::model::FieldFilter::conjoin_time_range(
                params.field_filter.clone(),
                from,
                to,
            )),
            with_history: params.with_history,
            with_deleted: params.with_deleted,
        };
        let result = self
            .inner
            .probe(&bounded, Pagination { offset: 0, limit: 1 }, None)
            .await?;
        Ok(result.total)
    }
}

pub mod scripted;
pub mod tantivy_backed;

#[async_trait]
impl ThinSearch for std::sync::Arc<dyn ThinSearch> {
    async fn probe(
        &self,
        params: &ThinSearchParams,
        pagination: Pagination,
        sort: Option<Sort>,
    ) -> anyhow::Result<ProbeResult> {
        (**self).probe(params, pagination, sort).await
    }
}

#[cfg(test)]
mod tests {
    use super::{
        scripted::ScriptedThinSearch,
        *,
    };
    use crate::model::ThinSearchParams;

    fn params() -> ThinSearchParams {
        ThinSearchParams {
            path_filter: None,
            field_filter: None,
            with_history: false,
            with_deleted: false,
        }
    }

    #[tokio::test]
    async fn seed_reads_first_index_time() {
        let probe = SearchProbe::new(ScriptedThinSearch::seeded(Some(1_000_000)));
        assert_eq!(probe.seed(&params()).await.unwrap(), Some(1_000_000));
    }

    #[tokio::test]
    async fn count_conjoins_time_range() {
        let probe = SearchProbe::new(ScriptedThinSearch::counting(|p, from, to| {
            assert!(p.field_filter.is_some());
            (to - from) as u64
        }));
        assert_eq!(probe.count(&params(), 0, 100).await.unwrap(), 100);
    }
}
