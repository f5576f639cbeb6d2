//! Scroll source (`spec.md` §6): the external collaborator that actually
//! streams record bodies for a resolved `[from, to)` range. The core only
//! needs a hit count plus a stream of already-formatted-ready records; it
//! never interprets record contents itself.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::model::{
    IndexTime,
    ThinSearchParams,
};

/// One record as the scroll source hands it to the formatter: enough to
/// format any of the accepted streamable formats, not a full document.
#[derive(Clone, Debug)]
pub struct ScrolledRecord {
    pub path: String,
    pub index_time: IndexTime,
    pub subject: String,
    pub deleted: bool,
    pub data: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug)]
pub struct ScrollResult {
    pub hits: u64,
}

/// A streamed scroll over `[from, to)`. Implementations choose their own
/// concurrency; the fast and slow variants below differ only in that
/// respect, not in the records they produce.
#[async_trait]
pub trait ScrollSource: Send + Sync {
    async fn scroll(
        &self,
        params: &ThinSearchParams,
        from: IndexTime,
        to: IndexTime,
    ) -> anyhow::Result<(ScrollResult, BoxStream<'static, anyhow::Result<ScrolledRecord>>)>;
}

/// Selects between the fast (parallelised) and slow (`slow-bulk`) scroll
/// source per `spec.md` §6: "the slow variant is selected when the client
/// supplies `slow-bulk`."
pub struct ScrollSourceFactory<F, Sl> {
    fast: F,
    slow: Sl,
}

impl<F, Sl> ScrollSourceFactory<F, Sl>
where
    F: ScrollSource,
    Sl: ScrollSource,
{
    pub fn new(fast: F, slow: Sl) -> Self {
        Self { fast, slow }
    }

    pub fn select(&self, slow_bulk: bool) -> &dyn ScrollSource {
        if slow_bulk {
            &self.slow
        } else {
            &self.fast
        }
    }
}

#[async_trait]
impl ScrollSource for std::sync::Arc<dyn ScrollSource> {
    async fn scroll(
        &self,
        params: &ThinSearchParams,
        from: IndexTime,
        to: IndexTime,
    ) -> anyhow::Result<(ScrollResult, BoxStream<'static, anyhow::Result<ScrolledRecord>>)> {
        (**self).scroll(params, from, to).await
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    struct FixedScroll {
        hits: u64,
    }

    #[async_trait]
    impl ScrollSource for FixedScroll {
        async fn scroll(
            &self,
            _params: &ThinSearchParams,
            _from: IndexTime,
            _to: IndexTime,
        ) -> anyhow::Result<(ScrollResult, BoxStream<'static, anyhow::Result<ScrolledRecord>>)> {
            Ok((ScrollResult { hits: self.hits }, Box::pin(stream::empty())))
        }
    }

    fn params() -> ThinSearchParams {
        ThinSearchParams {
            path_filter: None,
            field_filter: None,
            with_history: false,
            with_deleted: false,
        }
    }

    #[tokio::test]
    async fn selects_slow_on_slow_bulk() {
        let factory = ScrollSourceFactory::new(FixedScroll { hits: 1 }, FixedScroll { hits: 2 });
        let (fast_result, _) = factory.select(false).scroll(&params(), 0, 1).await.unwrap();
        let (slow_result, _) = factory.select(true).scroll(&params(), 0, 1).await.unwrap();
        assert_eq!(fast_result.hits, 1);
        assert_eq!(slow_result.hits, 2);
    }
}
