//! Chunk Dispatcher (`spec.md` §4.5): the top-level request handler. Ties
//! together the Cursor Codec, Request Validator, Range Finder, and the
//! external scroll source / formatter collaborators. Grounded on the
//! `#[debug_handler]` + `Result<impl IntoResponse, HttpResponseError>`
//! handler shape in `local_backend::http_actions` and the streaming
//! `IntoResponse` pattern of its `HttpActionResponse`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap,
        HeaderValue,
        StatusCode,
    },
    response::{
        IntoResponse,
        Response,
    },
};
use errors::ErrorMetadata;
use futures::{
    StreamExt,
    TryStreamExt,
};
use serde::Deserialize;

use crate::{
    cursor,
    formatter::{
        format_record,
        StreamFormat,
        SubjectDeduper,
    },
    http_error::{
        HttpResponseError,
        Query,
    },
    knobs,
    model::{
        BulkConsumeState,
        CurrRange,
        IndexTime,
    },
    range_finder::RangeFinder,
    record_source::{
        ScrollSource,
        ScrollSourceFactory,
    },
    search_probe::{
        SearchProbe,
        ThinSearch,
    },
    timer::TimeBudgetTimer,
    validator::{
        validate_against_cursor,
        SubsequentRequestParams,
    },
};

pub type DynThinSearch = Arc<dyn ThinSearch>;
pub type DynScrollSource = Arc<dyn ScrollSource>;

/// Everything the dispatcher needs, injected at construction rather than
/// resolved globally (`spec.md` §9, "Dependency injection") so tests can
/// supply scripted collaborators.
#[derive(Clone)]
pub struct DispatcherState {
    search_probe: Arc<SearchProbe<DynThinSearch>>,
    range_finder: Arc<RangeFinder<DynThinSearch>>,
    scroll_sources: Arc<ScrollSourceFactory<DynScrollSource, DynScrollSource>>,
}

impl DispatcherState {
    pub fn new(thin_search: DynThinSearch, fast_scroll: DynScrollSource, slow_scroll: DynScrollSource) -> Self {
        Self {
            search_probe: Arc::new(SearchProbe::new(thin_search.clone())),
            range_finder: Arc::new(RangeFinder::new(SearchProbe::new(thin_search))),
            scroll_sources: Arc::new(ScrollSourceFactory::new(fast_scroll, slow_scroll)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawQueryParams {
    pub position: Option<String>,
    pub qp: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "with-descendants")]
    pub with_descendants: Option<bool>,
    pub recursive: Option<bool>,
    #[serde(rename = "with-history")]
    pub with_history: Option<bool>,
    #[serde(rename = "with-deleted")]
    pub with_deleted: Option<bool>,
    #[serde(rename = "length-hint")]
    pub length_hint: Option<u32>,
    #[serde(rename = "index-time")]
    pub index_time: Option<i64>,
    #[serde(rename = "to-hint")]
    pub to_hint: Option<i64>,
    #[serde(rename = "slow-bulk")]
    pub slow_bulk: Option<bool>,
    pub format: Option<String>,
}

#[utoipa::path(
    get,
    path = "/_bulk",
    params(
        ("position" = Option<String>, Query, description = "opaque resume cursor from a prior chunk"),
        ("path" = Option<String>, Query, description = "path filter; first request only"),
        ("format" = Option<String>, Query, description = "streamable output format"),
    ),
    responses(
        (status = 200, description = "a chunk of records"),
        (status = 204, description = "no records available right now"),
        (status = 400, description = "client error"),
    )
)]
pub async fn consume_bulk(
    State(state): State<DispatcherState>,
    Query(params): Query<RawQueryParams>,
) -> Result<Response, HttpResponseError> {
    handle(&state, params).await.map_err(HttpResponseError::from)
}

async fn handle(state: &DispatcherState, params: RawQueryParams) -> anyhow::Result<Response> {
    let now = knobs::now_with_settle_margin();
    let session = load_session(&params)?;

    let span = tracing::info_span!(
        "consume_bulk",
        from = session.from,
        recursive = session.recursive,
        with_history = session.with_history,
        with_deleted = session.with_deleted,
        path = session.path.as_deref().unwrap_or("/"),
        chunk_size_hint = session.chunk_size_hint,
    );
    let _entered = span.enter();

    let timer = TimeBudgetTimer::starting_now(*knobs::CONSUME_BULK_BINARY_SEARCH_TIMEOUT);
    let range = resolve_range(state, &session, &timer, now).await?;

    let received_token = params.position.clone().unwrap_or_else(|| {
        cursor::encode(&BulkConsumeState {
            from: 0,
            to: Some(range.to),
            ..session.clone()
        })
    });

    let source = state.scroll_sources.select(params.slow_bulk.unwrap_or(false));
    let thin_search_params = session.thin_search_params();
    let (scroll_result, stream) = source.scroll(&thin_search_params, range.from, range.to).await?;

    if scroll_result.hits == 0 {
        let mut headers = HeaderMap::new();
        headers.insert("X-CM-WELL-N", HeaderValue::from_static("0"));
        headers.insert("X-CM-WELL-POSITION", header_value(&received_token)?);
        return Ok((StatusCode::NO_CONTENT, headers).into_response());
    }

    let format = StreamFormat::parse(params.format.as_deref().unwrap_or("text"))?;
    let next_token = cursor::encode(&BulkConsumeState {
        from: range.to,
        to: range.next_to_hint,
        ..session.clone()
    });

    let mut headers = HeaderMap::new();
    headers.insert("X-CM-WELL-N", header_value(&scroll_result.hits.to_string())?);
    headers.insert("X-CM-WELL-POSITION", header_value(&next_token)?);
    headers.insert("X-CM-WELL-TO", header_value(&range.to.to_string())?);

    let with_history = session.with_history;
    let body_stream = stream
        .scan(SubjectDeduper::new(format, with_history), move |deduper, record| {
            let line = record.map(|r| {
                if deduper.admit(&r) {
                    Some(format!("{}\n", format_record(format, &r)))
                } else {
                    None
                }
            });
            std::future::ready(Some(line))
        })
        .try_filter_map(|maybe_line| std::future::ready(Ok(maybe_line)))
        .map_ok(axum::body::Bytes::from);

    let body = Body::from_stream(body_stream);
    Ok((StatusCode::OK, headers, body).into_response())
}

fn header_value(s: &str) -> anyhow::Result<HeaderValue> {
    Ok(HeaderValue::from_str(s)?)
}

/// Builds the session state for this request: decodes `position` when
/// present (applying the Request Validator first), or constructs a fresh
/// session from the first-request query parameters otherwise.
fn load_session(params: &RawQueryParams) -> anyhow::Result<BulkConsumeState> {
    let session = match &params.position {
        Some(token) => {
            validate_against_cursor(&SubsequentRequestParams {
                qp: params.qp.clone(),
                index_time: params.index_time,
                with_descendants: params.with_descendants,
                recursive: params.recursive,
                with_history: params.with_history,
                with_deleted: params.with_deleted,
                length_hint: params.length_hint,
                to_hint: None, // to-hint is the one parameter the validator must not flag
            })?;
            let mut decoded = cursor::decode(token)?;
            if decoded.to.is_none() {
                decoded.to = params.to_hint;
            }
            decoded
        },
        None => BulkConsumeState {
            from: 0,
            to: params.to_hint,
            path: params.path.clone(),
            with_history: params.with_history.unwrap_or(false),
            with_deleted: params.with_deleted.unwrap_or(false),
            recursive: params.with_descendants.or(params.recursive).unwrap_or(false),
            chunk_size_hint: params.length_hint.unwrap_or(*knobs::DEFAULT_CHUNK_SIZE_HINT),
            // `qp` resolution against the field-types cache is an external
            // collaborator (`spec.md` §6); a fresh session starts unfiltered.
            field_filter: None,
        },
    };
    session
        .validate()
        .map_err(|msg| anyhow::anyhow!(ErrorMetadata::bad_request("InvalidCursor", msg)))?;
    Ok(session)
}

async fn resolve_range(
    state: &DispatcherState,
    session: &BulkConsumeState,
    timer: &TimeBudgetTimer,
    now: IndexTime,
) -> anyhow::Result<CurrRange> {
    if let Some(to) = session.to {
        return Ok(CurrRange::new(session.from, to, None));
    }
    let params = session.thin_search_params();
    if session.from == 0 {
        match state.search_probe.seed(&params).await? {
            None => Ok(CurrRange::new(0, now, None)),
            Some(first_index_time) => {
                state
                    .range_finder
                    .find(&params, first_index_time, session.chunk_size_hint, timer)
                    .await
            },
        }
    } else {
        state
            .range_finder
            .find(&params, session.from, session.chunk_size_hint, timer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body as AxumBody,
        routing::get,
        Router,
    };
    use futures::stream;
    use http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        record_source::{
            ScrolledRecord,
            ScrollResult,
        },
        search_probe::{
            Pagination,
            ProbeResult,
            Sort,
        },
    };

    struct EmptyIndex;
    #[async_trait::async_trait]
    impl ThinSearch for EmptyIndex {
        async fn probe(
            &self,
            _params: &crate::model::ThinSearchParams,
            _pagination: Pagination,
            _sort: Option<Sort>,
        ) -> anyhow::Result<ProbeResult> {
            Ok(ProbeResult::default())
        }
    }

    struct EmptyScroll;
    #[async_trait::async_trait]
    impl ScrollSource for EmptyScroll {
        async fn scroll(
            &self,
            _params: &crate::model::ThinSearchParams,
            _from: IndexTime,
            _to: IndexTime,
        ) -> anyhow::Result<(ScrollResult, futures::stream::BoxStream<'static, anyhow::Result<ScrolledRecord>>)>
        {
            Ok((ScrollResult { hits: 0 }, Box::pin(stream::empty())))
        }
    }

    fn test_router() -> Router {
        let state = DispatcherState::new(Arc::new(EmptyIndex), Arc::new(EmptyScroll), Arc::new(EmptyScroll));
        Router::new().route("/_bulk", get(consume_bulk)).with_state(state)
    }

    /// E1: empty corpus, first request.
    #[tokio::test]
    async fn empty_corpus_first_request_returns_204() {
        let router = test_router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/_bulk?path=/&recursive=true&length-hint=100")
                    .body(AxumBody::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get("X-CM-WELL-N").unwrap(), "0");
        let position = response.headers().get("X-CM-WELL-POSITION").unwrap().to_str().unwrap();
        let decoded = cursor::decode(position).unwrap();
        assert_eq!(decoded.from, 0);
        assert_eq!(decoded.chunk_size_hint, 100);
        assert_eq!(decoded.path.as_deref(), Some("/"));
        assert!(decoded.recursive);
        assert!(decoded.to.is_some());
    }

    /// E4: cursor-parameter conflict.
    #[tokio::test]
    async fn cursor_parameter_conflict_returns_400() {
        let router = test_router();
        let token = cursor::encode(&BulkConsumeState {
            from: 0,
            to: Some(100),
            path: None,
            with_history: false,
            with_deleted: false,
            recursive: true,
            chunk_size_hint: 100,
            field_filter: None,
        });
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/_bulk?position={token}&with-history=true"))
                    .body(AxumBody::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("with-history"));
        assert!(text.contains("determined in the beginning of the iteration"));
    }

    /// A `recursive=...` conflict must be named as `recursive`, not as its
    /// `with-descendants` synonym, which the client never sent.
    #[tokio::test]
    async fn cursor_parameter_conflict_names_the_synonym_actually_sent() {
        let router = test_router();
        let token = cursor::encode(&BulkConsumeState {
            from: 0,
            to: Some(100),
            path: None,
            with_history: false,
            with_deleted: false,
            recursive: true,
            chunk_size_hint: 100,
            field_filter: None,
        });
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/_bulk?position={token}&recursive=true"))
                    .body(AxumBody::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("`recursive`"));
        assert!(!text.contains("with-descendants"));
    }
}
