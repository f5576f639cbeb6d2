//! Router wiring, grounded on `local_backend::router`'s `ServiceBuilder`
//! layering and `utoipa_axum::OpenApiRouter` registration style.

use std::time::Duration;

use axum::http::{
    HeaderValue,
    Method,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{
        AllowOrigin,
        CorsLayer,
    },
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::dispatcher::{
    consume_bulk,
    DispatcherState,
};

#[derive(OpenApi)]
#[openapi(paths(crate::dispatcher::consume_bulk))]
struct BulkConsumeApiDoc;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(vec![Method::GET])
        .allow_origin(AllowOrigin::predicate(|_origin: &HeaderValue, _parts| true))
        .max_age(Duration::from_secs(86400))
}

pub fn router(state: DispatcherState) -> axum::Router {
    let (router, _openapi_spec) = OpenApiRouter::with_openapi(BulkConsumeApiDoc::openapi())
        .routes(utoipa_axum::routes!(consume_bulk))
        .with_state(state)
        .split_for_parts();

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors()))
}
