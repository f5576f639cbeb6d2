//! HTTP error plumbing, grounded on `common::http::{HttpError,
//! HttpResponseError, extract}` from the teacher. We don't pull in the
//! teacher's `common` crate itself (it drags in the entire Convex value /
//! shape-inference type system, which is out of scope here), so this module
//! re-derives the same small pattern: `anyhow::Error` chains tagged with
//! [`errors::ErrorMetadata`] become JSON error responses with the matching
//! status code, and every error that makes it here is logged once at
//! `ERROR`.

use std::borrow::Cow;

use axum::{
    extract::{
        FromRequest,
        FromRequestParts,
        Request,
    },
    http::request::Parts,
    response::{
        IntoResponse,
        Response,
    },
};
use errors::ErrorMetadataAnyhowExt;
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};

#[derive(Serialize, Deserialize)]
struct ResponseErrorMessage {
    code: Cow<'static, str>,
    message: Cow<'static, str>,
}

/// Converts a tagged `anyhow::Error` into an HTTP response. All handlers in
/// this crate return `Result<_, HttpResponseError>`.
#[derive(Debug)]
pub struct HttpResponseError {
    trace: anyhow::Error,
}

impl From<anyhow::Error> for HttpResponseError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            trace: err.last_second_classification(),
        }
    }
}

impl IntoResponse for HttpResponseError {
    fn into_response(self) -> Response {
        let status = self.trace.http_status();
        let code = self.trace.short_msg().to_string();
        let message = self.trace.msg().to_string();
        tracing::error!(
            status = %status,
            code = %code,
            error = %self.trace,
            "bulk consume request failed"
        );
        (
            status,
            axum::Json(ResponseErrorMessage {
                code: code.into(),
                message: message.into(),
            }),
        )
            .into_response()
    }
}

/// Wrapper around `axum::extract::Query` that rejects with
/// [`HttpResponseError`] instead of axum's default plaintext rejection, so
/// malformed query strings get the same `{code, message}` JSON shape as
/// every other client error.
pub struct Query<T>(pub T);

#[async_trait::async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HttpResponseError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        #[allow(clippy::disallowed_types)]
        let q = axum::extract::Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                anyhow::anyhow!(errors::ErrorMetadata::bad_request(
                    "BadQueryArgs",
                    e.to_string()
                ))
            })?;
        Ok(Self(q.0))
    }
}

pub struct Json<T>(pub T);

#[async_trait::async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpResponseError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        #[allow(clippy::disallowed_types)]
        let j = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| {
                anyhow::anyhow!(errors::ErrorMetadata::bad_request(
                    "BadJsonBody",
                    e.body_text()
                ))
            })?;
        Ok(Self(j.0))
    }
}
