//! Request handlers.
//!
//! `/play` keeps the wire format plain: the outcome is a JSON string literal
//! followed by a newline, and errors are short text lines.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use opentelemetry::trace::TraceContextExt;
use serde::Serialize;
use thiserror::Error;

use crate::game::{GameService, Selection};
use crate::http::middleware::TraceContext;
use crate::observability::ResultTally;

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub game: GameService,
    pub tally: Arc<ResultTally>,
    pub version: String,
}

/// Failures of the `/play` endpoint.
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("Invalid Choice")]
    InvalidChoice(#[source] serde_json::Error),

    #[error("Internal server error")]
    Encode(#[source] serde_json::Error),
}

impl PlayError {
    pub fn status(&self) -> StatusCode {
        match self {
            PlayError::InvalidChoice(_) => StatusCode::BAD_REQUEST,
            PlayError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PlayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, format!("{self}\n")).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}

/// Decode the first JSON value in `body` as a [`Selection`].
///
/// Anything after the first value is ignored. An empty body is an error.
pub fn decode_selection(body: &[u8]) -> Result<Selection, PlayError> {
    match serde_json::Deserializer::from_slice(body)
        .into_iter::<Selection>()
        .next()
    {
        Some(Ok(selection)) => Ok(selection),
        Some(Err(e)) => Err(PlayError::InvalidChoice(e)),
        None => Err(PlayError::InvalidChoice(serde::de::Error::custom(
            "empty request body",
        ))),
    }
}

/// Encode `value` as JSON followed by a newline.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, PlayError> {
    let mut body = serde_json::to_vec(value).map_err(PlayError::Encode)?;
    body.push(b'\n');
    Ok(body)
}

/// `POST /play`
pub async fn play(
    State(state): State<AppState>,
    TraceContext(cx): TraceContext,
    body: Bytes,
) -> Result<Response, PlayError> {
    let selection = decode_selection(&body).inspect_err(|e| {
        tracing::debug!(error = ?e, "Rejected selection");
    })?;

    let outcome = state.game.shoot(&cx, selection);
    let body = encode_line(&outcome).inspect_err(|e| {
        cx.span().set_status(opentelemetry::trace::Status::error(e.to_string()));
        tracing::error!(error = ?e, "Failed to encode outcome");
    })?;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub version: String,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: state.version.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub total: u64,
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<StatsBody> {
    let snapshot = state.tally.snapshot();
    Json(StatsBody {
        wins: snapshot.wins,
        losses: snapshot.losses,
        draws: snapshot.draws,
        total: snapshot.total(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{FixedMove, Move, Outcome};

    fn state() -> AppState {
        let tally = Arc::new(ResultTally::default());
        AppState {
            game: GameService::new(Arc::new(FixedMove::default()), tally.clone()),
            tally,
            version: "1.23".to_string(),
        }
    }

    async fn body_of(response: Response) -> (StatusCode, String, String) {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn decodes_first_value_only() {
        let selection = decode_selection(br#"{"Form":"rock"} trailing garbage"#).unwrap();
        assert_eq!(selection.form, Move::Rock);
    }

    #[test]
    fn rejects_bad_bodies() {
        for body in [
            &b""[..],
            b"   ",
            b"not json",
            br#"{"Form":"lizard"}"#,
            br#"{"Move":"rock"}"#,
            br#"["rock"]"#,
        ] {
            assert!(
                matches!(decode_selection(body), Err(PlayError::InvalidChoice(_))),
                "accepted {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn encodes_outcome_as_json_line() {
        assert_eq!(encode_line(&Outcome::Win).unwrap(), b"\"You Won!\"\n");
    }

    #[tokio::test]
    async fn play_scissors_wins_against_paper() {
        let state = state();
        let response = play(
            State(state.clone()),
            TraceContext(opentelemetry::Context::new()),
            Bytes::from_static(br#"{"Form":"scissors"}"#),
        )
        .await
        .into_response();

        let (status, content_type, body) = body_of(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(body, "\"You Won!\"\n");
        assert_eq!(state.tally.snapshot().wins, 1);
    }

    #[tokio::test]
    async fn invalid_choice_leaves_tally_untouched() {
        let state = state();
        let response = play(
            State(state.clone()),
            TraceContext(opentelemetry::Context::new()),
            Bytes::from_static(br#"{"Form":"spock"}"#),
        )
        .await
        .into_response();

        let (status, content_type, body) = body_of(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(body, "Invalid Choice\n");
        assert_eq!(state.tally.snapshot().total(), 0);
    }

    #[tokio::test]
    async fn stats_reports_total() {
        let state = state();
        for body in [r#"{"Form":"rock"}"#, r#"{"Form":"paper"}"#] {
            play(
                State(state.clone()),
                TraceContext(opentelemetry::Context::new()),
                Bytes::from(body),
            )
            .await
            .unwrap();
        }

        let Json(stats) = stats(State(state)).await;
        assert_eq!((stats.wins, stats.losses, stats.draws), (0, 1, 1));
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn encode_failure_maps_to_internal_error() {
        let err = PlayError::Encode(serde::ser::Error::custom("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = err.into_response();
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        let (status, content_type, body) = body_of(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(body, "Internal server error\n");
    }
}
