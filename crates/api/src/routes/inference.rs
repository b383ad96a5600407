use crate::{
    models::{ErrorResponse, InferenceQuery, InferenceRequestBody},
    AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json as ResponseJson, Response},
};
use futures::StreamExt;
use inference_providers::ChatMessage;
use services::inference::{forward_frames, InferenceServiceError, RelayStream};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Stream a tutoring answer for the player's help request
///
/// Rejected requests get a JSON error and nothing is sent upstream. Accepted
/// requests get a chunked `text/event-stream` body made of `data: <fragment>`
/// frames, optionally ended by a single `error: <message>` frame. Newlines in
/// payloads are sent as the two characters `\n`.
#[utoipa::path(
    post,
    path = "/llm-inference-stream",
    params(InferenceQuery),
    request_body = InferenceRequestBody,
    responses(
        (status = 200, description = "Answer stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Failed before streaming", body = ErrorResponse)
    ),
    tag = "Inference"
)]
pub async fn llm_inference_stream(
    State(app_state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let query = match query {
        Ok(Query(pairs)) => InferenceQuery::from_pairs(pairs),
        Err(rejection) => {
            debug!("Unparseable query string treated as empty: {}", rejection);
            InferenceQuery::default()
        }
    };

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!("Unreadable request body: {}", rejection);
            return match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => {
                    error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                }
                _ => error_response(StatusCode::BAD_REQUEST, "Invalid request body"),
            };
        }
    };

    let body: InferenceRequestBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            debug!("Rejected request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let level_id = query.level_id();
    let modality = query.modality();
    let messages: Vec<ChatMessage> = body.messages.into_iter().map(Into::into).collect();

    match app_state
        .inference_service
        .start_inference_stream(level_id, query.language, modality, messages)
        .await
    {
        Ok(relay) => stream_response(relay, app_state.shutdown.child_token()),
        Err(InferenceServiceError::Validation(e)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ InferenceServiceError::PreStream(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, ResponseJson(ErrorResponse::new(message))).into_response()
}

/// Hand the relay to a driver task and stream whatever it forwards
///
/// The channel holds a single frame. Dropping the response body closes the
/// receiver, which the driver treats as a client disconnect.
fn stream_response(relay: RelayStream, shutdown: CancellationToken) -> Response {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(forward_frames(relay, tx, shutdown));

    let frames = ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(frame.to_bytes()));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}
