//! Streaming relay between an upstream completion stream and the client response
//!
//! The relay turns provider deltas into wire frames:
//!
//! ```text
//! data: <fragment with \n escaped>\n\n     one per non-empty fragment, in order
//! error: <message with \n escaped>\n\n     at most one, always last
//! ```
//!
//! A stream that ends normally after at least one fragment carries no sentinel.
//! A stream that ends without any fragment, or fails at any point, ends with
//! exactly one error frame.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use inference_providers::{
    ChatCompletionParams, CompletionError, InferenceProvider, StreamingResult,
};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metrics::{consts::*, tag, MetricsServiceTrait};

/// Prefix of every in-band error message
pub const ERROR_PREFIX: &str = "POST llm_inference_stream : ";

/// Replace raw newlines so a payload can never break frame boundaries
pub fn escape_payload(payload: &str) -> String {
    payload.replace('\n', "\\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Data,
    Error,
}

/// One frame of the streamed response body
///
/// Payloads are escaped on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    kind: FrameKind,
    payload: String,
}

impl WireFrame {
    pub fn data(fragment: &str) -> Self {
        Self {
            kind: FrameKind::Data,
            payload: escape_payload(fragment),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            kind: FrameKind::Error,
            payload: escape_payload(message),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn is_error(&self) -> bool {
        self.kind == FrameKind::Error
    }

    pub fn encode(&self) -> String {
        match self.kind {
            FrameKind::Data => format!("data: {}\n\n", self.payload),
            FrameKind::Error => format!("error: {}\n\n", self.payload),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Empty,
    UpstreamError,
    ClientDisconnect,
    Cancelled,
}

impl StreamOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamOutcome::Completed => OUTCOME_COMPLETED,
            StreamOutcome::Empty => OUTCOME_EMPTY,
            StreamOutcome::UpstreamError => OUTCOME_UPSTREAM_ERROR,
            StreamOutcome::ClientDisconnect => OUTCOME_CLIENT_DISCONNECT,
            StreamOutcome::Cancelled => OUTCOME_CANCELLED,
        }
    }
}

type OpenFuture = Pin<Box<dyn Future<Output = Result<StreamingResult, CompletionError>> + Send>>;

enum RelayState {
    /// Upstream not contacted yet
    Idle {
        provider: Arc<dyn InferenceProvider>,
        params: ChatCompletionParams,
    },
    Opening(OpenFuture),
    Streaming(StreamingResult),
    Done,
}

/// Lazy relay over one upstream completion
///
/// The upstream request is only sent on first poll, so an open failure is
/// reported in-band like any other upstream error.
pub struct RelayStream {
    state: RelayState,
    has_content: bool,
    fragments: usize,
    provider_name: String,
    request_id: String,
    metrics: Arc<dyn MetricsServiceTrait>,
    started_at: Instant,
    outcome: Option<StreamOutcome>,
}

impl fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream")
            .field("provider_name", &self.provider_name)
            .field("request_id", &self.request_id)
            .field("has_content", &self.has_content)
            .field("fragments", &self.fragments)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl RelayStream {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        params: ChatCompletionParams,
        metrics: Arc<dyn MetricsServiceTrait>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider.provider_name().to_string(),
            state: RelayState::Idle { provider, params },
            has_content: false,
            fragments: 0,
            request_id: request_id.into(),
            metrics,
            started_at: Instant::now(),
            outcome: None,
        }
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.outcome
    }

    /// Stop relaying and release the upstream connection
    pub fn close(&mut self) {
        if matches!(self.state, RelayState::Done) {
            return;
        }
        self.state = RelayState::Done;
        tracing::info!(
            request_id = %self.request_id,
            fragments = self.fragments,
            "Client disconnected, closing upstream stream"
        );
        self.finish(StreamOutcome::ClientDisconnect);
    }

    /// Stop relaying and produce the final error frame, unless the relay already ended
    pub fn abort(&mut self, reason: &str) -> Option<WireFrame> {
        if matches!(self.state, RelayState::Done) {
            return None;
        }
        self.state = RelayState::Done;
        let message = format!("{ERROR_PREFIX}{reason}");
        tracing::warn!(request_id = %self.request_id, "{}", message);
        self.finish(StreamOutcome::Cancelled);
        Some(WireFrame::error(&message))
    }

    fn fail(&mut self, error: CompletionError) -> WireFrame {
        self.state = RelayState::Done;
        let message = format!("{ERROR_PREFIX}{error}");
        tracing::error!(
            request_id = %self.request_id,
            provider = %self.provider_name,
            fragments = self.fragments,
            "{}",
            message
        );
        self.finish(StreamOutcome::UpstreamError);
        WireFrame::error(&message)
    }

    fn empty(&mut self) -> WireFrame {
        self.state = RelayState::Done;
        let message = format!("{ERROR_PREFIX}empty response from {}", self.provider_name);
        tracing::error!(request_id = %self.request_id, "{}", message);
        self.finish(StreamOutcome::Empty);
        WireFrame::error(&message)
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(outcome);

        let provider_tag = tag(TAG_PROVIDER, &self.provider_name);
        let outcome_tag = tag(TAG_OUTCOME, outcome.as_str());
        let tags = [provider_tag.as_str(), outcome_tag.as_str()];
        self.metrics.record_count(METRIC_STREAM_OUTCOMES, 1, &tags);
        self.metrics
            .record_latency(METRIC_LATENCY_TOTAL, self.started_at.elapsed(), &tags);
        self.metrics
            .record_histogram(METRIC_STREAM_FRAGMENTS, self.fragments as f64, &tags);

        tracing::debug!(
            request_id = %self.request_id,
            outcome = outcome.as_str(),
            fragments = self.fragments,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "Relay finished"
        );
    }

    fn on_fragment(&mut self) {
        if !self.has_content {
            self.has_content = true;
            let provider_tag = tag(TAG_PROVIDER, &self.provider_name);
            self.metrics.record_latency(
                METRIC_LATENCY_TTFF,
                self.started_at.elapsed(),
                &[provider_tag.as_str()],
            );
        }
        self.fragments += 1;
    }
}

impl Stream for RelayStream {
    type Item = WireFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match std::mem::replace(&mut this.state, RelayState::Done) {
                RelayState::Idle { provider, params } => {
                    tracing::debug!(
                        request_id = %this.request_id,
                        provider = %this.provider_name,
                        "Opening upstream stream"
                    );
                    this.state = RelayState::Opening(Box::pin(async move {
                        provider.chat_completion_stream(params).await
                    }));
                }
                RelayState::Opening(mut open) => match open.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = RelayState::Opening(open);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(upstream)) => {
                        this.state = RelayState::Streaming(upstream);
                    }
                    Poll::Ready(Err(error)) => return Poll::Ready(Some(this.fail(error))),
                },
                RelayState::Streaming(mut upstream) => match upstream.as_mut().poll_next(cx) {
                    Poll::Pending => {
                        this.state = RelayState::Streaming(upstream);
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Ok(delta))) => {
                        this.state = RelayState::Streaming(upstream);
                        if let Some(fragment) = delta.fragment() {
                            this.on_fragment();
                            return Poll::Ready(Some(WireFrame::data(fragment)));
                        }
                    }
                    Poll::Ready(Some(Err(error))) => {
                        drop(upstream);
                        return Poll::Ready(Some(this.fail(error)));
                    }
                    Poll::Ready(None) => {
                        if this.has_content {
                            this.finish(StreamOutcome::Completed);
                            return Poll::Ready(None);
                        }
                        return Poll::Ready(Some(this.empty()));
                    }
                },
                RelayState::Done => return Poll::Ready(None),
            }
        }
    }
}

/// Drive a relay into a bounded channel until it ends or the receiver goes away
///
/// The receiver closing (client disconnect) is observed while waiting on the
/// upstream as well as on send, so no fragment is pulled once nobody listens.
/// Cancelling `shutdown` ends the relay with a final error frame.
pub async fn forward_frames(
    mut relay: RelayStream,
    tx: mpsc::Sender<WireFrame>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                relay.close();
                return;
            }
            _ = shutdown.cancelled() => {
                if let Some(frame) = relay.abort("server shutting down") {
                    let _ = tx.send(frame).await;
                }
                return;
            }
            frame = relay.next() => frame,
        };

        let Some(frame) = next else {
            return;
        };

        if tx.send(frame).await.is_err() {
            relay.close();
            return;
        }
    }
}
