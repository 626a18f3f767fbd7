// src/watch.rs
use bytes::Bytes;
use futures::stream::{self, BoxStream, FusedStream, Stream, StreamExt};
use futures::ready;
use log::{debug, info, warn};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Response, StatusCode, Url};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::errors::{Result, WatchError};
use crate::framing::FrameReader;
use crate::models::{ExecutionTask, RejectionEnvelope, WatchEvent};
use crate::pairing::{PairingMachine, PairingState};

/// Cookie the Evaluation Service reads the session token from.
const TOKEN_COOKIE: &str = "zdotoj-token";

/// Pull-based sequence of watch events decoded from one response body.
///
/// The body is only read when the caller asks for an event that is not yet
/// buffered. Dropping the stream drops the body and releases the connection.
/// After an error or the end of the body the stream yields `None` forever.
pub struct EventStream {
    body: BoxStream<'static, Result<Bytes>>,
    frames: FrameReader,
    pairing: PairingMachine,
    done: bool,
}

impl EventStream {
    pub fn new<S, E>(body: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<WatchError>,
    {
        Self {
            body: body.map(|chunk| chunk.map_err(Into::into)).boxed(),
            frames: FrameReader::new(),
            pairing: PairingMachine::new(),
            done: false,
        }
    }

    fn close(&mut self) {
        self.done = true;
        self.body = stream::empty().boxed();
    }
}

impl Stream for EventStream {
    type Item = Result<WatchEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.done {
                return Poll::Ready(None);
            }

            if let Some(record) = this.frames.next_record() {
                match record.and_then(|line| this.pairing.feed(&line)) {
                    Ok(Some(event)) => return Poll::Ready(Some(Ok(event))),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Aborting watch on corrupt record: {}", e);
                        this.close();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            match ready!(this.body.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => this.frames.push(&chunk),
                Some(Err(e)) => {
                    warn!("Watch stream failed: {}", e);
                    this.close();
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    if let Some(fragment) = this.frames.finish() {
                        warn!("Discarding unterminated record at end of stream: {:?}", fragment);
                    }
                    if let PairingState::AwaitingResult(header) = this.pairing.state() {
                        debug!("Stream ended before the result block of task {:?}", header.task_id);
                    }
                    this.close();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for EventStream {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

/// Whether a content type announces a structured document instead of a stream.
pub fn is_document(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Tells a live stream apart from a synchronous rejection.
///
/// Must run once, before any record is read from the body.
pub async fn prerun_gate(response: Response) -> Result<EventStream> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(WatchError::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if is_document(content_type.as_deref()) {
        let body = response.bytes().await?;
        let envelope: RejectionEnvelope = serde_json::from_slice(&body)?;
        return Err(match envelope.reason {
            Some(reason) => WatchError::Prerun(reason),
            None => WatchError::InvalidRecord(format!(
                "document response without a reason (ok = {})",
                envelope.ok
            )),
        });
    }

    Ok(EventStream::new(response.bytes_stream()))
}

/// Submits runs to the Evaluation Service and watches their progress.
#[derive(Clone)]
pub struct WatchClient {
    client: Client,
    config: Arc<ClientConfig>,
}

impl WatchClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `{api_base}/run/watched/{unit}`, with the unit id escaped as a path segment.
    pub fn run_url(&self, unit: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| WatchError::Config(format!("invalid api base '{}': {}", self.config.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| WatchError::Config(format!("api base '{}' cannot take a path", self.config.api_base)))?
            .pop_if_empty()
            .extend(["run", "watched", unit]);
        Ok(url)
    }

    /// Submits `task` and returns its event stream once the server has
    /// accepted it for queueing.
    pub async fn watch(&self, task: &ExecutionTask) -> Result<EventStream> {
        let url = self.run_url(&task.unit)?;
        let request_id = Uuid::new_v4().to_string();

        info!(
            "[{}] Submitting objective {} of unit {} ({} fragments)",
            request_id,
            task.index,
            task.unit,
            task.code.len()
        );

        let mut request = self
            .client
            .post(url)
            .header("X-Request-Id", &request_id)
            .json(&task.request_body());
        if let Some(token) = &self.config.token {
            request = request.header(COOKIE, format!("{}={}", TOKEN_COOKIE, token));
        }

        let response = request.send().await?;
        debug!("[{}] Run endpoint answered {}", request_id, response.status());

        prerun_gate(response).await
    }
}
