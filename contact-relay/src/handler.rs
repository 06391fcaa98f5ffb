use crate::config::{BOT_TOKEN_ENV, CHAT_IDS_ENV, Config, EndpointConfig, TelegramConfig};
use crate::dispatch::{DispatchOutcome, DispatchResult, Dispatcher};
use crate::errors::{RelayError, Result};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::notification::format_notification;
use crate::submission::SubmissionRequest;
use crate::telegram::{MessageSender, TelegramClient};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use serde::Serialize;
use shared::http::{add_cors_headers, make_error_response};
use shared::{gauge, histogram};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;
const SUCCESS_MESSAGE: &str = "Message sent successfully!";

/// The contact endpoint: validates a submission and relays it to every
/// configured chat.
pub struct ContactRelay {
    endpoint: EndpointConfig,
    telegram: TelegramConfig,
    dispatcher: Dispatcher,
}

enum Reply {
    Preflight,
    Delivered(DispatchResult),
}

/// A request-ending error, plus the per-recipient outcomes when dispatch
/// already happened.
struct Failure {
    error: RelayError,
    results: Option<DispatchResult>,
}

impl From<RelayError> for Failure {
    fn from(error: RelayError) -> Self {
        Self {
            error,
            results: None,
        }
    }
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    success: bool,
    message: &'static str,
    results: &'a [DispatchOutcome],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    success: bool,
    error: &'static str,
    details: String,
    timestamp: String,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [DispatchOutcome]>,
}

impl ContactRelay {
    pub fn new(config: &Config) -> Result<Self> {
        let client = TelegramClient::new(config.telegram.api_url.clone())?;
        Ok(Self::with_sender(config, Arc::new(client)))
    }

    /// Builds a relay that delivers through `sender` instead of the Bot API.
    pub fn with_sender(config: &Config, sender: Arc<dyn MessageSender>) -> Self {
        let dispatcher = Dispatcher::new(
            sender,
            Duration::from_millis(config.telegram.timeout_ms),
        );
        Self {
            endpoint: config.endpoint.clone(),
            telegram: config.telegram.clone(),
            dispatcher,
        }
    }

    /// Ready once a bot token and at least one chat are configured.
    pub fn is_ready(&self) -> bool {
        self.telegram.is_configured()
    }

    /// Handles one request end to end. Every failure is turned into a JSON
    /// error response here; nothing propagates to the connection.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let started = Instant::now();
        gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let request_id = request_id(request.headers());
        self.log_request(&request, &request_id);

        let response = match self.process(request).await {
            Ok(Reply::Preflight) => preflight_response(),
            Ok(Reply::Delivered(results)) => {
                tracing::info!(
                    request_id = %request_id,
                    recipients = results.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Contact submission relayed"
                );
                success_response(&results)
            }
            Err(failure) => {
                let status = failure.error.status_code();
                if status.is_server_error() {
                    tracing::error!(
                        request_id = %request_id,
                        status = status.as_u16(),
                        error = %failure.error,
                        "Failed to process contact request"
                    );
                } else {
                    tracing::warn!(
                        request_id = %request_id,
                        status = status.as_u16(),
                        error = %failure.error,
                        "Rejected contact request"
                    );
                }
                error_response(&failure, &request_id)
            }
        };

        let mut response = with_request_id(response, &request_id);
        add_cors_headers(response.headers_mut());

        let status = response.status().as_u16().to_string();
        histogram!(REQUEST_DURATION, "status" => status).record(started.elapsed().as_secs_f64());
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);

        response
    }

    async fn process<B>(&self, request: Request<B>) -> std::result::Result<Reply, Failure>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        if request.uri().path() != self.endpoint.path {
            return Err(RelayError::NotFound.into());
        }

        match *request.method() {
            Method::OPTIONS => return Ok(Reply::Preflight),
            Method::POST => {}
            _ => return Err(RelayError::MethodNotAllowed.into()),
        }

        let body = read_body(request.into_body(), self.endpoint.max_body_bytes).await?;
        let submission = SubmissionRequest::from_body(&body).map_err(RelayError::from)?;

        let bot_token = self
            .telegram
            .bot_token()
            .ok_or(RelayError::Misconfigured(BOT_TOKEN_ENV))?;
        let recipients = self.telegram.recipients();
        if recipients.is_empty() {
            return Err(RelayError::Misconfigured(CHAT_IDS_ENV).into());
        }

        tracing::info!(recipients = recipients.len(), "Relaying contact submission");
        let text = format_notification(&submission);
        let results = self.dispatcher.dispatch(bot_token, &recipients, &text).await;

        match results.first_failure() {
            None => Ok(Reply::Delivered(results)),
            Some(details) => Err(Failure {
                error: RelayError::DeliveryFailed(details),
                results: Some(results),
            }),
        }
    }

    /// Logs the request shape and whether credentials are present. The body
    /// and the credential values are never logged.
    fn log_request<B: Body>(&self, request: &Request<B>, request_id: &str) {
        let header = |name: HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
        };

        tracing::info!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            content_type = header(CONTENT_TYPE),
            user_agent = header(USER_AGENT),
            has_body = !request.body().is_end_stream(),
            bot_token_set = self.telegram.bot_token().is_some(),
            chat_ids_set = !self.telegram.recipients().is_empty(),
            "Received contact request"
        );
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge(limit))
        }
        Err(e) => Err(RelayError::RequestBodyError(e.to_string())),
    }
}

/// Reuses a caller-supplied `x-request-id` when it is usable, otherwise
/// generates one.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn with_request_id(mut response: Response<Bytes>, request_id: &str) -> Response<Bytes> {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

fn preflight_response() -> Response<Bytes> {
    Response::new(Bytes::new())
}

fn success_response(results: &DispatchResult) -> Response<Bytes> {
    json_response(
        StatusCode::OK,
        &SuccessBody {
            success: true,
            message: SUCCESS_MESSAGE,
            results: results.outcomes(),
        },
    )
}

fn error_response(failure: &Failure, request_id: &str) -> Response<Bytes> {
    json_response(
        failure.error.status_code(),
        &ErrorBody {
            success: false,
            error: failure.error.summary(),
            details: failure.error.to_string(),
            timestamp: timestamp(),
            request_id,
            results: failure.results.as_ref().map(DispatchResult::outcomes),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Bytes::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!(error = %RelayError::from(e), "Failed to serialize response");
            make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
