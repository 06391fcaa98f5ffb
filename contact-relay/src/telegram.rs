//! Client for the Telegram Bot API `sendMessage` method.

use crate::errors::{DispatchError, RelayError};
use async_trait::async_trait;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error as StdError;
use url::Url;

/// Longest slice of an unexpected upstream body copied into an error.
const BODY_SNIPPET_CHARS: usize = 200;

pub type MessageId = i64;

/// Delivers one text message to one chat.
///
/// Implementations do not apply a timeout; the dispatcher bounds each call.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<MessageId, DispatchError>;
}

#[derive(Clone, Debug)]
pub struct TelegramClient {
    client: reqwest::Client,
    api_url: Url,
}

impl TelegramClient {
    pub fn new(api_url: Url) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("contact-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, api_url })
    }

    /// `{api_url}/bot{token}/sendMessage`, keeping any path prefix of `api_url`.
    fn send_message_url(&self, bot_token: &str) -> Result<Url, DispatchError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| DispatchError::Transport("Bot API URL cannot be a base".into()))?
            .pop_if_empty()
            .push(&format!("bot{bot_token}"))
            .push("sendMessage");
        Ok(url)
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<MessageId, DispatchError> {
        let url = self.send_message_url(bot_token)?;

        let response = self
            .client
            .post(url)
            .form(&[
                ("chat_id", chat_id),
                ("text", text),
                ("parse_mode", "HTML"),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(transport_error)?;

        interpret_response(
            chat_id,
            status,
            UpstreamBody::classify(content_type.as_deref(), &body),
        )
    }
}

/// The request URL embeds the bot token, so it is stripped before the error
/// is rendered anywhere.
fn transport_error(error: reqwest::Error) -> DispatchError {
    let error = error.without_url();
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    DispatchError::Transport(message)
}

/// An upstream response body, classified by content type before anything
/// tries to read fields out of it.
#[derive(Debug, PartialEq)]
pub enum UpstreamBody {
    Parsed(Value),
    RawText(String),
    ParseError(String),
}

impl UpstreamBody {
    /// A JSON content type must parse. Without a content type the body is
    /// parsed if it can be and kept as text otherwise. Any other content
    /// type is kept as text.
    pub fn classify(content_type: Option<&str>, body: &[u8]) -> Self {
        let is_json = content_type.map(|ct| {
            let mime = ct.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        });

        match is_json {
            Some(true) => match serde_json::from_slice(body) {
                Ok(value) => UpstreamBody::Parsed(value),
                Err(e) => UpstreamBody::ParseError(e.to_string()),
            },
            None => match serde_json::from_slice(body) {
                Ok(value) => UpstreamBody::Parsed(value),
                Err(_) => UpstreamBody::RawText(String::from_utf8_lossy(body).into_owned()),
            },
            Some(false) => UpstreamBody::RawText(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

#[derive(Deserialize)]
struct SendMessageEnvelope {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

/// Turns a classified upstream response into a delivery result.
pub fn interpret_response(
    chat_id: &str,
    status: StatusCode,
    body: UpstreamBody,
) -> Result<MessageId, DispatchError> {
    let status = status.as_u16();

    let value = match body {
        UpstreamBody::Parsed(value) => value,
        UpstreamBody::RawText(text) => {
            return Err(DispatchError::UnexpectedResponse {
                status,
                body: snippet(&text),
            });
        }
        UpstreamBody::ParseError(reason) => {
            return Err(DispatchError::MalformedResponse { status, reason });
        }
    };

    let envelope: SendMessageEnvelope =
        serde_json::from_value(value).map_err(|e| DispatchError::MalformedResponse {
            status,
            reason: e.to_string(),
        })?;

    if !envelope.ok {
        return Err(DispatchError::Rejected(envelope.description.unwrap_or_else(
            || format!("Failed to send to chat {chat_id}"),
        )));
    }

    envelope
        .result
        .map(|sent| sent.message_id)
        .ok_or_else(|| DispatchError::MalformedResponse {
            status,
            reason: "missing result.message_id".into(),
        })
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((end, _)) => format!("{}…", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
