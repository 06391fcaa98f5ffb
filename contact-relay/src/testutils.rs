use crate::errors::DispatchError;
use crate::telegram::{MessageId, MessageSender};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// How the in-memory sender answers for a given chat
#[derive(Clone, Debug)]
pub enum FakeReply {
    Accept(MessageId),
    AcceptAfter(Duration, MessageId),
    Reject(&'static str),
    /// Never completes; only the dispatcher timeout ends it
    Hang,
    Panic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentCall {
    pub bot_token: String,
    pub chat_id: String,
    pub text: String,
}

/// `MessageSender` that answers from a fixed table and records every call.
pub struct FakeSender {
    replies: HashMap<String, FakeReply>,
    calls: AtomicUsize,
    sent: Mutex<Vec<SentCall>>,
}

impl FakeSender {
    pub fn new<I>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (&'static str, FakeReply)>,
    {
        Arc::new(Self {
            replies: replies
                .into_iter()
                .map(|(chat_id, reply)| (chat_id.to_string(), reply))
                .collect(),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentCall> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<MessageId, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(SentCall {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });

        let reply = self
            .replies
            .get(chat_id)
            .cloned()
            .unwrap_or(FakeReply::Reject("Bad Request: chat not found"));

        match reply {
            FakeReply::Accept(id) => Ok(id),
            FakeReply::AcceptAfter(delay, id) => {
                tokio::time::sleep(delay).await;
                Ok(id)
            }
            FakeReply::Reject(description) => Err(DispatchError::Rejected(description.into())),
            FakeReply::Hang => std::future::pending().await,
            FakeReply::Panic => panic!("sender panicked for chat {chat_id}"),
        }
    }
}

/// How the mock Bot API answers for a given `chat_id`
#[derive(Clone, Debug)]
pub enum MockReply {
    Accept(MessageId),
    Reject(&'static str),
    /// A 502 HTML page, as a fronting proxy would return
    Html,
}

#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub path: String,
    pub chat_id: String,
    pub text: String,
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: Option<String>,
}

pub struct MockTelegram {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedMessage>>>,
}

impl MockTelegram {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn received(&self) -> Vec<ReceivedMessage> {
        self.received.lock().unwrap().clone()
    }
}

/// Starts a local HTTP server that speaks enough of the Bot API
/// `sendMessage` method for tests.
pub async fn start_mock_telegram<I>(replies: I) -> MockTelegram
where
    I: IntoIterator<Item = (&'static str, MockReply)>,
{
    let replies: Arc<HashMap<String, MockReply>> = Arc::new(
        replies
            .into_iter()
            .map(|(chat_id, reply)| (chat_id.to_string(), reply))
            .collect(),
    );
    let received = Arc::new(Mutex::new(Vec::new()));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().unwrap();

    let server_received = received.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let replies = replies.clone();
            let received = server_received.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    mock_send_message(req, replies.clone(), received.clone())
                });
                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    MockTelegram { addr, received }
}

async fn mock_send_message(
    req: Request<Incoming>,
    replies: Arc<HashMap<String, MockReply>>,
    received: Arc<Mutex<Vec<ReceivedMessage>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_else(|_| Bytes::new());

    let fields: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
    let chat_id = fields.get("chat_id").cloned().unwrap_or_default();

    received.lock().unwrap().push(ReceivedMessage {
        path,
        chat_id: chat_id.clone(),
        text: fields.get("text").cloned().unwrap_or_default(),
        parse_mode: fields.get("parse_mode").cloned(),
        disable_web_page_preview: fields.get("disable_web_page_preview").cloned(),
    });

    let reply = replies
        .get(&chat_id)
        .cloned()
        .unwrap_or(MockReply::Reject("Bad Request: chat not found"));

    let (status, content_type, body) = match reply {
        MockReply::Accept(message_id) => (
            StatusCode::OK,
            "application/json",
            json!({"ok": true, "result": {"message_id": message_id, "chat": {"id": chat_id}}})
                .to_string(),
        ),
        MockReply::Reject(description) => (
            StatusCode::BAD_REQUEST,
            "application/json",
            json!({"ok": false, "error_code": 400, "description": description}).to_string(),
        ),
        MockReply::Html => (
            StatusCode::BAD_GATEWAY,
            "text/html",
            "<html><body>502 Bad Gateway</body></html>".to_string(),
        ),
    };

    let response = Response::builder()
        .status(status)
        .header("content-type", content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    Ok(response)
}
