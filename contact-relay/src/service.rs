use crate::handler::ContactRelay;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::http::full_body;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Hyper service for the public listener. All request handling, including
/// errors, happens in `ContactRelay::handle`, so this never fails.
pub struct RelayService {
    relay: Arc<ContactRelay>,
}

impl RelayService {
    pub fn new(relay: Arc<ContactRelay>) -> Self {
        Self { relay }
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let relay = self.relay.clone();
        Box::pin(async move { Ok(relay.handle(req).await.map(full_body)) })
    }
}
