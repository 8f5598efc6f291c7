//! Scripted in-memory transport for tests
//!
//! Routes match on method plus a URL suffix (the URL never includes the query
//! string), optionally narrowed by a predicate over the request. Each route
//! replays its queued replies in order and repeats the last one forever, so a
//! route scripted with a single `IN_PROGRESS` reply models a container that
//! never finishes. Every request is recorded for later assertions.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

type Predicate = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(HttpResponse),
    Error(TransportError),
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        let mut response = HttpResponse::new(status, body.to_string());
        response
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        MockReply::Response(response)
    }

    pub fn text(status: u16, body: &str) -> Self {
        MockReply::Response(HttpResponse::new(status, body))
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        MockReply::Response(HttpResponse::new(status, body))
    }

    pub fn network_error(message: &str) -> Self {
        MockReply::Error(TransportError::new(message))
    }

    pub fn timeout() -> Self {
        MockReply::Error(TransportError::timeout("mock timeout"))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let MockReply::Response(response) = &mut self {
            response
                .headers
                .push((name.to_ascii_lowercase(), value.to_string()));
        }
        self
    }
}

struct Route {
    method: Method,
    url_suffix: String,
    predicate: Option<Predicate>,
    replies: VecDeque<MockReply>,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        self.method == request.method
            && request.url.ends_with(&self.url_suffix)
            && self.predicate.as_ref().map_or(true, |p| p(request))
    }

    fn next_reply(&mut self) -> Option<MockReply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method` requests whose URL ends with `url_suffix`
    pub fn respond(&self, method: Method, url_suffix: &str, reply: MockReply) -> &Self {
        self.push(method, url_suffix, reply);
        self
    }

    /// Like [`respond`](Self::respond) but only for requests matching `predicate`
    ///
    /// Each call creates a distinct route, so queue all replies for one
    /// predicate through [`respond_sequence_when`](Self::respond_sequence_when).
    pub fn respond_when<F>(&self, method: Method, url_suffix: &str, predicate: F, reply: MockReply) -> &Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    {
        self.respond_sequence_when(method, url_suffix, predicate, vec![reply])
    }

    pub fn respond_sequence_when<F>(
        &self,
        method: Method,
        url_suffix: &str,
        predicate: F,
        replies: Vec<MockReply>,
    ) -> &Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route {
                method,
                url_suffix: url_suffix.to_string(),
                predicate: Some(Arc::new(predicate)),
                replies: replies.into(),
            });
        }
        self
    }

    fn push(&self, method: Method, url_suffix: &str, reply: MockReply) {
        let Ok(mut routes) = self.routes.lock() else {
            return;
        };

        let existing = routes
            .iter_mut()
            .find(|r| r.method == method && r.url_suffix == url_suffix && r.predicate.is_none());

        match existing {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                url_suffix: url_suffix.to_string(),
                predicate: None,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// All recorded requests, in send order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Recorded requests with this method whose URL ends with `url_suffix`
    pub fn requests_to(&self, method: Method, url_suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.ends_with(url_suffix))
            .collect()
    }

    pub fn calls(&self, method: Method, url_suffix: &str) -> usize {
        self.requests_to(method, url_suffix).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let reply = {
            let mut routes = self
                .routes
                .lock()
                .map_err(|_| TransportError::new("mock transport poisoned"))?;

            // Longest suffix wins; among equals, predicate routes are more specific
            let route = routes
                .iter_mut()
                .filter(|r| r.matches(&request))
                .max_by_key(|r| (r.url_suffix.len(), r.predicate.is_some()));

            route.and_then(|r| r.next_reply())
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(err)) => Err(err),
            None => Err(TransportError::new(format!(
                "no mock route for {} {}",
                request.method.as_str(),
                request.url
            ))),
        }
    }
}
