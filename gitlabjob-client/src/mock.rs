//! In-memory gateway for tests
//!
//! Routes are keyed on method and path (query string included). A route can
//! hold a sequence of replies: they are served in order and the last one
//! repeats forever.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{ClientError, Result};
use crate::gateway::{ApiRequest, ApiResponse, Gateway};

#[derive(Debug, Clone)]
enum Reply {
    Response(ApiResponse),
    TransportFailure(String),
}

/// Gateway serving canned responses and recording every call
#[derive(Debug, Default)]
pub struct MockGateway {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response for `method path`
    pub fn on(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.push(method, path, Reply::Response(response));
        self
    }

    /// Queue a 200 JSON response for `GET path`
    pub fn on_get(&self, path: &str, body: Value) -> &Self {
        self.on(Method::GET, path, ApiResponse::json_body(200, &body))
    }

    /// Queue a 200 JSON response for `GET path` announcing `total_pages`
    pub fn on_get_paged(&self, path: &str, body: Value, total_pages: u32) -> &Self {
        self.on(
            Method::GET,
            path,
            ApiResponse::json_body(200, &body).with_header("x-total-pages", total_pages.to_string()),
        )
    }

    /// Queue a transport failure for `method path`
    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Reply::TransportFailure(message.to_string()));
        self
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Paths requested with `method`, in order
    pub fn paths(&self, method: Method) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.path.clone())
            .collect()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse> {
        let key = (req.method.clone(), req.path.clone());
        self.calls.lock().unwrap().push(req);

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::TransportFailure(message)) => Err(ClientError::Transport(message)),
            None => Ok(ApiResponse::new(404, r#"{"message":"404 Not found"}"#)),
        }
    }
}
