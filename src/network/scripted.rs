//! In-memory transport for engine tests

use super::{Transport, TransportError, TransportRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted answer to one request
pub struct Reply {
    pub delay: Duration,
    pub result: Result<Value, TransportError>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(body),
        }
    }

    pub fn err(error: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

type Responder = Box<dyn Fn(&TransportRequest, usize) -> Reply + Send + Sync>;

/// Transport answering from a closure and recording every request
pub struct ScriptedTransport {
    responder: Responder,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    /// Answer with the closure; the second argument is the call index
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same body
    pub fn json(body: Value) -> Self {
        Self::new(move |_, _| Reply::ok(body.clone()))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: TransportRequest) -> Result<Value, TransportError> {
        let reply = {
            let mut requests = self.requests.lock().unwrap();
            let reply = (self.responder)(&request, requests.len());
            requests.push(request);
            reply
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
