#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aiflow_dispatch::{ProviderError, ServiceExecutor};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Executor that replays a fixed script of replies, then repeats `otherwise`.
pub struct ScriptedExecutor {
    name: String,
    script: Mutex<VecDeque<Result<Value, ProviderError>>>,
    otherwise: Result<Value, ProviderError>,
    delay: Duration,
    accepts_input: bool,
    calls: AtomicU32,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedExecutor {
    pub fn succeeding(name: &str) -> Self {
        Self::new(name, Ok(json!({ "provider": name })))
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self::new(name, Err(error))
    }

    fn new(name: &str, otherwise: Result<Value, ProviderError>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            otherwise,
            delay: Duration::ZERO,
            accepts_input: true,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies returned before falling back to the steady-state reply.
    pub fn then(self, reply: Result<Value, ProviderError>) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting_input(mut self) -> Self {
        self.accepts_input = false;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ServiceExecutor for ScriptedExecutor {
    async fn execute(&self, request: &Value) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.otherwise.clone())
    }

    fn validate_input(&self, _request: &Value) -> bool {
        self.accepts_input
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match &self.otherwise {
            Ok(_) => Ok(()),
            Err(e) => Err(ProviderError::new(format!("{} unhealthy: {}", self.name, e))),
        }
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::with_status("upstream returned 503 service unavailable", 503)
}

pub fn auth_error() -> ProviderError {
    ProviderError::with_status("401 unauthorized: invalid api key", 401)
}
