//! Test support: a scripted in-memory transport and sample payloads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::endpoint::RemoteEndpoint;
use crate::error::TransportError;
use crate::transport::TransportClient;

#[derive(Debug, Clone)]
struct Scripted {
    response: Result<Value, TransportError>,
    delay: Option<Duration>,
}

/// Transport that answers from a table keyed by `(host:port, path)`.
///
/// Unscripted paths answer `404 Not Found`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(String, String), Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, endpoint: &RemoteEndpoint, path: &str, value: Value) {
        self.set(endpoint, path, Ok(value), None);
    }

    pub fn fail(&self, endpoint: &RemoteEndpoint, path: &str, error: TransportError) {
        self.set(endpoint, path, Err(error), None);
    }

    pub fn respond_after(&self, endpoint: &RemoteEndpoint, path: &str, value: Value, delay: Duration) {
        self.set(endpoint, path, Ok(value), Some(delay));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(
        &self,
        endpoint: &RemoteEndpoint,
        path: &str,
        response: Result<Value, TransportError>,
        delay: Option<Duration>,
    ) {
        self.routes
            .lock()
            .insert((endpoint.to_string(), path.to_string()), Scripted { response, delay });
    }
}

#[async_trait]
impl TransportClient for ScriptedTransport {
    async fn get(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .routes
            .lock()
            .get(&(endpoint.to_string(), path.to_string()))
            .cloned();

        match scripted {
            Some(Scripted { response, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                response
            }
            None => Err(TransportError::HttpStatus {
                code: 404,
                status_text: "Not Found".to_string(),
            }),
        }
    }
}

pub fn status_json(id: &str) -> Value {
    json!({
        "id": id,
        "uuid": "5a1d7f10-0000-4000-8000-00000000beef",
        "version": "0.1.9-abc123",
        "uptime": 93_784_000u64,
        "status": "OK",
        "message": "Services have been up for 1 day"
    })
}

pub fn job_json(id: i64, state: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "name": format!("job {}", id),
        "jobTypeId": "pbsmrtpipe",
        "state": state,
        "createdAt": created_at,
        "updatedAt": created_at,
        "smrtlinkVersion": null,
        "createdBy": "admin"
    })
}
