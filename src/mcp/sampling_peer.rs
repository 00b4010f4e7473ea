// ABOUTME: Sampling peer for server-initiated LLM requests to MCP clients
// ABOUTME: Sends sampling/createMessage over the session stream and correlates the client's answer
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use learnhub_core::constants::protocol::SAMPLING_TIMEOUT_SECS;
use learnhub_core::errors::{AppError, AppResult};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::transport::SessionTransport;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Type alias for pending request sender
type ResponseSender = oneshot::Sender<AppResult<Value>>;

/// Manages server-initiated sampling requests to one MCP client
pub struct SamplingPeer {
    /// Counter for generating unique request IDs
    request_counter: AtomicU64,
    /// Pending requests awaiting responses from client
    pending_requests: Mutex<HashMap<String, ResponseSender>>,
    /// Session stream the requests travel on
    transport: Arc<SessionTransport>,
    request_timeout: Duration,
}

impl SamplingPeer {
    /// Create a sampling peer writing to `transport`
    #[must_use]
    pub fn new(transport: Arc<SessionTransport>) -> Self {
        Self::with_timeout(transport, Duration::from_secs(SAMPLING_TIMEOUT_SECS))
    }

    /// Create a sampling peer with a custom response timeout
    #[must_use]
    pub fn with_timeout(transport: Arc<SessionTransport>, request_timeout: Duration) -> Self {
        Self {
            request_counter: AtomicU64::new(0),
            pending_requests: Mutex::new(HashMap::new()),
            transport,
            request_timeout,
        }
    }

    fn next_request_id(&self) -> String {
        let counter_value = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("sampling-{counter_value}")
    }

    /// Send a sampling request to the client and wait for its result
    ///
    /// # Errors
    /// Returns an error if:
    /// - No event stream is open for the session
    /// - The client does not answer before the timeout
    /// - The client returns an error response
    /// - The peer is closed while waiting
    pub async fn create_message(&self, params: Value) -> AppResult<Value> {
        let request_id = self.next_request_id();
        let (tx, rx) = oneshot::channel();

        self.pending_requests
            .lock()
            .await
            .insert(request_id.clone(), tx);

        let request = JsonRpcRequest::with_id(
            "sampling/createMessage",
            Some(params),
            Value::String(request_id.clone()),
        );

        debug!(request_id = %request_id, "Sending sampling request to client");
        if let Err(e) = self.transport.send(&request) {
            self.pending_requests.lock().await.remove(&request_id);
            return Err(e);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::internal("Sampling request cancelled")),
            Err(_) => {
                self.pending_requests.lock().await.remove(&request_id);
                Err(AppError::external_service(
                    "MCP Client",
                    format!(
                        "Sampling request timed out after {} seconds",
                        self.request_timeout.as_secs()
                    ),
                ))
            }
        }
    }

    /// Route a client response to the waiting request.
    ///
    /// Returns true if the response matched a pending request.
    pub async fn handle_response(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id.as_ref().and_then(Value::as_str) else {
            return false;
        };
        let Some(tx) = self.pending_requests.lock().await.remove(id) else {
            return false;
        };

        debug!(request_id = %id, "Routing sampling response to handler");
        let outcome = match (response.result, response.error) {
            (_, Some(error)) => Err(AppError::external_service(
                "MCP Client",
                format!("Sampling error: {}", error.message),
            )),
            (Some(result), None) => Ok(result),
            (None, None) => Err(AppError::invalid_input(
                "Response missing both result and error",
            )),
        };
        let _ = tx.send(outcome);
        true
    }

    /// Number of requests awaiting a client answer
    pub async fn pending_count(&self) -> usize {
        self.pending_requests.lock().await.len()
    }

    /// Cancel all pending requests (for cleanup)
    pub async fn cancel_all_pending(&self) {
        let mut pending = self.pending_requests.lock().await;
        for (id, tx) in pending.drain() {
            warn!(request_id = %id, "Cancelled pending sampling request");
            let _ = tx.send(Err(AppError::internal("Session closed")));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_response_is_correlated_by_id() {
        let transport = Arc::new(SessionTransport::new("s1", 8));
        let mut stream = transport.subscribe().unwrap();
        let peer = Arc::new(SamplingPeer::new(Arc::clone(&transport)));

        let waiter = {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move { peer.create_message(json!({"maxTokens": 10})).await })
        };

        let sent: Value = serde_json::from_str(&stream.recv().await.unwrap()).unwrap();
        assert_eq!(sent["method"], "sampling/createMessage");

        let answered = peer
            .handle_response(JsonRpcResponse::success(
                Some(sent["id"].clone()),
                json!({"content": {"type": "text", "text": "hi"}}),
            ))
            .await;
        assert!(answered);
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result["content"]["text"], "hi");
    }

    #[tokio::test]
    async fn test_fails_without_open_stream() {
        let transport = Arc::new(SessionTransport::new("s1", 8));
        let peer = SamplingPeer::new(transport);
        assert!(peer.create_message(json!({})).await.is_err());
        assert_eq!(peer.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let transport = Arc::new(SessionTransport::new("s1", 8));
        let _stream = transport.subscribe().unwrap();
        let peer = SamplingPeer::new(transport);
        let err = peer.create_message(json!({})).await.unwrap_err();
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_response_is_ignored() {
        let peer = SamplingPeer::new(Arc::new(SessionTransport::new("s1", 8)));
        let handled = peer
            .handle_response(JsonRpcResponse::success(Some(json!("sampling-99")), json!({})))
            .await;
        assert!(!handled);
    }
}
