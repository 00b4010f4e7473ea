// ABOUTME: Per-session outbound channel carrying server-initiated messages to the event stream
// ABOUTME: Closing the transport ends every open stream once buffered messages drain
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::{PoisonError, RwLock};

use learnhub_core::errors::{AppError, AppResult};
use serde::Serialize;
use tokio::sync::broadcast;

/// Outbound half of a session's streaming transport
#[derive(Debug)]
pub struct SessionTransport {
    session_id: String,
    sender: RwLock<Option<broadcast::Sender<String>>>,
}

impl SessionTransport {
    /// Create an open transport buffering up to `capacity` messages per stream
    #[must_use]
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            session_id: session_id.into(),
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Attach a new stream; `None` once closed
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Push a message to every open stream, returning how many received it
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed, no stream is open, or the
    /// message does not serialize
    pub fn send<T: Serialize>(&self, message: &T) -> AppResult<usize> {
        let payload = serde_json::to_string(message)?;
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let sender = guard
            .as_ref()
            .ok_or_else(|| AppError::internal(format!("Session {} is closed", self.session_id)))?;
        sender.send(payload).map_err(|_| {
            AppError::invalid_input(format!(
                "Session {} has no open event stream",
                self.session_id
            ))
        })
    }

    /// Close the transport; idempotent
    pub fn close(&self) {
        let closed = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            tracing::debug!(session_id = %self.session_id, "Session transport closed");
        }
    }

    /// Whether [`close`](Self::close) has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_send_reaches_subscribers_until_closed() {
        let transport = SessionTransport::new("s1", 8);
        assert!(transport.send(&json!({"n": 1})).is_err());

        let mut stream = transport.subscribe().unwrap();
        assert_eq!(transport.send(&json!({"n": 2})).unwrap(), 1);
        assert_eq!(stream.recv().await.unwrap(), r#"{"n":2}"#);

        transport.close();
        transport.close();
        assert!(transport.is_closed());
        assert!(transport.subscribe().is_none());
        assert!(stream.recv().await.is_err());
        assert!(transport.send(&json!({"n": 3})).is_err());
    }
}
