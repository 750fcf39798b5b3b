//! Shared test fixtures
//!
//! `MemoryConnection` records every send with its (tokio) timestamp and lets
//! tests push inbound messages straight into registered handlers.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use edgepipe_core::{Connection, Disposition, InputHandler, Message, RelayError, RelayResult};
use tokio::time::Instant;

/// One recorded send
#[derive(Debug, Clone)]
pub struct Sent {
    /// `None` for the default event route
    pub output: Option<String>,
    pub message: Message,
    pub at: Instant,
}

/// In-memory connection
#[derive(Default)]
pub struct MemoryConnection {
    sent: Mutex<Vec<Sent>>,
    handlers: Mutex<HashMap<String, InputHandler>>,
    open: AtomicBool,
    /// Fail the send with this 1-based index
    fail_at: Option<usize>,
    /// Make every send take this long
    send_latency: Option<Duration>,
    attempts: AtomicUsize,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            send_latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Dispatch a message to the handler registered for `input`
    pub async fn deliver(&self, input: &str, message: Message) -> RelayResult<Disposition> {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(input)
            .cloned()
            .expect("no handler registered for input");
        handler(message).await
    }

    async fn record(&self, output: Option<&str>, message: Message) -> RelayResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(latency) = self.send_latency {
            tokio::time::sleep(latency).await;
        }
        let route = output.unwrap_or("events");
        if self.fail_at == Some(attempt) {
            return Err(RelayError::send(route, "injected failure"));
        }
        self.sent.lock().unwrap().push(Sent {
            output: output.map(str::to_owned),
            message,
            at: Instant::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn open(&self) -> RelayResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_event(&self, message: Message) -> RelayResult<()> {
        self.record(None, message).await
    }

    async fn send_output_event(&self, output: &str, message: Message) -> RelayResult<()> {
        self.record(Some(output), message).await
    }

    async fn set_input_handler(&self, input: &str, handler: InputHandler) -> RelayResult<()> {
        self.handlers
            .lock()
            .unwrap()
            .insert(input.to_owned(), handler);
        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.handlers.lock().unwrap().clear();
        Ok(())
    }
}
