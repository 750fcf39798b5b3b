//! Message pipe
//!
//! Relays every message arriving on one input channel to an output channel,
//! body and application properties unchanged. Messages with an empty body
//! are counted and logged but not forwarded.
//!
//! The pipe keeps a weak handle to its connection. The connection owns the
//! registered handler, which owns the pipe, so a strong handle would keep
//! both alive forever. A handler invoked after the connection is gone fails
//! with `RelayError::InvalidState`.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use log::info;

use crate::{
    connection::{input_handler, Connection, InputHandler},
    errors::{RelayError, RelayResult},
    message::{Disposition, Message},
};

/// Forwards inbound messages to an output channel
pub struct MessagePipe<C: ?Sized> {
    connection: Weak<C>,
    output: String,
    received: AtomicU64,
}

impl<C: Connection + ?Sized + 'static> MessagePipe<C> {
    /// Create a pipe forwarding to `output` on `connection`
    pub fn new(connection: &Arc<C>, output: impl Into<String>) -> Self {
        Self {
            connection: Arc::downgrade(connection),
            output: output.into(),
            received: AtomicU64::new(0),
        }
    }

    /// Output channel messages are forwarded to
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Number of messages handled so far
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    fn next_count(&self) -> u64 {
        self.received.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Handle one inbound message
    pub async fn handle(&self, message: Message) -> RelayResult<Disposition> {
        self.process(message).await.map(|(_, disposition)| disposition)
    }

    /// Handle one inbound message, returning the count it was assigned
    async fn process(&self, message: Message) -> RelayResult<(u64, Disposition)> {
        let count = self.next_count();

        let connection = self
            .connection
            .upgrade()
            .ok_or(RelayError::InvalidState("handler context has no live connection"))?;

        let text = message.body_text();
        info!("Received message: {}, Body: [{}]", count, text);

        if !text.is_empty() {
            let mut forward = Message::new(message.body().to_vec());
            forward
                .properties_mut()
                .extend(message.properties().iter());
            connection.send_output_event(&self.output, forward).await?;
            info!("Received message sent");
        }

        Ok((count, Disposition::Completed))
    }

    /// Wrap the pipe as an input handler
    pub fn into_handler(self: Arc<Self>) -> InputHandler {
        input_handler(move |message| {
            let pipe = Arc::clone(&self);
            async move { pipe.handle(message).await }
        })
    }

    /// Install the pipe as the handler for `input` on its connection
    pub async fn register(self: Arc<Self>, input: &str) -> RelayResult<()> {
        let connection = self
            .connection
            .upgrade()
            .ok_or(RelayError::InvalidState("pipe registered without a live connection"))?;
        connection.set_input_handler(input, self.into_handler()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::{collections::HashSet, thread};

    struct NullConnection;

    #[async_trait]
    impl Connection for NullConnection {
        async fn open(&self) -> RelayResult<()> {
            Ok(())
        }

        async fn send_event(&self, _message: Message) -> RelayResult<()> {
            Ok(())
        }

        async fn send_output_event(&self, _output: &str, _message: Message) -> RelayResult<()> {
            Ok(())
        }

        async fn set_input_handler(&self, _input: &str, _handler: InputHandler) -> RelayResult<()> {
            Ok(())
        }

        async fn close(&self) -> RelayResult<()> {
            Ok(())
        }
    }

    #[test]
    fn counts_are_unique_across_threads() {
        let connection = Arc::new(NullConnection);
        let pipe = Arc::new(MessagePipe::new(&connection, "output1"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pipe = Arc::clone(&pipe);
                thread::spawn(move || (0..1000).map(|_| pipe.next_count()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for count in handle.join().unwrap() {
                assert!(seen.insert(count), "duplicate count {count}");
            }
        }

        assert_eq!(seen.len(), 8000);
        assert_eq!(pipe.received(), 8000);
        assert!(seen.contains(&1) && seen.contains(&8000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_handles_observe_unique_counts() {
        let connection = Arc::new(NullConnection);
        let pipe = Arc::new(MessagePipe::new(&connection, "output1"));

        let tasks: Vec<_> = (0..256)
            .map(|i| {
                let pipe = Arc::clone(&pipe);
                tokio::spawn(async move { pipe.process(Message::new(format!("msg-{i}"))).await })
            })
            .collect();

        let mut seen = HashSet::new();
        for task in tasks {
            let (count, disposition) = task.await.unwrap().unwrap();
            assert_eq!(disposition, Disposition::Completed);
            assert!(seen.insert(count), "duplicate count {count}");
        }

        assert_eq!(seen, (1..=256).collect::<HashSet<u64>>());
        assert_eq!(pipe.received(), 256);
    }

    #[test]
    fn pipe_does_not_keep_connection_alive() {
        let connection = Arc::new(NullConnection);
        let pipe = MessagePipe::new(&connection, "output1");
        assert_eq!(Arc::strong_count(&connection), 1);
        assert_eq!(pipe.output(), "output1");
    }
}
