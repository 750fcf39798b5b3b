//! Connection to the message hub
//!
//! The generator and the pipe only ever talk to the hub through this trait.
//! Session setup, authentication, transport selection and reconnection are
//! the implementation's business; `edgepipe-connectors` provides the MQTT
//! one.
//!
//! Implementations must allow concurrent `send_*` calls through `&self`: the
//! generator task and every in-flight handler invocation share one
//! connection.

use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;

use crate::{
    errors::RelayResult,
    message::{Disposition, Message},
};

/// Future returned by an input handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = RelayResult<Disposition>> + Send>>;

/// Callback invoked once per message arriving on an input channel
///
/// The connection may run several invocations at the same time.
pub type InputHandler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as an [`InputHandler`]
pub fn input_handler<F, Fut>(f: F) -> InputHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RelayResult<Disposition>> + Send + 'static,
{
    Arc::new(move |message: Message| Box::pin(f(message)) as HandlerFuture)
}

/// Hub connection used by the module
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the session
    async fn open(&self) -> RelayResult<()>;

    /// Send a message on the default event route
    async fn send_event(&self, message: Message) -> RelayResult<()>;

    /// Send a message on a named output channel
    async fn send_output_event(&self, output: &str, message: Message) -> RelayResult<()>;

    /// Register the handler for an input channel, replacing any previous one
    async fn set_input_handler(&self, input: &str, handler: InputHandler) -> RelayResult<()>;

    /// Tear the session down
    async fn close(&self) -> RelayResult<()>;
}
