//! MQTT connection to the module's hub
//!
//! Built on `rumqttc`'s async client. `open` drives the event loop until the
//! broker acknowledges the session and the input subscription, then moves the
//! event loop onto a background task that keeps polling (and therefore
//! reconnecting) until `close`.
//!
//! The broker delivers every input under one subscription. A message for an
//! input with no handler yet is parked and handed over when the handler is
//! registered, up to [`PARKED_LIMIT`] messages per input.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use edgepipe_core::{Connection, InputHandler, Message, RelayError, RelayResult};
use log::{debug, error, info, trace, warn};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubAck,
    SubscribeReasonCode, Transport,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{config::MqttConfig, topic::ModuleTopics, ConnectionStats, ConnectorError};

/// Pause between event-loop polls after a transport error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Time `close` waits for the DISCONNECT to go out
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Route name used in errors for the default event route
const EVENTS_ROUTE: &str = "events";

/// Messages held per input while it has no handler; the oldest go first
pub const PARKED_LIMIT: usize = 100;

/// Input handlers plus messages waiting for one
#[derive(Default)]
struct Routes {
    handlers: HashMap<String, InputHandler>,
    parked: HashMap<String, VecDeque<Message>>,
}

/// State shared between the connection and its event-loop task
struct Shared {
    routes: Mutex<Routes>,
    stats: Mutex<ConnectionStats>,
    connected: AtomicBool,
    faults: mpsc::UnboundedSender<RelayError>,
}

impl Shared {
    fn new(faults: mpsc::UnboundedSender<RelayError>) -> Self {
        Self {
            routes: Mutex::new(Routes::default()),
            stats: Mutex::new(ConnectionStats::default()),
            connected: AtomicBool::new(false),
            faults,
        }
    }

    fn stats(&self) -> MutexGuard<'_, ConnectionStats> {
        lock(&self.stats)
    }

    /// Route one inbound publish to its input handler, or park it
    fn dispatch(&self, topics: &ModuleTopics, topic: &str, payload: &[u8]) {
        let Some((input, message)) = topics.parse_input(topic, payload) else {
            debug!("Ignoring publish on {}", topic);
            return;
        };

        let mut routes = lock(&self.routes);
        let handler = routes.handlers.get(&input).cloned();
        if let Some(handler) = handler {
            drop(routes);
            self.deliver(input, handler, message);
            return;
        }

        let queue = routes.parked.entry(input.clone()).or_default();
        queue.push_back(message);
        if queue.len() > PARKED_LIMIT {
            queue.pop_front();
            warn!(
                "No handler for input {}, dropped oldest parked message",
                input
            );
        } else {
            debug!("No handler for input {} yet, parking message", input);
        }
    }

    /// Install a handler and hand it any messages parked for its input
    fn register(&self, input: &str, handler: InputHandler) {
        let parked = {
            let mut routes = lock(&self.routes);
            routes
                .handlers
                .insert(input.to_owned(), Arc::clone(&handler));
            routes.parked.remove(input).unwrap_or_default()
        };

        if !parked.is_empty() {
            info!("Delivering {} parked messages to input {}", parked.len(), input);
        }
        for message in parked {
            self.deliver(input.to_owned(), Arc::clone(&handler), message);
        }
    }

    fn clear_routes(&self) {
        let mut routes = lock(&self.routes);
        routes.handlers.clear();
        routes.parked.clear();
    }

    /// Run the handler for one message on a new task
    fn deliver(&self, input: String, handler: InputHandler, message: Message) {
        self.stats().messages_received += 1;
        let faults = self.faults.clone();
        tokio::spawn(async move {
            match handler(message).await {
                Ok(disposition) => debug!("Input {} message done: {:?}", input, disposition),
                Err(err) => {
                    error!("Handler for input {} failed: {}", input, err);
                    let _ = faults.send(err);
                }
            }
        });
    }
}

/// Hub connection over MQTT
pub struct MqttConnection {
    config: MqttConfig,
    topics: ModuleTopics,
    client: AsyncClient,
    eventloop: Mutex<Option<EventLoop>>,
    shared: Arc<Shared>,
    faults: Mutex<Option<mpsc::UnboundedReceiver<RelayError>>>,
    opened: AtomicBool,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttConnection {
    /// Create an unopened connection
    pub fn new(config: MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(&config), config.channel_capacity);
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        Self {
            topics: ModuleTopics::new(&config.device_id, &config.module_id),
            config,
            client,
            eventloop: Mutex::new(Some(eventloop)),
            shared: Arc::new(Shared::new(fault_tx)),
            faults: Mutex::new(Some(fault_rx)),
            opened: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Connection settings
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Topic layout for this module
    pub fn topics(&self) -> &ModuleTopics {
        &self.topics
    }

    /// True while the broker session is up
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Snapshot of the connection statistics
    pub fn stats(&self) -> ConnectionStats {
        self.shared.stats().clone()
    }

    /// Take the receiver for handler failures
    ///
    /// Returns `None` after the first call.
    pub fn take_faults(&self) -> Option<mpsc::UnboundedReceiver<RelayError>> {
        lock(&self.faults).take()
    }

    async fn publish(&self, output: Option<&str>, message: Message) -> RelayResult<()> {
        let route = output.unwrap_or(EVENTS_ROUTE);
        if !self.opened.load(Ordering::Acquire) {
            return Err(RelayError::NotConnected);
        }

        let topic = self.topics.event_topic(output, &message);
        let body = message.into_body();
        let bytes = body.len() as u64;
        trace!("Publishing {} bytes to {}", bytes, topic);

        match self
            .client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
        {
            Ok(()) => {
                let mut stats = self.shared.stats();
                stats.messages_sent += 1;
                stats.bytes_sent += bytes;
                Ok(())
            }
            Err(err) => {
                let mut stats = self.shared.stats();
                stats.messages_failed += 1;
                stats.last_error = Some(err.to_string());
                Err(RelayError::send(route, err))
            }
        }
    }
}

#[async_trait]
impl Connection for MqttConnection {
    async fn open(&self) -> RelayResult<()> {
        let mut eventloop = lock(&self.eventloop)
            .take()
            .ok_or_else(|| RelayError::Setup("connection was already opened".into()))?;

        info!(
            "Connecting to {}:{} as {} (tls: {})",
            self.config.host,
            self.config.port,
            self.config.client_id(),
            self.config.use_tls
        );

        tokio::time::timeout(self.config.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| RelayError::from(ConnectorError::Timeout))??;
        self.shared.connected.store(true, Ordering::Release);

        self.client
            .subscribe(self.topics.input_filter(), QoS::AtLeastOnce)
            .await
            .map_err(|e| RelayError::Setup(format!("subscribe failed: {e}")))?;
        tokio::time::timeout(
            self.config.connect_timeout,
            wait_for_suback(&mut eventloop, &self.topics, &self.shared),
        )
        .await
        .map_err(|_| RelayError::from(ConnectorError::Timeout))??;

        let task = tokio::spawn(run_event_loop(
            eventloop,
            self.client.clone(),
            self.topics.clone(),
            Arc::clone(&self.shared),
            self.shutdown.clone(),
        ));
        *lock(&self.task) = Some(task);
        self.opened.store(true, Ordering::Release);

        info!("Hub module client initialized");
        Ok(())
    }

    async fn send_event(&self, message: Message) -> RelayResult<()> {
        self.publish(None, message).await
    }

    async fn send_output_event(&self, output: &str, message: Message) -> RelayResult<()> {
        self.publish(Some(output), message).await
    }

    async fn set_input_handler(&self, input: &str, handler: InputHandler) -> RelayResult<()> {
        self.shared.register(input, handler);
        debug!("Registered handler for input {}", input);
        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        let Some(mut task) = lock(&self.task).take() else {
            return Ok(());
        };
        self.opened.store(false, Ordering::Release);

        if let Err(err) = self.client.disconnect().await {
            warn!("Disconnect request failed: {}", err);
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            warn!("Event loop did not stop in {:?}, cancelling", CLOSE_TIMEOUT);
            self.shutdown.cancel();
            let _ = task.await;
        }

        self.shared.connected.store(false, Ordering::Release);
        self.shared.clear_routes();

        let stats = self.stats();
        info!(
            "Hub connection closed: {} sent ({} bytes), {} failed, {} received, {} reconnections",
            stats.messages_sent,
            stats.bytes_sent,
            stats.messages_failed,
            stats.messages_received,
            stats.reconnections
        );
        Ok(())
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id(), config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(false);
    options.set_credentials(
        config.username(),
        config.sas_token.clone().unwrap_or_default(),
    );
    if config.use_tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

/// Poll until the broker accepts the session; returns `session_present`
async fn wait_for_connack(eventloop: &mut EventLoop) -> RelayResult<bool> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(ack.session_present)
                } else {
                    Err(RelayError::Setup(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )))
                };
            }
            Ok(event) => trace!("MQTT event before CONNACK: {:?}", event),
            Err(err) => return Err(RelayError::Setup(err.to_string())),
        }
    }
}

/// Poll until the input subscription is acknowledged
///
/// Publishes arriving meanwhile are dispatched as usual.
async fn wait_for_suback(
    eventloop: &mut EventLoop,
    topics: &ModuleTopics,
    shared: &Shared,
) -> RelayResult<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::SubAck(ack))) => return check_suback(&ack),
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.dispatch(topics, &publish.topic, &publish.payload);
            }
            Ok(event) => trace!("MQTT event before SUBACK: {:?}", event),
            Err(err) => return Err(RelayError::Setup(err.to_string())),
        }
    }
}

fn check_suback(ack: &SubAck) -> RelayResult<()> {
    if ack
        .return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(RelayError::Setup(format!(
            "broker refused input subscription: {:?}",
            ack.return_codes
        )));
    }
    Ok(())
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: ModuleTopics,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.dispatch(&topics, &publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                shared.connected.store(true, Ordering::Release);
                shared.stats().reconnections += 1;
                info!("Reconnected to hub (session present: {})", ack.session_present);
                if !ack.session_present {
                    if let Err(err) = client.try_subscribe(topics.input_filter(), QoS::AtLeastOnce) {
                        warn!("Re-subscribing inputs failed: {}", err);
                    }
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if let Err(err) = check_suback(&ack) {
                    error!("{}", err);
                    shared.stats().last_error = Some(err.to_string());
                    let _ = shared.faults.send(err);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT sent");
                break;
            }
            Ok(event) => trace!("MQTT event: {:?}", event),
            Err(err) => {
                shared.connected.store(false, Ordering::Release);
                shared.stats().last_error = Some(err.to_string());
                warn!("MQTT event loop error: {}", err);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    shared.connected.store(false, Ordering::Release);
    debug!("MQTT event loop stopped");
}
