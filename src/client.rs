//! High-level eISCP client.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! controlling a receiver. A client owns one session task that holds the TCP
//! socket, the device context and the connection state. Every public method
//! talks to that task over a channel, so:
//!
//! - sends are strictly serialized: a `raw()` or `command()` call is written
//!   to the socket only after the previous one completed
//! - inbound messages are decoded and published in arrival order
//! - timers (reconnect) and in-flight connect or discovery attempts are
//!   superseded by later requests and never fire stale results
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eiscp::{Client, ConnectConfig, Dictionary, Event};
//!
//! # async fn example() -> eiscp::Result<()> {
//! let dictionary = Arc::new(Dictionary::from_path("eiscp-commands.json")?);
//! let client = Client::new(dictionary);
//! let mut events = client.subscribe();
//!
//! client
//!     .connect(ConnectConfig::new("192.168.1.20").with_reconnect(true))
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         Event::Connected { .. } => {
//!             client.command("system-power=on").await?;
//!             client.command("main.volume=40").await?;
//!         }
//!         Event::Command { name, argument, .. } => println!("{} = {}", name, argument),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! The [`ConnectConfig`] struct allows customization of:
//! - Receiver host and port, or discovery of the first receiver on the LAN
//! - Receiver model, used to filter model-specific values
//! - Automatic reconnect and the delay between attempts
//! - TCP connect and write timeouts
//! - How long to wait for a known host to announce its model

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::command::{CommandResolver, ParsedCommand};
use crate::device::DeviceContext;
use crate::dictionary::{Dictionary, DEFAULT_ZONE};
use crate::discovery::{self, DiscoveryOptions, DiscoveryReport};
use crate::error::{EiscpError, Result};
use crate::event::{ConnectionState, Event};
use crate::transport::{
    self, FrameWriter, Inbound, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT,
};

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_SLEEP: Duration = Duration::from_secs(5);

/// Default wait for a known host to answer the model query.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_CHANNEL_CAPACITY: usize = 256;
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Configuration for a receiver session.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Receiver host name or IP; `None` connects to the first receiver discovered.
    pub host: Option<String>,
    /// Receiver TCP port.
    pub port: u16,
    /// Receiver model (e.g. `"TX-NR609"`); learned through discovery when unknown.
    pub model: Option<String>,
    /// Reconnect after the connection is lost.
    pub reconnect: bool,
    /// Delay before each reconnect attempt.
    pub reconnect_sleep: Duration,
    /// Filter values and ranges by the receiver's model sets.
    pub verify_commands: bool,
    /// Timeout of each TCP connect attempt.
    pub connect_timeout: Duration,
    /// Limit for writing one frame; the connection is treated as lost after it.
    pub write_timeout: Duration,
    /// How long a known host without a configured model is asked for it.
    pub model_timeout: Duration,
    /// Options used when a receiver or its model must be discovered.
    pub discovery: DiscoveryOptions,
}

impl ConnectConfig {
    /// Creates a configuration for a known host with default settings.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::ConnectConfig;
    /// use std::time::Duration;
    ///
    /// let config = ConnectConfig::new("192.168.1.20");
    /// assert_eq!(config.port, 60128);
    /// assert!(!config.reconnect);
    /// assert_eq!(config.reconnect_sleep, Duration::from_secs(5));
    /// assert!(config.verify_commands);
    /// ```
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::discover()
        }
    }

    /// Creates a configuration that connects to the first receiver to answer
    /// a discovery broadcast.
    pub fn discover() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            model: None,
            reconnect: false,
            reconnect_sleep: DEFAULT_RECONNECT_SLEEP,
            verify_commands: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            discovery: DiscoveryOptions::default(),
        }
    }

    /// Sets the receiver TCP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the receiver model and skips model discovery.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enables or disables automatic reconnect.
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets the delay before each reconnect attempt.
    pub fn with_reconnect_sleep(mut self, sleep: Duration) -> Self {
        self.reconnect_sleep = sleep;
        self
    }

    /// Enables or disables model-set filtering of commands.
    ///
    /// When disabled every value in the dictionary is accepted and no model
    /// discovery is performed.
    pub fn with_verify_commands(mut self, verify: bool) -> Self {
        self.verify_commands = verify;
        self
    }

    /// Sets the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the limit for writing one frame.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets how long a known host is asked for its model before connecting
    /// without one.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Sets the options used for discovery.
    pub fn with_discovery(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }
}

/// eISCP client for a single receiver.
///
/// Created with [`Client::new`] inside a Tokio runtime. Dropping the client
/// stops its session task and closes the connection.
pub struct Client {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Event>,
    state: watch::Receiver<ConnectionState>,
    dictionary: Arc<Dictionary>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Client {
    /// Creates a client and spawns its session task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        let (requests, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let cancel = CancellationToken::new();

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let session = Session {
            dictionary: Arc::clone(&dictionary),
            events: events.clone(),
            state: state_tx,
            config: None,
            context: None,
            model_queried: false,
            generation: 0,
            writer: None,
            reader: None,
            pending: None,
            reconnect_at: None,
            notice_tx,
            inbound_tx,
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(session.run(request_rx, notice_rx, inbound_rx));

        Self {
            requests,
            events,
            state,
            dictionary,
            cancel,
            task: Some(task),
        }
    }

    /// Subscribes to the client's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Returns the command dictionary.
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Starts a session.
    ///
    /// Returns once the attempt has started; the outcome is published as
    /// [`Event::Connected`] or [`Event::Error`] and through [`Client::state`].
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConnected` unless the client is idle or disconnected.
    pub async fn connect(&self, config: ConnectConfig) -> Result<()> {
        self.request(|reply| Request::Connect { config, reply })
            .await?
    }

    /// Closes the session and cancels any pending reconnect.
    pub async fn disconnect(&self) {
        let _ = self.request(|reply| Request::Disconnect { reply }).await;
    }

    /// Sends a raw ISCP message such as `"PWR01"`.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if no session is established (nothing is queued)
    /// - `Io` if the write fails or does not finish within
    ///   [`ConnectConfig::write_timeout`]
    ///
    /// A failed write is reported twice: the session publishes
    /// [`Event::Error`] and `Closed { user_initiated: false }` like any other
    /// connection loss (and schedules a reconnect if enabled), and the same
    /// failure is returned here so the caller learns its message was not sent.
    pub async fn raw(&self, payload: impl Into<String>) -> Result<()> {
        let payload = payload.into();
        self.request(|reply| Request::Raw { payload, reply }).await?
    }

    /// Resolves a high-level command (e.g. `"zone2.volume=30"`) and sends it.
    ///
    /// Returns the ISCP message that was sent. Resolution failures are also
    /// published as [`Event::Error`] and nothing is sent. Write failures are
    /// handled as in [`Client::raw`].
    pub async fn command(&self, input: &str) -> Result<String> {
        let input = input.to_string();
        self.request(|reply| Request::Command { input, reply })
            .await?
    }

    /// Runs a discovery with `options`, independent of the session.
    pub async fn discover(&self, options: &DiscoveryOptions) -> DiscoveryReport {
        let report = discovery::discover(options).await;
        for device in &report.devices {
            let _ = self.events.send(Event::Debug(format!(
                "Received discovery response from {}:{}: {}",
                device.host, device.port, device.message
            )));
        }
        report
    }

    /// Resolves `input` without a model filter and without sending it.
    ///
    /// Useful to validate a command string before a session exists.
    pub fn resolve(&self, input: &str) -> Result<String> {
        let parsed = ParsedCommand::parse(input)?;
        CommandResolver::new(&self.dictionary, None).encode_parsed(&parsed)
    }

    /// Lists every command name and alias of `zone`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownZone` if the zone is not in the dictionary.
    pub fn get_commands(&self, zone: &str) -> Result<Vec<String>> {
        self.dictionary
            .zone(zone)
            .map(|z| z.command_names())
            .ok_or_else(|| EiscpError::UnknownZone {
                zone: zone.to_string(),
            })
    }

    /// Lists the accepted arguments of `"[zone.]command"`.
    ///
    /// Named values are listed with all their aliases, integer ranges as
    /// `"min..max"`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownZone` or `UnknownCommand` if the lookup fails.
    pub fn get_command(&self, input: &str) -> Result<Vec<String>> {
        let (zone_name, command_name) = match input.split_once('.') {
            Some((zone, command)) => (zone, command),
            None => (DEFAULT_ZONE, input),
        };
        let zone = self
            .dictionary
            .zone(zone_name)
            .ok_or_else(|| EiscpError::UnknownZone {
                zone: zone_name.to_string(),
            })?;
        let command = zone
            .command_by_name(command_name)
            .ok_or_else(|| EiscpError::unknown_command(command_name, zone_name))?;

        let values = command.values.iter().flat_map(|v| v.names.iter().cloned());
        let ranges = command
            .ranges
            .iter()
            .map(|r| format!("{}..{}", r.range.lo, r.range.hi));
        Ok(values.chain(ranges).collect())
    }

    /// Stops the session task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(build(reply_tx))
            .await
            .map_err(|_| EiscpError::NotConnected)?;
        reply_rx.await.map_err(|_| EiscpError::NotConnected)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("zones", &self.dictionary.zones().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

enum Request {
    Connect {
        config: ConnectConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Raw {
        payload: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Command {
        input: String,
        reply: oneshot::Sender<Result<String>>,
    },
}

/// Results of tasks spawned by the session.
enum Notice {
    Discovered(DiscoveryReport),
    Connected(TcpStream),
    ConnectFailed(EiscpError),
}

struct Session {
    dictionary: Arc<Dictionary>,
    events: broadcast::Sender<Event>,
    state: watch::Sender<ConnectionState>,
    config: Option<ConnectConfig>,
    context: Option<DeviceContext>,
    /// A targeted discovery already ran for the configured host.
    model_queried: bool,
    /// Bumped whenever in-flight work is superseded.
    generation: u64,
    writer: Option<FrameWriter>,
    reader: Option<JoinHandle<()>>,
    pending: Option<JoinHandle<()>>,
    reconnect_at: Option<Instant>,
    notice_tx: mpsc::UnboundedSender<(u64, Notice)>,
    inbound_tx: mpsc::UnboundedSender<(u64, Inbound)>,
    cancel: CancellationToken,
}

impl Session {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut notices: mpsc::UnboundedReceiver<(u64, Notice)>,
        mut inbound: mpsc::UnboundedReceiver<(u64, Inbound)>,
    ) {
        let cancel = self.cancel.clone();
        loop {
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("session task cancelled");
                    break;
                }

                Some((generation, notice)) = notices.recv() => {
                    if generation == self.generation {
                        self.handle_notice(notice);
                    } else {
                        trace!(generation, current = self.generation, "dropping stale notice");
                    }
                }

                Some((generation, message)) = inbound.recv() => {
                    if generation == self.generation {
                        self.handle_inbound(message);
                    }
                }

                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => {
                        debug!("client dropped, ending session task");
                        break;
                    }
                },

                _ = reconnect_timer(reconnect_at) => {
                    self.reconnect_at = None;
                    debug!("reconnecting");
                    self.start();
                }
            }
        }

        self.teardown();
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect { config, reply } => {
                let _ = reply.send(self.connect(config));
            }
            Request::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Request::Raw { payload, reply } => {
                let result = self.send(&payload).await;
                let _ = reply.send(result);
            }
            Request::Command { input, reply } => {
                let resolved = CommandResolver::new(&self.dictionary, self.context.as_ref())
                    .encode_command(&input);
                let result = match resolved {
                    Ok(message) => self.send(&message).await.map(|()| message),
                    Err(err) => {
                        self.emit(Event::Error(err.to_string()));
                        Err(err)
                    }
                };
                let _ = reply.send(result);
            }
        }
    }

    fn connect(&mut self, config: ConnectConfig) -> Result<()> {
        let state = *self.state.borrow();
        if !state.can_connect() {
            return Err(EiscpError::AlreadyConnected);
        }

        self.reconnect_at = None;
        self.model_queried = false;
        self.config = Some(config);
        self.start();
        Ok(())
    }

    /// Starts the next step towards a connection: discovery of a receiver,
    /// discovery of its model, or the TCP connect itself.
    fn start(&mut self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };

        let options = match (&config.host, &config.model) {
            (None, _) => Some(config.discovery.clone()),
            (Some(host), None) if config.verify_commands && !self.model_queried => Some(
                config
                    .discovery
                    .clone()
                    .with_address(host.clone())
                    .with_devices(1)
                    .with_timeout(config.model_timeout),
            ),
            _ => None,
        };

        match options {
            Some(options) => self.begin_discovery(options),
            None => self.begin_connect(),
        }
    }

    fn begin_discovery(&mut self, options: DiscoveryOptions) {
        self.generation += 1;
        self.set_state(ConnectionState::Discovering);
        self.emit(Event::Debug(format!(
            "Sent discovery query to {}:{}",
            options.address, options.port
        )));

        let generation = self.generation;
        let tx = self.notice_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            let report = discovery::discover(&options).await;
            let _ = tx.send((generation, Notice::Discovered(report)));
        }));
    }

    fn begin_connect(&mut self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let Some(host) = config.host.clone() else {
            return;
        };
        let port = config.port;
        let timeout = config.connect_timeout;

        self.context = match (&config.model, config.verify_commands) {
            (Some(model), true) => Some(DeviceContext::resolve(&self.dictionary, model)),
            _ => None,
        };

        self.generation += 1;
        self.set_state(ConnectionState::Connecting);
        self.emit(Event::Debug(format!("Connecting to {}:{}", host, port)));

        let generation = self.generation;
        let tx = self.notice_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            let notice = match transport::connect(&host, port, timeout).await {
                Ok(stream) => Notice::Connected(stream),
                Err(err) => Notice::ConnectFailed(err),
            };
            let _ = tx.send((generation, notice));
        }));
    }

    fn handle_notice(&mut self, notice: Notice) {
        self.pending = None;

        match notice {
            Notice::Discovered(report) => self.discovered(report),
            Notice::Connected(stream) => {
                let (read, write) = stream.into_split();
                self.writer = Some(FrameWriter::new(write));
                self.reader = Some(transport::spawn_reader(
                    read,
                    self.generation,
                    self.inbound_tx.clone(),
                ));

                let (host, port) = self.endpoint();
                debug!(host = %host, port, "connected");
                self.set_state(ConnectionState::Connected);
                self.emit(Event::Debug(format!("Connected to {}:{}", host, port)));
                self.emit(Event::Connected { host, port });
            }
            Notice::ConnectFailed(err) => {
                let (host, port) = self.endpoint();
                warn!(host = %host, port, error = %err, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                self.emit(Event::Error(format!(
                    "Server error on {}:{}: {}",
                    host, port, err
                )));
                self.schedule_reconnect();
            }
        }
    }

    fn discovered(&mut self, report: DiscoveryReport) {
        let Some(config) = self.config.as_mut() else {
            return;
        };
        let device = report.devices.into_iter().next();

        if config.host.is_some() {
            // Model discovery for a known host; go on without filtering if
            // the receiver did not answer.
            self.model_queried = true;
            if let Some(device) = device {
                debug!(model = %device.model, "learned receiver model");
                config.model = Some(device.model);
            }
            self.begin_connect();
            return;
        }

        match device {
            Some(device) => {
                config.host = Some(device.host.to_string());
                config.port = device.port;
                if config.model.is_none() {
                    config.model = Some(device.model);
                }
                self.begin_connect();
            }
            None => {
                debug!(outcome = ?report.outcome, "no receiver found");
                self.emit(Event::Debug("No receiver found".to_string()));
                self.set_state(ConnectionState::Idle);
            }
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Message(message) => {
                let decoded = CommandResolver::new(&self.dictionary, self.context.as_ref())
                    .decode_message(&message);
                let (host, port) = self.endpoint();
                trace!(message = %message, "received");
                self.emit(Event::Debug(format!(
                    "Received data from {}:{}: {}",
                    host, port, message
                )));

                let commands = decoded.command.clone();
                self.emit(Event::Data(decoded));
                if let Some(command) = commands {
                    for name in command.names {
                        self.emit(Event::Command {
                            zone: command.zone.clone(),
                            name,
                            argument: command.argument.clone(),
                        });
                    }
                }
            }
            Inbound::Closed(reason) => self.connection_lost(reason.map(|e| e.to_string())),
        }
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            self.emit(Event::Error(format!(
                "Send command, while not connected: {}",
                payload
            )));
            return Err(EiscpError::NotConnected);
        };

        let write_timeout = self
            .config
            .as_ref()
            .map_or(DEFAULT_WRITE_TIMEOUT, |config| config.write_timeout);

        let written = tokio::select! {
            _ = self.cancel.cancelled() => return Err(EiscpError::NotConnected),
            written = tokio::time::timeout(write_timeout, writer.send(payload)) => written,
        };
        let written = written.unwrap_or_else(|_| {
            Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out").into())
        });

        match written {
            Ok(()) => {
                let (host, port) = self.endpoint();
                self.emit(Event::Debug(format!(
                    "Sent command to {}:{}: {}",
                    host, port, payload
                )));
                Ok(())
            }
            Err(err) => {
                self.connection_lost(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Handles a close not requested by the user.
    fn connection_lost(&mut self, reason: Option<String>) {
        let (host, port) = self.endpoint();
        self.teardown();
        self.set_state(ConnectionState::Disconnected);

        if let Some(reason) = reason {
            warn!(host = %host, port, reason = %reason, "connection lost");
            self.emit(Event::Error(format!(
                "Server error on {}:{}: {}",
                host, port, reason
            )));
        }
        self.emit(Event::Debug(format!("Disconnected from {}:{}", host, port)));
        self.emit(Event::Closed {
            user_initiated: false,
        });
        self.schedule_reconnect();
    }

    fn disconnect(&mut self) {
        let was_connected = *self.state.borrow() == ConnectionState::Connected;
        self.reconnect_at = None;
        self.teardown();
        self.set_state(ConnectionState::Idle);

        if was_connected {
            let (host, port) = self.endpoint();
            self.emit(Event::Debug(format!("Disconnected from {}:{}", host, port)));
            self.emit(Event::Closed {
                user_initiated: true,
            });
        }
    }

    fn schedule_reconnect(&mut self) {
        if let Some(config) = self.config.as_ref().filter(|c| c.reconnect) {
            debug!(sleep = ?config.reconnect_sleep, "reconnect scheduled");
            self.reconnect_at = Some(Instant::now() + config.reconnect_sleep);
        }
    }

    /// Drops the socket and supersedes every in-flight task.
    fn teardown(&mut self) {
        self.generation += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.writer = None;
        self.context = None;
    }

    fn endpoint(&self) -> (String, u16) {
        match self.config.as_ref() {
            Some(config) => (config.host.clone().unwrap_or_default(), config.port),
            None => (String::new(), DEFAULT_PORT),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!(from = %previous, to = %state, "state changed");
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

async fn reconnect_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
