//! Connection management: socket lifecycle, response correlation, event dispatch.
//!
//! Three execution contexts cooperate per connection:
//! 1. the caller's tasks issuing [`AmiClient::send_action`] / [`AmiClient::quit`],
//! 2. the reader task, sole owner of the socket's read half,
//! 3. the dispatcher task, which invokes observers one event at a time.
//!
//! They communicate only through channels and two locks: the writer mutex
//! (which also covers waiter registration, so wire order equals waiter order)
//! and the registry mutex. Shutdown is cooperative via a cancellation token
//! plus channel closure; no sentinel values travel through the queues.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::{AmiAction, AmiResponse};
use crate::constants::{DEFAULT_TIMEOUT_MS, MAX_EVENT_QUEUE_SIZE, SOCKET_BUF_SIZE};
use crate::error::{AmiError, AmiResult};
use crate::event::{AmiEvent, DispatchControl};
use crate::protocol::{AmiMessage, AmiParser, Greeting, MessageKind, RawFrame};
use crate::registry::{CallbackRegistry, EventCallback};

pub use crate::constants::DEFAULT_ACTION_TIMEOUT_MS;

/// Connection lifecycle states.
///
/// `send_action` is legal only in `Connected`. The transitions are
/// `Disconnected → Connecting → Connected → Draining → Closed`; a socket
/// error from any state jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made.
    Disconnected,
    /// TCP established, greeting not yet received.
    Connecting,
    /// Greeting received; reader and dispatcher are running.
    Connected,
    /// Shutdown in progress; background tasks are winding down.
    Draining,
    /// Socket closed and both background tasks terminated.
    Closed,
}

/// One caller blocked on a response, in FIFO send order.
struct Waiter {
    /// The `ActionID` we attached to the outbound action. Responses are
    /// correlated by order, not by this value; it is only used to warn when
    /// the server's `ActionID` disagrees with the expected one.
    action_id: String,
    tx: oneshot::Sender<AmiMessage>,
}

/// State shared between the client handles and the reader task.
struct SharedState {
    waiters: StdMutex<VecDeque<Waiter>>,
    state_tx: watch::Sender<ConnectionState>,
    /// Action response timeout in milliseconds
    action_timeout_ms: AtomicU64,
    /// Monotonic per-client sequence for ActionID generation
    action_seq: AtomicU64,
    client_id: String,
    /// Total count of events dropped due to a full queue
    dropped_event_count: AtomicU64,
}

impl SharedState {
    fn new(client_id: String) -> (Arc<Self>, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Self {
            waiters: StdMutex::new(VecDeque::new()),
            state_tx,
            action_timeout_ms: AtomicU64::new(DEFAULT_ACTION_TIMEOUT_MS),
            action_seq: AtomicU64::new(0),
            client_id,
            dropped_event_count: AtomicU64::new(0),
        });
        (shared, state_rx)
    }

    fn next_action_id(&self) -> String {
        let seq = self.action_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{:08}", self.client_id, seq)
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    fn push_waiter(&self, waiter: Waiter) {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(waiter);
    }

    fn pop_waiter(&self) -> Option<Waiter> {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn remove_waiter(&self, action_id: &str) {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|w| w.action_id != action_id);
    }

    /// Release every blocked sender with a closed-connection error (their
    /// oneshot senders are dropped, which the receivers observe).
    fn fail_waiters(&self) {
        let drained: Vec<Waiter> = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if !drained.is_empty() {
            debug!("releasing {} blocked caller(s) on close", drained.len());
        }
    }
}

struct BackgroundTasks {
    reader: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Read a single frame from the not-yet-split socket. Used only for the
/// greeting; once the reader task starts it owns all read access.
async fn recv_frame(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
) -> AmiResult<RawFrame> {
    loop {
        if let Some(frame) = parser.next_frame()? {
            return Ok(frame);
        }

        let read_result = timeout(
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            stream.read(read_buffer),
        )
        .await;

        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(AmiError::Io(e)),
            Err(_) => {
                return Err(AmiError::Timeout {
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                })
            }
        };

        if bytes_read == 0 {
            return Err(AmiError::ConnectionClosed);
        }
        parser.add_data(&read_buffer[..bytes_read])?;
    }
}

/// Hand an event to the dispatcher queue without ever blocking the reader.
///
/// A full queue drops the event and counts it; a closed queue means the
/// dispatcher is gone and the event has nowhere to go.
fn queue_event(event_tx: &mpsc::Sender<AmiEvent>, shared: &SharedState, event: AmiEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event queue closed, dropping event");
        }
        Err(mpsc::error::TrySendError::Full(event)) => {
            shared.dropped_event_count.fetch_add(1, Ordering::Relaxed);
            warn!("event queue full, dropping event {}", event.name());
        }
    }
}

/// Classify one frame and route it to the correlator or the dispatcher.
fn route_frame(frame: RawFrame, shared: &SharedState, event_tx: &mpsc::Sender<AmiEvent>) {
    let message = AmiMessage::from_frame(frame);
    match message.kind() {
        MessageKind::Event => match AmiEvent::from_message(message) {
            Ok(event) => {
                trace!("event {}", event.name());
                queue_event(event_tx, shared, event);
            }
            Err(e) => warn!("event-class message rejected: {}", e),
        },
        MessageKind::Response => match shared.pop_waiter() {
            Some(waiter) => {
                if let Some(response_id) = message.header(crate::headers::AmiHeader::ActionId) {
                    if response_id != waiter.action_id {
                        warn!(
                            "response ActionID {:?} does not match expected {:?}",
                            response_id, waiter.action_id
                        );
                    }
                }
                if waiter.tx.send(message).is_err() {
                    debug!("caller gave up before its response arrived");
                }
            }
            None => warn!("response-class message with no pending action, dropping"),
        },
        MessageKind::Greeting => warn!("unexpected greeting after connect, dropping"),
        MessageKind::Unknown => {
            debug!("unclassifiable message dropped: {:?}", message.headers())
        }
    }
}

/// Background reader loop wrapper: a panic degrades to a disconnect.
async fn reader_loop(
    reader: OwnedReadHalf,
    parser: AmiParser,
    shared: Arc<SharedState>,
    event_tx: mpsc::Sender<AmiEvent>,
    cancel: CancellationToken,
) {
    let shared2 = shared.clone();
    let inner = std::panic::AssertUnwindSafe(reader_loop_inner(
        reader, parser, shared, event_tx, cancel,
    ));
    if futures_util::FutureExt::catch_unwind(inner).await.is_err() {
        tracing::error!("reader task panicked");
        shared2.set_state(ConnectionState::Closed);
        shared2.fail_waiters();
    }
}

async fn reader_loop_inner(
    mut reader: OwnedReadHalf,
    mut parser: AmiParser,
    shared: Arc<SharedState>,
    event_tx: mpsc::Sender<AmiEvent>,
    cancel: CancellationToken,
) {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

    loop {
        // Drain buffered frames before touching the socket again.
        match parser.next_frame() {
            Ok(Some(frame)) => {
                route_frame(frame, &shared, &event_tx);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("parser error, closing connection: {}", e);
                break;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reader cancelled");
                break;
            }
            read = reader.read(&mut read_buffer) => match read {
                Ok(0) => {
                    info!("connection closed by peer (EOF)");
                    break;
                }
                Ok(n) => {
                    trace!("read {} bytes", n);
                    if let Err(e) = parser.add_data(&read_buffer[..n]) {
                        warn!("buffer error, closing connection: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    warn!("read error, closing connection: {}", e);
                    break;
                }
            }
        }
    }

    // Any partial frame in the parser is discarded with it; never delivered.
    shared.set_state(ConnectionState::Closed);
    shared.fail_waiters();
    // Dropping event_tx closes the dispatcher's queue, which is its signal
    // to drain and exit.
}

/// Background dispatcher loop wrapper: an observer panic degrades to a
/// disconnect instead of silently killing dispatch.
async fn dispatcher_loop(
    event_rx: mpsc::Receiver<AmiEvent>,
    registry: Arc<CallbackRegistry>,
    client: AmiClient,
) {
    let cancel = client.cancel.clone();
    let shared = client.shared.clone();
    let inner =
        std::panic::AssertUnwindSafe(dispatcher_loop_inner(event_rx, registry, client));
    if futures_util::FutureExt::catch_unwind(inner).await.is_err() {
        tracing::error!("dispatcher task panicked in an observer");
        cancel.cancel();
        shared.set_state(ConnectionState::Closed);
    }
}

async fn dispatcher_loop_inner(
    mut event_rx: mpsc::Receiver<AmiEvent>,
    registry: Arc<CallbackRegistry>,
    client: AmiClient,
) {
    while let Some(event) = event_rx.recv().await {
        let observers = registry.snapshot(event.name());
        trace!(
            "dispatching {} to {} observer(s)",
            event.name(),
            observers.len()
        );
        for observer in observers {
            if observer(&event, &client) == DispatchControl::Stop {
                trace!("observer stopped dispatch of {}", event.name());
                break;
            }
        }
    }
    debug!("event dispatcher exiting");
}

/// AMI client handle (Clone + Send).
///
/// Actions are serialized through the writer mutex; the reader task routes
/// each response-class message to the oldest waiting caller (the protocol
/// delivers responses in send order). Events fan out to observers registered
/// with [`register`](Self::register) on a dedicated dispatcher task.
#[derive(Clone)]
pub struct AmiClient {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    shared: Arc<SharedState>,
    registry: Arc<CallbackRegistry>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<Option<BackgroundTasks>>>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("state", &self.state())
            .finish()
    }
}

impl AmiClient {
    /// Connect to the manager interface and consume the greeting.
    ///
    /// The greeting is the connection's initial "response" and is returned
    /// alongside the client. The reader and dispatcher tasks are running by
    /// the time this returns; authentication is a separate step
    /// ([`login`](Self::login)).
    pub async fn connect(host: &str, port: u16) -> AmiResult<(Self, Greeting)> {
        info!("connecting to AMI at {}:{}", host, port);

        let (shared, state_rx) = SharedState::new(format!("ami-{}", std::process::id()));
        shared.set_state(ConnectionState::Connecting);

        let dial = TcpStream::connect((host, port));
        let mut stream = match timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS), dial).await {
            Ok(stream) => stream?,
            Err(_) => {
                warn!(
                    "connect to {}:{} timed out after {}ms",
                    host, port, DEFAULT_TIMEOUT_MS
                );
                return Err(AmiError::Timeout {
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                });
            }
        };

        let mut parser = AmiParser::new();
        let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

        let frame = recv_frame(&mut stream, &mut parser, &mut read_buffer).await?;
        if !frame.greeting {
            return Err(AmiError::protocol_error(
                "expected greeting, got a framed message",
            ));
        }
        let greeting_line = frame.lines.first().map(|s| s.as_str()).unwrap_or_default();
        let greeting = Greeting::parse(greeting_line)?;
        info!("connected to {}", greeting);

        let (read_half, write_half) = stream.into_split();
        shared.set_state(ConnectionState::Connected);

        let registry = Arc::new(CallbackRegistry::new());
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(MAX_EVENT_QUEUE_SIZE);

        let client = AmiClient {
            writer: Arc::new(Mutex::new(write_half)),
            shared: shared.clone(),
            registry: registry.clone(),
            state_rx,
            cancel: cancel.clone(),
            tasks: Arc::new(Mutex::new(None)),
        };

        let reader = tokio::spawn(reader_loop(
            read_half,
            parser,
            shared,
            event_tx,
            cancel,
        ));
        let dispatcher = tokio::spawn(dispatcher_loop(event_rx, registry, client.clone()));

        *client.tasks.lock().await = Some(BackgroundTasks { reader, dispatcher });

        Ok((client, greeting))
    }

    /// Send an action and wait for its response.
    ///
    /// Responses are correlated FIFO: the waiter is enqueued and the bytes
    /// are written under the same writer lock, so the order of waiters is
    /// exactly the order of actions on the wire, and the reader hands each
    /// response-class message to the oldest waiter. Events interleaved
    /// before the response are routed to the dispatcher, never returned
    /// here.
    ///
    /// If the connection closes while waiting, this returns
    /// [`AmiError::ConnectionClosed`] instead of blocking forever.
    pub async fn send_action(&self, action: AmiAction) -> AmiResult<AmiResponse> {
        if !self.is_connected() {
            return Err(AmiError::NotConnected);
        }

        let action_id = self.shared.next_action_id();
        let wire = action.to_wire_format(&action_id)?;
        if action.name().eq_ignore_ascii_case("login") {
            debug!("sending action: Login [REDACTED] ({})", action_id);
        } else {
            debug!("sending action: {} ({})", action.name(), action_id);
        }

        let (tx, mut rx) = oneshot::channel();
        {
            // Waiter registration and the write happen under one lock so a
            // concurrent sender cannot interleave and break FIFO order, and
            // partial writes from two callers cannot corrupt framing.
            let mut writer = self.writer.lock().await;
            self.shared.push_waiter(Waiter {
                action_id: action_id.clone(),
                tx,
            });
            // Re-check under the lock: the reader may have drained the queue
            // between the gate above and the push. The close path publishes
            // `Closed` before draining, so a push that lands after the drain
            // always sees `Closed` here.
            if !self.is_connected() {
                self.shared.remove_waiter(&action_id);
                return Err(AmiError::ConnectionClosed);
            }
            if let Err(e) = writer.write_all(wire.as_bytes()).await {
                // Nothing reached the wire, so the waiter can come back out.
                self.shared.remove_waiter(&action_id);
                return Err(AmiError::Io(e));
            }
        }

        let timeout_ms = self.shared.action_timeout_ms.load(Ordering::Relaxed);
        match timeout(Duration::from_millis(timeout_ms), &mut rx).await {
            Ok(Ok(message)) => {
                let response = AmiResponse::new(message);
                debug!(
                    "response for {}: {}",
                    action_id,
                    response.response().unwrap_or("<none>")
                );
                Ok(response)
            }
            Ok(Err(_)) => Err(AmiError::ConnectionClosed),
            Err(_) => {
                // The response may have raced the deadline.
                if let Ok(message) = rx.try_recv() {
                    return Ok(AmiResponse::new(message));
                }
                // The action is on the wire, so its waiter must stay queued:
                // the late response has to consume this slot, not the next
                // caller's. The reader's send to the dropped receiver fails
                // and the stale message falls on the floor.
                Err(AmiError::Timeout { timeout_ms })
            }
        }
    }

    /// Register an observer for the named event, or for every event with
    /// [`WILDCARD_EVENT`](crate::constants::WILDCARD_EVENT) (`"*"`).
    ///
    /// Observers run on the dispatcher task, one event at a time, specific
    /// registrations before wildcard ones, each group in registration
    /// order. Returning [`DispatchControl::Stop`] skips the remaining
    /// observers for that event. Observers live for the connection's
    /// lifetime; there is no unregister.
    ///
    /// From inside an observer, use [`request_quit`](Self::request_quit) to
    /// initiate shutdown; `quit` is reserved for the caller's context.
    pub fn register<F>(&self, event_name: impl AsRef<str>, callback: F)
    where
        F: Fn(&AmiEvent, &AmiClient) -> DispatchControl + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        self.registry.register(event_name.as_ref(), callback);
    }

    /// Orderly shutdown: stop both background tasks, close the socket, and
    /// wait for the tasks to terminate. Idempotent. After this returns no
    /// background task of this connection is left running.
    pub async fn quit(&self) -> AmiResult<()> {
        info!("client requested shutdown");
        self.shared.set_state(ConnectionState::Draining);
        self.cancel.cancel();

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!("write-half shutdown: {}", e);
            }
        }

        let tasks = { self.tasks.lock().await.take() };
        if let Some(tasks) = tasks {
            if let Err(e) = tasks.reader.await {
                debug!("reader join: {}", e);
            }
            if let Err(e) = tasks.dispatcher.await {
                debug!("dispatcher join: {}", e);
            }
        }

        self.shared.fail_waiters();
        self.shared.set_state(ConnectionState::Closed);
        Ok(())
    }

    /// Signal shutdown without joining the background tasks.
    ///
    /// Safe to call from inside an observer (which runs on the dispatcher
    /// task and therefore must not join it). The reader stops, the event
    /// queue drains, and the dispatcher exits on its own; a subsequent
    /// [`quit`](Self::quit) from the caller's context reaps both tasks.
    pub fn request_quit(&self) {
        debug!("shutdown signalled");
        self.shared.set_state(ConnectionState::Draining);
        self.cancel.cancel();
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Whether actions can currently be sent.
    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected)
    }

    /// Number of events dropped because the dispatcher queue was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared.dropped_event_count.load(Ordering::Relaxed)
    }

    /// Set the action response timeout (default: 5 seconds).
    pub fn set_action_timeout(&self, duration: Duration) {
        self.shared
            .action_timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }
}
