//! A persistent command connection to one light.
//!
//! Commands are written as JSON lines carrying a random correlation id, and the
//! answers are matched back to their callers by that id. Any number of
//! [`CommandSession::send`] calls can be in flight at once; answers may arrive
//! in any order.
//!
//! There is no response timeout: a command the device never answers stays
//! pending until the connection fails or the session is closed. Callers that
//! need a bounded wait wrap `send` in `tokio::time::timeout`.

pub mod codec;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::error::SessionError;
use crate::session::codec::{InboundFrame, ResponseDecoder};
use crate::util::advertisement::DeviceDescriptor;
use crate::util::response::CommandResponse;

/// Correlation ids are drawn uniformly from this range.
pub const REQUEST_ID_RANGE: RangeInclusive<u64> = 1..=1_000_000_000;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal, reached only through [`CommandSession::close`].
    Closed,
}

/// Sent to subscribers whenever a connection ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseNotice {
    pub device_id: u64,
    pub host: String,
    pub port: u16,
    pub was_connected: bool,
    /// `None` when the session was closed locally.
    pub error: Option<SessionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    /// Inbound data that answered no pending request, e.g. a property notification.
    Data(InboundFrame),
    Closed(CloseNotice),
}

type ResultSlot = oneshot::Sender<Result<CommandResponse, SessionError>>;

struct PendingRequest {
    request_id: u64,
    result_slot: ResultSlot,
    created_at: Instant,
}

struct SessionState {
    connection: ConnectionState,
    /// Bumped on every connect so a reader of an old connection cannot tear down a new one.
    generation: u64,
    pending: HashMap<u64, PendingRequest>,
}

struct Shared {
    device_id: u64,
    host: String,
    port: u16,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    /// Cancelled by [`CommandSession::close`]; wakes sends parked on the writer.
    closed: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn notice(&self, was_connected: bool, error: Option<SessionError>) -> SessionEvent {
        SessionEvent::Closed(CloseNotice {
            device_id: self.device_id,
            host: self.host.clone(),
            port: self.port,
            was_connected,
            error,
        })
    }

    fn dispatch(&self, frame: InboundFrame) {
        let pending = match &frame {
            InboundFrame::Json(value) => CommandResponse::correlation_id(value)
                .and_then(|id| self.lock().pending.remove(&id)),
            InboundFrame::Text(_) => None,
        };

        match (pending, frame) {
            (Some(pending), InboundFrame::Json(value)) => {
                if let Some(response) = CommandResponse::from_value(value) {
                    debug!(
                        "Request {} answered after {:?}",
                        pending.request_id,
                        pending.created_at.elapsed()
                    );
                    let _ = pending.result_slot.send(Ok(response));
                }
            }
            (_, frame) => {
                debug!("Unmatched data from {}:{}: {:?}", self.host, self.port, frame);
                self.emit(SessionEvent::Data(frame));
            }
        }
    }

    /// Ends connection `generation`, failing everything still pending on it.
    fn disconnect(&self, generation: u64, error: SessionError) {
        let pending = {
            let mut state = self.lock();
            if state.generation != generation || state.connection != ConnectionState::Connected {
                return;
            }
            state.connection = ConnectionState::Disconnected;
            std::mem::take(&mut state.pending)
        };

        info!(
            "Connection to {}:{} ended ({}), failing {} pending request(s)",
            self.host,
            self.port,
            error,
            pending.len()
        );
        for (_, request) in pending {
            let _ = request.result_slot.send(Err(error.clone()));
        }
        self.emit(self.notice(true, Some(error)));
    }
}

/// A command connection to one device, opened lazily on the first send.
pub struct CommandSession {
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CommandSession {
    pub fn new(device_id: u64, host: &str, port: u16) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        CommandSession {
            shared: Arc::new(Shared {
                device_id,
                host: host.to_string(),
                port,
                state: Mutex::new(SessionState {
                    connection: ConnectionState::Disconnected,
                    generation: 0,
                    pending: HashMap::new(),
                }),
                events,
                closed: CancellationToken::new(),
            }),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn from_descriptor(device: &DeviceDescriptor) -> Self {
        Self::new(device.id, &device.address, device.port)
    }

    pub fn device_id(&self) -> u64 {
        self.shared.device_id
    }

    pub fn endpoint(&self) -> (&str, u16) {
        (&self.shared.host, self.shared.port)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().connection
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of commands still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Registers a listener for connection and unsolicited data events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Opens the connection now instead of on the first send.
    pub async fn connect(&self) -> Result<(), SessionError> {
        tokio::select! {
            connected = async {
                let mut writer = self.writer.lock().await;
                self.ensure_connected(&mut writer).await
            } => connected,
            _ = self.shared.closed.cancelled() => Err(self.release_writer().await),
        }
    }

    async fn ensure_connected(
        &self,
        writer: &mut Option<OwnedWriteHalf>,
    ) -> Result<(), SessionError> {
        {
            let mut state = self.shared.lock();
            match state.connection {
                ConnectionState::Closed => return Err(SessionError::Closed),
                ConnectionState::Connected if writer.is_some() => return Ok(()),
                _ => state.connection = ConnectionState::Connecting,
            }
        }

        let (host, port) = (self.shared.host.as_str(), self.shared.port);
        debug!("Connecting to {}:{}", host, port);
        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(err) => {
                let mut state = self.shared.lock();
                if state.connection == ConnectionState::Connecting {
                    state.connection = ConnectionState::Disconnected;
                }
                warn!("Failed to connect to {}:{}: {}", host, port, err);
                return Err(SessionError::Connect {
                    host: host.to_string(),
                    port,
                    message: err.to_string(),
                });
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", err);
        }
        let (read_half, write_half) = stream.into_split();

        let generation = {
            let mut state = self.shared.lock();
            if state.connection == ConnectionState::Closed {
                return Err(SessionError::Closed);
            }
            state.generation += 1;
            state.connection = ConnectionState::Connected;
            state.generation
        };
        *writer = Some(write_half);

        let handle = tokio::spawn(read_loop(Arc::clone(&self.shared), read_half, generation));
        if let Some(previous) = self.reader_handle().replace(handle) {
            previous.abort();
        }

        info!("Connected to device {:#x} at {}:{}", self.shared.device_id, host, port);
        self.shared.emit(SessionEvent::Connected);
        Ok(())
    }

    /**
    Sends a command and waits for the device's answer.

    Connects first when the session is disconnected. The answer is returned as
    is, so a device-side `error` object arrives as an `Ok` response with
    [`CommandResponse::is_error`] set. Transport failures, a remote close and
    a local [`Self::close`] all fail the call.
    */
    pub async fn send(&self, command: &Command) -> Result<CommandResponse, SessionError> {
        if self.shared.closed.is_cancelled() {
            return Err(SessionError::Closed);
        }
        // Waiting for the writer and writing both give way to a close.
        let receiver = tokio::select! {
            written = self.write_command(command) => written?,
            _ = self.shared.closed.cancelled() => return Err(self.release_writer().await),
        };

        receiver.await.unwrap_or(Err(SessionError::Closed))
    }

    async fn write_command(
        &self,
        command: &Command,
    ) -> Result<oneshot::Receiver<Result<CommandResponse, SessionError>>, SessionError> {
        let mut writer = self.writer.lock().await;
        self.ensure_connected(&mut writer).await?;

        // Registered before writing, so an immediate answer always finds it.
        let (request_id, receiver) = self.register()?;
        let line = match command.to_line(request_id) {
            Ok(line) => line,
            Err(err) => {
                self.shared.lock().pending.remove(&request_id);
                return Err(SessionError::Encode(err.to_string()));
            }
        };

        debug!("-> {}:{} {}", self.shared.host, self.shared.port, line.trim_end());
        let written = match writer.as_mut() {
            Some(stream) => stream.write_all(line.as_bytes()).await,
            None => Err(std::io::ErrorKind::NotConnected.into()),
        };
        if let Err(err) = written {
            warn!(
                "Failed to write to {}:{}: {}",
                self.shared.host, self.shared.port, err
            );
            let generation = self.shared.lock().generation;
            self.shared
                .disconnect(generation, SessionError::Transport(err.to_string()));
            *writer = None;
        }
        Ok(receiver)
    }

    /// Drops the write half once a close has interrupted the send holding it.
    async fn release_writer(&self) -> SessionError {
        self.writer.lock().await.take();
        SessionError::Closed
    }

    fn register(
        &self,
    ) -> Result<(u64, oneshot::Receiver<Result<CommandResponse, SessionError>>), SessionError>
    {
        let mut state = self.shared.lock();
        match state.connection {
            ConnectionState::Connected => {}
            ConnectionState::Closed => return Err(SessionError::Closed),
            _ => return Err(SessionError::ConnectionClosed),
        }

        let mut rng = rand::thread_rng();
        let request_id = loop {
            let candidate = rng.gen_range(REQUEST_ID_RANGE);
            if !state.pending.contains_key(&candidate) {
                break candidate;
            }
        };

        let (result_slot, receiver) = oneshot::channel();
        state.pending.insert(
            request_id,
            PendingRequest {
                request_id,
                result_slot,
                created_at: Instant::now(),
            },
        );
        Ok((request_id, receiver))
    }

    /// Tears the connection down and fails pending requests. Calling it again does nothing.
    pub fn close(&self) {
        let (pending, was_connected) = {
            let mut state = self.shared.lock();
            if state.connection == ConnectionState::Closed {
                return;
            }
            let was_connected = state.connection == ConnectionState::Connected;
            state.connection = ConnectionState::Closed;
            (std::mem::take(&mut state.pending), was_connected)
        };

        if let Some(handle) = self.reader_handle().take() {
            handle.abort();
        }
        self.shared.closed.cancel();
        // A send holding the writer releases it when it sees the cancellation.
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }

        for (_, request) in pending {
            let _ = request.result_slot.send(Err(SessionError::Closed));
        }
        info!(
            "Closed session to device {:#x} at {}:{}",
            self.shared.device_id, self.shared.host, self.shared.port
        );
        self.shared.emit(self.shared.notice(was_connected, None));
    }

    fn reader_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_handle().take() {
            handle.abort();
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: OwnedReadHalf, generation: u64) {
    let mut decoder = ResponseDecoder::new();
    let error = loop {
        match reader.read_buf(decoder.buffer_mut()).await {
            Ok(0) => break SessionError::ConnectionClosed,
            Ok(_) => {
                for frame in decoder.decode() {
                    shared.dispatch(frame);
                }
            }
            Err(err) => {
                warn!("Read from {}:{} failed: {}", shared.host, shared.port, err);
                break SessionError::Transport(err.to_string());
            }
        }
    };
    shared.disconnect(generation, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuilder;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, Lines};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    struct FakeDevice {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl FakeDevice {
        async fn accept(listener: &TcpListener) -> Self {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, writer) = stream.into_split();
            FakeDevice {
                lines: BufReader::new(read).lines(),
                writer,
            }
        }

        async fn next_request(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn reply(&mut self, raw: &str) {
            self.writer.write_all(raw.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn answer(&mut self, id: u64, result: Value) {
            let line = json!({"id": id, "result": result}).to_string();
            self.reply(&format!("{line}\r\n")).await;
        }
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn request_id(request: &Value) -> u64 {
        request["id"].as_u64().unwrap()
    }

    fn spawn_send(
        session: &Arc<CommandSession>,
        command: Command,
    ) -> JoinHandle<Result<CommandResponse, SessionError>> {
        let session = Arc::clone(session);
        tokio::spawn(async move { session.send(&command).await })
    }

    #[tokio::test]
    async fn test_send_connects_lazily_and_resolves() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let call = spawn_send(&session, CommandBuilder::set_bright(70, "smooth", 500));
        let mut device = FakeDevice::accept(&listener).await;
        let request = device.next_request().await;
        assert_eq!(request["method"], "set_bright");
        assert_eq!(request["params"], json!([70, "smooth", 500]));
        assert!(REQUEST_ID_RANGE.contains(&request_id(&request)));

        device.answer(request_id(&request), json!(["ok"])).await;
        let response = call.await.unwrap().unwrap();
        assert_eq!(response.id, request_id(&request));
        assert!(response.is_ok());
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_responses_are_matched_by_id_not_order() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        let first = spawn_send(&session, CommandBuilder::get_prop("power", &[]));
        let mut device = FakeDevice::accept(&listener).await;
        let id_a = request_id(&device.next_request().await);
        let second = spawn_send(&session, CommandBuilder::toggle());
        let id_b = request_id(&device.next_request().await);
        assert_ne!(id_a, id_b);

        device.answer(id_b, json!(["ok"])).await;
        let response_b = second.await.unwrap().unwrap();
        assert_eq!(response_b.id, id_b);
        assert!(!first.is_finished());
        assert_eq!(session.pending_count(), 1);

        device.answer(id_a, json!(["on"])).await;
        let response_a = first.await.unwrap().unwrap();
        assert_eq!(response_a.id, id_a);
        assert_eq!(response_a.result_strings(), vec!["on".to_string()]);
    }

    #[tokio::test]
    async fn test_response_split_across_packets() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        let call = spawn_send(&session, CommandBuilder::toggle());
        let mut device = FakeDevice::accept(&listener).await;
        let id = request_id(&device.next_request().await);

        let line = format!("{{\"id\":{id},\"result\":[\"ok\"]}}\r\n");
        let (head, tail) = line.split_at(7);
        device.reply(head).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        device.reply(tail).await;

        assert_eq!(call.await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_device_error_is_returned_as_response() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        let call = spawn_send(&session, CommandBuilder::set_default());
        let mut device = FakeDevice::accept(&listener).await;
        let id = request_id(&device.next_request().await);
        device
            .reply(&format!(
                "{{\"id\":{id},\"error\":{{\"code\":-1,\"message\":\"unsupported method\"}}}}\r\n"
            ))
            .await;

        let response = call.await.unwrap().unwrap();
        assert!(response.is_error());
        assert_eq!(response.error.unwrap().code, -1);
    }

    #[tokio::test]
    async fn test_unsolicited_data_is_forwarded() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));
        let mut events = session.subscribe();

        let call = spawn_send(&session, CommandBuilder::toggle());
        let mut device = FakeDevice::accept(&listener).await;
        let id = request_id(&device.next_request().await);
        device
            .reply("{\"method\":\"props\",\"params\":{\"power\":\"off\"}}\r\n")
            .await;
        device.answer(id, json!(["ok"])).await;
        assert!(call.await.unwrap().is_ok());

        let mut forwarded = None;
        while let Ok(Ok(event)) = timeout(Duration::from_secs(1), events.recv()).await {
            if let SessionEvent::Data(frame) = event {
                forwarded = Some(frame);
                break;
            }
        }
        assert_eq!(
            forwarded,
            Some(InboundFrame::Json(
                json!({"method": "props", "params": {"power": "off"}})
            ))
        );
    }

    #[tokio::test]
    async fn test_remote_close_fails_every_pending_request() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(7, "127.0.0.1", port));
        let mut events = session.subscribe();

        let calls: Vec<_> = (0..3)
            .map(|_| spawn_send(&session, CommandBuilder::toggle()))
            .collect();
        let mut device = FakeDevice::accept(&listener).await;
        for _ in 0..3 {
            device.next_request().await;
        }
        assert_eq!(session.pending_count(), 3);
        drop(device);

        for call in calls {
            assert_eq!(call.await.unwrap(), Err(SessionError::ConnectionClosed));
        }
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let mut notice = None;
        while let Ok(Ok(event)) = timeout(Duration::from_secs(1), events.recv()).await {
            if let SessionEvent::Closed(closed) = event {
                notice = Some(closed);
                break;
            }
        }
        let notice = notice.unwrap();
        assert_eq!(notice.device_id, 7);
        assert_eq!(notice.port, port);
        assert!(notice.was_connected);
        assert_eq!(notice.error, Some(SessionError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_reconnects_after_disconnect() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        session.connect().await.unwrap();
        let device = FakeDevice::accept(&listener).await;
        drop(device);
        timeout(Duration::from_secs(1), async {
            while session.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let call = spawn_send(&session, CommandBuilder::toggle());
        let mut device = FakeDevice::accept(&listener).await;
        let id = request_id(&device.next_request().await);
        device.answer(id, json!(["ok"])).await;
        assert!(call.await.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_is_terminal() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        let call = spawn_send(&session, CommandBuilder::toggle());
        let mut device = FakeDevice::accept(&listener).await;
        device.next_request().await;

        session.close();
        session.close();
        assert_eq!(call.await.unwrap(), Err(SessionError::Closed));
        assert_eq!(session.state(), ConnectionState::Closed);
        assert_eq!(
            session.send(&CommandBuilder::toggle()).await,
            Err(SessionError::Closed)
        );
    }

    #[tokio::test]
    async fn test_close_interrupts_a_blocked_write() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(1, "127.0.0.1", port));

        // The device never reads, so a line this long fills both socket buffers.
        let name = "x".repeat(32 << 20);
        let blocked = spawn_send(
            &session,
            CommandBuilder::set_name(Some(name.as_str())).unwrap(),
        );
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!blocked.is_finished());
        let queued = spawn_send(&session, CommandBuilder::toggle());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!queued.is_finished());

        session.close();
        for call in [blocked, queued] {
            let result = timeout(Duration::from_secs(2), call).await.unwrap().unwrap();
            assert_eq!(result, Err(SessionError::Closed));
        }
        let later = timeout(Duration::from_secs(2), session.send(&CommandBuilder::toggle()))
            .await
            .unwrap();
        assert_eq!(later, Err(SessionError::Closed));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_reset_fails_pending_with_transport_error() {
        let (listener, port) = listener().await;
        let session = Arc::new(CommandSession::new(3, "127.0.0.1", port));
        let mut events = session.subscribe();

        let calls: Vec<_> = (0..3)
            .map(|_| spawn_send(&session, CommandBuilder::toggle()))
            .collect();
        let (stream, _) = listener.accept().await.unwrap();
        socket2::SockRef::from(&stream)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        let mut lines = BufReader::new(stream).lines();
        for _ in 0..3 {
            lines.next_line().await.unwrap().unwrap();
        }
        assert_eq!(session.pending_count(), 3);
        // Zero linger turns the close into a reset.
        drop(lines);

        for call in calls {
            let result = timeout(Duration::from_secs(2), call).await.unwrap().unwrap();
            assert!(matches!(result, Err(SessionError::Transport(_))), "{result:?}");
        }
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let mut notice = None;
        while let Ok(Ok(event)) = timeout(Duration::from_secs(1), events.recv()).await {
            if let SessionEvent::Closed(closed) = event {
                notice = Some(closed);
                break;
            }
        }
        assert!(matches!(
            notice.and_then(|notice| notice.error),
            Some(SessionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_session_disconnected() {
        let (listener, port) = listener().await;
        drop(listener);
        let session = CommandSession::new(1, "127.0.0.1", port);

        let result = session.send(&CommandBuilder::toggle()).await;
        assert!(matches!(result, Err(SessionError::Connect { .. })));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
