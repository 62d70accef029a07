use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lanlink_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use lanlink_proto::{
    ConfirmReceiveRequest, ConnectToDeviceRequest, EventEnvelope, InboundMessage,
    ModifySettingsRequest, OperationType, RequestEnvelope, SendFilesRequest, TransferActionRequest,
};
use lanlink_transport::{IpcStream, PipeEndpoint, SessionChannels};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::correlation::{CorrelationTable, ResponseHandle};
use crate::error::{Result, SessionError};
use crate::readiness::{ReadinessAggregator, ReadinessChange};
use crate::router::{EventRouter, DEFAULT_BACKLOG_CAPACITY};
use crate::supervisor::Supervisor;

/// How often the read loop wakes with no traffic, to sweep overdue entries.
const READ_TICK: Duration = Duration::from_secs(1);

/// How long shutdown waits for the backend to honor `ExitApp` before killing.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tunables for a backend session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend executable to launch.
    pub backend_program: PathBuf,
    /// Extra arguments placed before the channel arguments.
    pub backend_args: Vec<String>,
    /// Directory the per-session socket paths are created in.
    pub pipe_dir: PathBuf,
    /// Deadline for a correlated response. Default: 30 s.
    pub response_timeout: Duration,
    /// Deadline for the backend to dial both channels after spawn.
    pub connect_timeout: Duration,
    /// Events buffered before the consumer subscribes.
    pub event_backlog: usize,
    /// Largest accepted frame payload.
    pub max_payload_size: usize,
}

impl SessionConfig {
    pub fn new(backend_program: impl Into<PathBuf>) -> Self {
        Self {
            backend_program: backend_program.into(),
            backend_args: Vec::new(),
            pipe_dir: std::env::temp_dir(),
            response_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            event_backlog: DEFAULT_BACKLOG_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// State shared between the session handle, the read loop and the
/// supervisor's exit watcher.
struct Shared {
    table: Arc<CorrelationTable>,
    readiness: ReadinessAggregator,
    router: EventRouter,
    writer: Mutex<Option<FrameWriter<IpcStream>>>,
    /// Clone of the inbound stream, kept to unblock the read loop.
    inbound: IpcStream,
    closed: AtomicBool,
}

impl Shared {
    /// Idempotent transport teardown.
    ///
    /// Drops the outbound writer, wakes the read loop, flips readiness
    /// down and fails every outstanding request. Safe to call from the
    /// read loop, the exit watcher and the session handle concurrently;
    /// only the first caller's reason is published.
    fn teardown(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason, "tearing down session transport");

        *self.writer.lock().unwrap() = None;
        if let Err(err) = self.inbound.shutdown() {
            debug!(error = %err, "inbound shutdown failed (already closed)");
        }
        self.readiness.set_transport_connected(false, Some(reason));
        self.table.fail_all_closed(reason);
    }
}

/// A live GUI-side session with one supervised backend process.
///
/// Owns the backend child, both pipe connections, the read loop and the
/// correlation state. Request submission is synchronous up to the write;
/// completion arrives through the returned [`ResponseHandle`].
pub struct Session {
    shared: Arc<Shared>,
    supervisor: Option<Supervisor>,
}

impl Session {
    /// Launch the backend and establish both channels.
    ///
    /// Binds fresh per-session socket paths, spawns the backend with those
    /// paths on its command line, then waits (bounded by
    /// `config.connect_timeout`) for it to dial in on both. The backend
    /// connects the request channel first, then the event channel.
    pub fn launch(config: SessionConfig) -> Result<Self> {
        let channels = SessionChannels::generate(&config.pipe_dir);
        let request_endpoint = PipeEndpoint::bind(&channels.request)?;
        let event_endpoint = PipeEndpoint::bind(&channels.event)?;

        let supervisor =
            Supervisor::launch(&config.backend_program, &config.backend_args, &channels)?;

        let outbound = match request_endpoint.accept_peer_timeout(config.connect_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                supervisor.stop(Duration::ZERO);
                return Err(err.into());
            }
        };
        let inbound = match event_endpoint.accept_peer_timeout(config.connect_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                supervisor.stop(Duration::ZERO);
                return Err(err.into());
            }
        };

        if let Some((uid, gid, pid)) = outbound.peer_credentials() {
            debug!(uid, gid, pid, "backend peer connected");
        }

        Self::wire_up(inbound, outbound, config, Some(supervisor))
    }

    /// Assemble a session around already-connected streams.
    ///
    /// `launch` goes through here after accepting the backend; tests go
    /// through here directly with a loopback pair.
    fn wire_up(
        inbound: IpcStream,
        outbound: IpcStream,
        config: SessionConfig,
        supervisor: Option<Supervisor>,
    ) -> Result<Self> {
        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: Some(READ_TICK),
            write_timeout: None,
        };

        let reader = FrameReader::with_config_ipc(inbound.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_ipc(outbound, frame_config)?;

        let shared = Arc::new(Shared {
            table: Arc::new(CorrelationTable::new(config.response_timeout)),
            readiness: ReadinessAggregator::new(),
            router: EventRouter::new(config.event_backlog),
            writer: Mutex::new(Some(writer)),
            inbound,
            closed: AtomicBool::new(false),
        });

        shared
            .readiness
            .set_transport_connected(true, Some("both channels connected"));

        let loop_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("lanlink-reader".to_string())
            .spawn(move || read_loop(loop_shared, reader))
            .map_err(|source| {
                SessionError::Transport(lanlink_transport::TransportError::Io(source))
            })?;

        if let Some(supervisor) = &supervisor {
            let exit_shared = Arc::clone(&shared);
            supervisor.watch(move |status| {
                exit_shared.teardown(&format!("backend exited: {status}"));
            });
        }

        Ok(Self { shared, supervisor })
    }

    /// Submit a correlated request.
    ///
    /// Serializes the envelope with a fresh identifier and writes it to the
    /// request channel. A write failure tears the session down and fails
    /// the request immediately; otherwise completion (response, timeout or
    /// transport loss) is delivered through the handle.
    pub fn send(&self, operation: OperationType, data: Value) -> Result<ResponseHandle> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(SessionError::closed("session is shut down"));
        }

        let (msg_id, handle) = shared.table.register(operation);
        let envelope = RequestEnvelope::new(operation, data, msg_id);

        let mut guard = shared.writer.lock().unwrap();
        let Some(writer) = guard.as_mut() else {
            shared.table.discard(msg_id);
            return Err(SessionError::closed("request channel is closed"));
        };

        match writer.send_json(&envelope) {
            Ok(()) => {
                debug!(%operation, msg_id, "request sent");
                Ok(handle)
            }
            Err(err) => {
                shared.table.discard(msg_id);
                drop(guard);
                shared.teardown(&format!("request write failed: {err}"));
                Err(err.into())
            }
        }
    }

    /// Send a set of files to one or more devices.
    pub fn send_files(
        &self,
        target_devices: Vec<String>,
        files: Vec<PathBuf>,
    ) -> Result<ResponseHandle> {
        let body = SendFilesRequest {
            target_devices,
            files,
        };
        self.send(OperationType::SendFile, serde_json::to_value(body)?)
    }

    /// Stop waiting for the recipient's accept/decline decision.
    pub fn cancel_wait_for_confirmation(&self, transfer_id: impl Into<String>) -> Result<ResponseHandle> {
        self.transfer_action(OperationType::CancelWaitForConfirmation, transfer_id)
    }

    /// Cancel an outbound transfer in progress.
    pub fn cancel_send(&self, transfer_id: impl Into<String>) -> Result<ResponseHandle> {
        self.transfer_action(OperationType::CancelSend, transfer_id)
    }

    /// Cancel an inbound transfer in progress.
    pub fn cancel_receive(&self, transfer_id: impl Into<String>) -> Result<ResponseHandle> {
        self.transfer_action(OperationType::CancelReceive, transfer_id)
    }

    fn transfer_action(
        &self,
        operation: OperationType,
        transfer_id: impl Into<String>,
    ) -> Result<ResponseHandle> {
        let body = TransferActionRequest {
            transfer_id: transfer_id.into(),
        };
        self.send(operation, serde_json::to_value(body)?)
    }

    /// Accept or decline an inbound transfer request.
    pub fn confirm_receive(
        &self,
        transfer_id: impl Into<String>,
        accept: bool,
        accepted_files: Option<Vec<String>>,
    ) -> Result<ResponseHandle> {
        let body = ConfirmReceiveRequest {
            transfer_id: transfer_id.into(),
            accept,
            accepted_files,
        };
        self.send(OperationType::ConfirmReceive, serde_json::to_value(body)?)
    }

    /// Update persisted backend settings.
    pub fn modify_settings(&self, settings: Value) -> Result<ResponseHandle> {
        let body = ModifySettingsRequest { settings };
        self.send(OperationType::ModifySettings, serde_json::to_value(body)?)
    }

    /// Initiate a device connection with a pairing code.
    pub fn connect_to_device(
        &self,
        device_id: impl Into<String>,
        pin_code: impl Into<String>,
    ) -> Result<ResponseHandle> {
        let body = ConnectToDeviceRequest {
            device_id: device_id.into(),
            pin_code: pin_code.into(),
        };
        self.send(OperationType::ConnectToDevice, serde_json::to_value(body)?)
    }

    /// Ask the backend to shut down, waiting for its acknowledgement.
    pub fn exit_app(&self) -> Result<ResponseHandle> {
        self.send(OperationType::ExitApp, Value::Null)
    }

    /// Receiver for unsolicited backend events.
    ///
    /// Events that arrived before this call are replayed first, in order.
    pub fn events(&self) -> mpsc::Receiver<EventEnvelope> {
        self.shared.router.subscribe()
    }

    /// Receiver for changes of the combined readiness boolean.
    pub fn readiness_changes(&self) -> mpsc::Receiver<ReadinessChange> {
        self.shared.readiness.subscribe()
    }

    /// Record whether the consumer is ready to handle events.
    pub fn mark_consumer_ready(&self, ready: bool) {
        self.shared.readiness.set_consumer_ready(ready);
    }

    /// Current combined readiness.
    pub fn is_ready(&self) -> bool {
        self.shared.readiness.is_ready()
    }

    /// True once the transport has been torn down (backend exit, pipe
    /// fault or shutdown). A closed session never becomes usable again.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Process id of the supervised backend, if one is attached.
    pub fn backend_pid(&self) -> Option<u32> {
        self.supervisor.as_ref().map(Supervisor::pid)
    }

    /// Shut the session down.
    ///
    /// Sends a fire-and-forget `ExitApp`, gives the backend a short grace
    /// period, kills it if it lingers, then tears down the transport and
    /// fails anything still outstanding.
    pub fn shutdown(self) {
        if !self.shared.closed.load(Ordering::SeqCst) {
            let msg_id = self.shared.table.allocate_id();
            let envelope = RequestEnvelope::new(OperationType::ExitApp, Value::Null, msg_id);
            if let Some(writer) = self.shared.writer.lock().unwrap().as_mut() {
                if let Err(err) = writer.send_json(&envelope) {
                    debug!(error = %err, "exit request not delivered");
                }
            }
        }

        if let Some(supervisor) = &self.supervisor {
            supervisor.stop(SHUTDOWN_GRACE);
        }
        self.shared.teardown("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.teardown("session dropped");
        if let Some(supervisor) = &self.supervisor {
            supervisor.stop(Duration::ZERO);
        }
    }
}

/// Drains the event channel until the transport dies.
///
/// Every decoded envelope is classified and routed; per-frame decode
/// errors are logged and skipped. The read timeout doubles as a tick for
/// sweeping requests whose handles were dropped before their deadline.
fn read_loop(shared: Arc<Shared>, mut reader: FrameReader<IpcStream>) {
    loop {
        shared.table.expire_overdue();

        let value = match reader.read_envelope() {
            Ok(value) => value,
            Err(err) if err.is_per_frame() => {
                warn!(error = %err, "skipping undecodable frame");
                continue;
            }
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                // Idle tick; nothing arrived within the read timeout.
                continue;
            }
            Err(err) => {
                shared.teardown(&format!("event channel failed: {err}"));
                return;
            }
        };

        match InboundMessage::classify(value) {
            InboundMessage::BackendStarted => {
                info!("backend reported initialization complete");
                shared
                    .readiness
                    .set_backend_initialized(true, Some("backend started"));
            }
            InboundMessage::LogMessage { level, message } => match level.as_deref() {
                Some("error") | Some("warn") => warn!(backend = true, "{message}"),
                _ => debug!(backend = true, "{message}"),
            },
            InboundMessage::Response { msg_id, data } => {
                shared.table.resolve(msg_id, data);
            }
            InboundMessage::Event(event) => {
                debug!(feedback = %event.feedback, "event received");
                shared.router.dispatch(event);
            }
            InboundMessage::Malformed(value) => {
                warn!(%value, "dropping unclassifiable inbound frame");
            }
        }
    }
}
