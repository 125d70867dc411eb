//! Build-process side of the checker protocol.
//!
//! Every call returns a [`PendingReply`] immediately; the caller waits only
//! when it needs the answer. A writer thread owns the worker's stdin and a
//! reader thread owns its stdout, routing each response to its reply slot by
//! sequence number. When the worker goes away every outstanding request is
//! rejected with [`CheckerError::WorkerExited`].

use std::io::{BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use tsz_common::limits::WRITER_CHANNEL_CAPACITY;

use crate::diagnostics::FormattedDiagnostic;
use crate::error::CheckerError;
use crate::file_deps::FileDeps;
use crate::framing::{encode_frame, read_frame};
use crate::protocol::{
    EmitFilePayload, EmitFileResponse, InitPayload, RemoveFilePayload, Request, ResponseEnvelope,
    UpdateFilePayload,
};
use crate::queued_sender::{QueuedSender, SendPolicy};

/// How to launch a checker worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn describe(&self) -> String {
        let mut text = self.program.display().to_string();
        for arg in &self.args {
            text.push(' ');
            text.push_str(arg);
        }
        text
    }

    /// Start the process with piped stdin/stdout. Its stderr is inherited so
    /// worker logs land next to ours.
    pub fn spawn(&self) -> Result<Transport, CheckerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let spawn_error = |source| CheckerError::Spawn {
            command: self.describe(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_error)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("stdout was not captured")))?;
        info!(pid = child.id(), command = %self.describe(), "checker worker started");

        Ok(Transport {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

/// Both ends of a connection to one worker incarnation.
pub struct Transport {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    /// Killed on reset or drop.
    pub child: Option<Child>,
}

/// Produces a fresh transport; called once at start and on every reset.
pub type Connector = Box<dyn Fn() -> Result<Transport, CheckerError> + Send + Sync>;

type ReplySlot = Sender<Result<Value, CheckerError>>;

#[derive(Debug)]
struct PendingTable {
    slots: DashMap<u64, ReplySlot>,
    alive: AtomicBool,
}

impl PendingTable {
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
            alive: AtomicBool::new(true),
        }
    }

    fn register(&self, seq: u64) -> Receiver<Result<Value, CheckerError>> {
        let (tx, rx) = bounded(1);
        self.slots.insert(seq, tx);
        rx
    }

    /// Deliver `result` to the request `seq`. `false` if nobody is waiting.
    fn resolve(&self, seq: u64, result: Result<Value, CheckerError>) -> bool {
        match self.slots.remove(&seq) {
            Some((_, slot)) => {
                let _ = slot.send(result);
                true
            }
            None => false,
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the worker gone and reject everything outstanding.
    fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let seqs: Vec<u64> = self.slots.iter().map(|entry| *entry.key()).collect();
        if !seqs.is_empty() {
            debug!(count = seqs.len(), "rejecting pending checker requests");
        }
        for seq in seqs {
            self.resolve(seq, Err(CheckerError::WorkerExited));
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

fn route_response(pending: &PendingTable, message: &str) {
    let envelope: ResponseEnvelope = match serde_json::from_str(message) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "malformed checker response dropped");
            return;
        }
    };
    let seq = envelope.seq;
    let result = if envelope.success {
        Ok(envelope.payload)
    } else {
        Err(envelope.into_error())
    };
    if !pending.resolve(seq, result) {
        warn!(seq, "checker response for unknown request dropped");
    } else {
        trace!(seq, "checker response routed");
    }
}

struct Connection {
    sender: Arc<QueuedSender>,
    pending: Arc<PendingTable>,
    child: Option<Child>,
}

impl Connection {
    fn open(transport: Transport, policy: SendPolicy) -> Result<Self, CheckerError> {
        let (tx, rx) = bounded::<Vec<u8>>(WRITER_CHANNEL_CAPACITY);
        let sender = Arc::new(QueuedSender::new(tx, policy));
        let pending = Arc::new(PendingTable::new());

        let drained = Arc::downgrade(&sender);
        let writer_pending = Arc::clone(&pending);
        let mut writer = transport.writer;
        thread::Builder::new()
            .name("tsz-checker-writer".to_string())
            .spawn(move || {
                for frame in rx.iter() {
                    if let Err(err) = writer.write_all(&frame).and_then(|()| writer.flush()) {
                        warn!(error = %err, "checker stdin closed");
                        writer_pending.close();
                        break;
                    }
                    match drained.upgrade() {
                        Some(sender) => sender.on_drained(),
                        None => break,
                    }
                }
            })?;

        let reader_pending = Arc::clone(&pending);
        let mut reader = BufReader::new(transport.reader);
        thread::Builder::new()
            .name("tsz-checker-reader".to_string())
            .spawn(move || {
                loop {
                    match read_frame(&mut reader) {
                        Ok(Some(message)) => route_response(&reader_pending, &message),
                        Ok(None) => {
                            info!("checker worker closed its output");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "checker output unreadable");
                            break;
                        }
                    }
                }
                reader_pending.close();
            })?;

        Ok(Self {
            sender,
            pending,
            child: transport.child,
        })
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            if let Err(err) = child.kill() {
                debug!(pid, error = %err, "checker kill failed");
            }
            let _ = child.wait();
            info!(pid, "checker worker stopped");
        }
        self.pending.close();
    }
}

/// Reply handle for one request.
#[must_use = "a pending reply does nothing unless waited on"]
pub struct PendingReply<T> {
    seq: u64,
    rx: Receiver<Result<Value, CheckerError>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> PendingReply<T> {
    fn new(seq: u64, rx: Receiver<Result<Value, CheckerError>>) -> Self {
        Self {
            seq,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// `true` once the answer (or rejection) has arrived.
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until the worker answers or goes away.
    pub fn wait(self) -> Result<T, CheckerError> {
        match self.rx.recv() {
            Ok(Ok(payload)) => Ok(serde_json::from_value(payload)?),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CheckerError::WorkerExited),
        }
    }
}

pub struct CheckerClient {
    connector: Connector,
    policy: SendPolicy,
    next_seq: AtomicU64,
    init: Mutex<Option<InitPayload>>,
    connection: Mutex<Connection>,
}

impl CheckerClient {
    pub fn spawn(command: WorkerCommand, policy: SendPolicy) -> Result<Self, CheckerError> {
        Self::with_connector(Box::new(move || command.spawn()), policy)
    }

    pub fn with_connector(connector: Connector, policy: SendPolicy) -> Result<Self, CheckerError> {
        let connection = Connection::open(connector()?, policy)?;
        Ok(Self {
            connector,
            policy,
            next_seq: AtomicU64::new(1),
            init: Mutex::new(None),
            connection: Mutex::new(connection),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.connection.lock().pending.is_alive()
    }

    /// Requests sent but not answered yet.
    pub fn pending_requests(&self) -> usize {
        self.connection.lock().pending.len()
    }

    pub fn request<T: DeserializeOwned>(&self, request: Request) -> PendingReply<T> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let kind = request.kind();
        let connection = self.connection.lock();
        let rx = connection.pending.register(seq);

        let sent = request
            .into_envelope(seq)
            .and_then(|envelope| serde_json::to_string(&envelope))
            .map_err(CheckerError::from)
            .and_then(|json| connection.sender.send(encode_frame(&json)));
        match sent {
            Err(err) => {
                connection.pending.resolve(seq, Err(err));
            }
            // The reader may have rejected everything between register and
            // send; nothing would answer this one.
            Ok(()) if !connection.pending.is_alive() => {
                connection.pending.resolve(seq, Err(CheckerError::WorkerExited));
            }
            Ok(()) => trace!(seq, ?kind, "checker request sent"),
        }
        PendingReply::new(seq, rx)
    }

    /// Initialize the worker. The payload is kept and replayed after
    /// [`reset`](Self::reset).
    pub fn init(&self, payload: InitPayload) -> PendingReply<()> {
        *self.init.lock() = Some(payload.clone());
        self.request(Request::Init(payload))
    }

    pub fn update_file(&self, file: &Path, text: &str, if_exist_only: bool) -> PendingReply<()> {
        self.request(Request::UpdateFile(UpdateFilePayload {
            file_name: file.to_path_buf(),
            text: text.to_string(),
            if_exist_only,
        }))
    }

    pub fn remove_file(&self, file: &Path) -> PendingReply<()> {
        self.request(Request::RemoveFile(RemoveFilePayload {
            file_name: file.to_path_buf(),
        }))
    }

    pub fn emit_file(&self, file: &Path, text: &str) -> PendingReply<EmitFileResponse> {
        self.request(Request::EmitFile(EmitFilePayload {
            file_name: file.to_path_buf(),
            text: text.to_string(),
        }))
    }

    /// Make `file` known to the worker without emitting it; replies with the
    /// files it depends on.
    pub fn register_file(&self, file: &Path, text: &str) -> PendingReply<FileDeps> {
        self.request(Request::RegisterFile(EmitFilePayload {
            file_name: file.to_path_buf(),
            text: text.to_string(),
        }))
    }

    pub fn diagnostics(&self) -> PendingReply<Vec<FormattedDiagnostic>> {
        self.request(Request::Diagnostics)
    }

    pub fn files(&self) -> PendingReply<Vec<PathBuf>> {
        self.request(Request::Files)
    }

    /// Kill the worker, reject everything outstanding, start a new one and
    /// replay the stored Init.
    pub fn reset(&self) -> Result<(), CheckerError> {
        {
            let mut connection = self.connection.lock();
            connection.shutdown();
            let transport = (self.connector)()?;
            *connection = Connection::open(transport, self.policy)?;
        }
        info!("checker worker reset");

        let init = self.init.lock().clone();
        if let Some(init) = init {
            self.request::<()>(Request::Init(init)).wait()?;
        }
        Ok(())
    }
}

impl Drop for CheckerClient {
    fn drop(&mut self) {
        self.connection.get_mut().shutdown();
    }
}
