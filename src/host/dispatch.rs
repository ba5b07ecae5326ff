//! Host dispatch loop and the [`Link`] handle that controls it.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │  operator thread(s)                                          │
//!  │    Link::enqueue / reconnect / disconnect / diagnostics      │
//!  └───────────────┬──────────────────────────────────────────────┘
//!                  │ Mutex<CommandQueue>, connection request, atomics
//!  ┌───────────────▼──────────────────────────────────────────────┐
//!  │  "coil-link" thread: DispatchLoop::step every poll interval  │
//!  │    1. apply pending open/close                               │
//!  │    2. read ─▶ Reassembler ─▶ decode ─▶ StatusSink::publish   │
//!  │    3. queue ready? ─▶ encode(seq 0..7) ─▶ Transport write    │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are held only to move data in or out; transport I/O always
//! happens with every lock released. A transport failure closes the link
//! and stops I/O until the operator reconnects. Nothing is resent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use log::{debug, error, info};

use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::protocol::{
    ChannelCommandSet, Codec, CurrentScale, ReassemblyEvent, Reassembler, SEQUENCE_MODULUS,
    Transport,
};

use super::diagnostics::{LinkMetrics, LinkStats};
use super::queue::CommandQueue;
use super::status::StatusSink;
use super::thread::spawn_named;

const THREAD_NAME: &str = "coil-link";

// ── Shared state ─────────────────────────────────────────────

#[derive(Debug)]
enum ConnectionRequest {
    Open(String),
    Close,
}

/// State shared between the dispatch thread and the operator side.
#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<CommandQueue>,
    connection: Mutex<Option<ConnectionRequest>>,
    running: AtomicBool,
    connected: AtomicBool,
    stats: LinkStats,
}

impl Shared {
    fn enqueue(&self, set: ChannelCommandSet, flush: bool) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(set, flush);
    }

    fn enqueue_many(&self, sets: Vec<ChannelCommandSet>, flush: bool) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(sets, flush);
    }

    fn queued(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn request(&self, request: ConnectionRequest) {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = Some(request);
    }

    fn take_request(&self) -> Option<ConnectionRequest> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

// ───────────────────────────────────────────────────────────────
// DispatchLoop
// ───────────────────────────────────────────────────────────────

/// The I/O side of the link. Runs on its own thread via [`Link`], or is
/// stepped by hand in tests.
pub struct DispatchLoop<T: Transport, S: StatusSink> {
    transport: T,
    sink: S,
    codec: Codec,
    reassembler: Reassembler,
    /// Sequence number for the next request frame.
    sequence: u8,
    shared: Arc<Shared>,
}

impl<T: Transport, S: StatusSink> DispatchLoop<T, S> {
    pub fn new(transport: T, sink: S, codec: Codec) -> Self {
        let shared = Shared::default();
        shared.connected.store(transport.is_open(), Ordering::Release);
        Self {
            transport,
            sink,
            codec,
            reassembler: Reassembler::new(),
            sequence: 0,
            shared: Arc::new(shared),
        }
    }

    // ── Operator-side conveniences (same effect as via `Link`) ──

    pub fn enqueue(&self, set: ChannelCommandSet, flush: bool) {
        self.shared.enqueue(set, flush);
    }

    /// Ask for `identifier` to be opened on the next step.
    pub fn request_open(&self, identifier: impl Into<String>) {
        self.shared.request(ConnectionRequest::Open(identifier.into()));
    }

    pub fn request_close(&self) {
        self.shared.request(ConnectionRequest::Close);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    pub fn diagnostics(&self) -> LinkMetrics {
        self.shared.stats.snapshot()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Sequence number the next request frame will carry.
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }

    // ── One iteration ────────────────────────────────────────

    /// Run one pass: connection requests, receive, then at most one send.
    pub fn step(&mut self, now: Instant) {
        self.apply_connection_request();
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.receive() {
            self.lose(e);
            return;
        }
        if let Err(e) = self.send(now) {
            self.lose(e);
        }
    }

    fn apply_connection_request(&mut self) {
        match self.shared.take_request() {
            Some(ConnectionRequest::Open(identifier)) => {
                if self.transport.is_open() {
                    self.transport.close();
                }
                self.reassembler.clear();
                match self.transport.open(&identifier) {
                    Ok(()) => {
                        info!("link open on {identifier}");
                        self.set_connected(true);
                    }
                    Err(e) => {
                        error!("cannot open {identifier}: {e}");
                        self.shared.stats.record_failure(e);
                        self.set_connected(false);
                    }
                }
            }
            Some(ConnectionRequest::Close) => {
                self.transport.close();
                self.reassembler.clear();
                info!("link closed by operator");
                self.set_connected(false);
            }
            None => {}
        }
    }

    fn receive(&mut self) -> Result<(), TransportError> {
        if !self.transport.has_pending_data()? {
            return Ok(());
        }
        let bytes = self.transport.read_available()?;
        self.shared.stats.record_read(bytes.len());
        self.reassembler.extend(&bytes);

        while let Some(event) = self.reassembler.next_event() {
            match event {
                ReassemblyEvent::Resynced { discarded } => {
                    debug!("resynchronized, {discarded} bytes discarded");
                    self.shared.stats.record_resync(discarded);
                }
                ReassemblyEvent::Frame(frame) => match self.codec.decode_response(&frame) {
                    Ok(response) => {
                        self.shared.stats.record_frame();
                        self.sink.publish(&response);
                    }
                    Err(e) => {
                        debug!("response dropped: {e}");
                        self.shared.stats.record_malformed();
                    }
                },
            }
        }
        Ok(())
    }

    fn send(&mut self, now: Instant) -> Result<(), TransportError> {
        // Pop under the lock, write after it is released.
        let ready = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_ready(now);
        let Some(set) = ready else {
            return Ok(());
        };

        let frame = self.codec.encode_set(&set, self.sequence);
        let written = self.transport.write_bytes(&frame)?;
        if written < frame.len() {
            debug!("short write: {written} of {} bytes", frame.len());
            return Err(TransportError::Io);
        }
        debug!("sent set {} ({} commands, {} bytes)", self.sequence, set.len(), written);
        self.shared.stats.record_sent(written);
        self.sequence = (self.sequence + 1) % SEQUENCE_MODULUS;
        Ok(())
    }

    fn lose(&mut self, e: TransportError) {
        error!("transport lost: {e}");
        self.shared.stats.record_failure(e);
        self.transport.close();
        self.reassembler.clear();
        self.set_connected(false);
    }

    fn set_connected(&mut self, connected: bool) {
        let was = self.shared.connected.swap(connected, Ordering::AcqRel);
        if was != connected || connected {
            self.sink.connection_changed(connected);
        }
    }

    fn run(mut self, poll_interval: Duration) {
        info!("dispatch loop started");
        while self.shared.running.load(Ordering::Acquire) {
            self.step(Instant::now());
            std::thread::sleep(poll_interval);
        }
        if self.transport.is_open() {
            self.transport.close();
            self.set_connected(false);
        }
        info!("dispatch loop stopped");
    }
}

// ───────────────────────────────────────────────────────────────
// Link handle
// ───────────────────────────────────────────────────────────────

/// Operator-side handle to a running dispatch loop.
///
/// Dropping the handle stops and joins the loop thread.
pub struct Link {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Link {
    /// Move `dispatch` onto its own thread, stepping every `poll_interval`.
    pub fn spawn<T, S>(dispatch: DispatchLoop<T, S>, poll_interval: Duration) -> std::io::Result<Self>
    where
        T: Transport + Send + 'static,
        S: StatusSink + 'static,
    {
        let shared = Arc::clone(&dispatch.shared);
        shared.running.store(true, Ordering::Release);
        let handle = spawn_named(THREAD_NAME, move || dispatch.run(poll_interval))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Build the transport `config` names, start the loop and, if a port
    /// is configured, ask for it to be opened.
    pub fn from_config<S: StatusSink + 'static>(config: &LinkConfig, sink: S) -> anyhow::Result<Self> {
        config.validate().context("invalid link configuration")?;
        let transport = crate::adapters::open_transport(config).context("building transport")?;
        let codec = Codec::new(CurrentScale::new(config.full_scale_milliamp));
        let dispatch = DispatchLoop::new(transport, sink, codec);
        if let Some(port) = &config.port {
            dispatch.request_open(port.clone());
        }
        let link = Self::spawn(dispatch, config.poll_interval()).context("spawning dispatch thread")?;
        Ok(link)
    }

    // ── Commands ─────────────────────────────────────────────

    /// Queue `set`; with `flush` the backlog is dropped first, atomically.
    pub fn enqueue(&self, set: ChannelCommandSet, flush: bool) {
        self.shared.enqueue(set, flush);
    }

    pub fn enqueue_many(&self, sets: Vec<ChannelCommandSet>, flush: bool) {
        self.shared.enqueue_many(sets, flush);
    }

    /// Replace the backlog with a global disable.
    pub fn reset_controller(&self) {
        self.enqueue(ChannelCommandSet::reset(), true);
    }

    /// Replace the backlog with a global poll.
    pub fn poll(&self) {
        self.enqueue(ChannelCommandSet::poll_all(), true);
    }

    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    // ── Connection ───────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// (Re)open the transport on `identifier` from the loop thread.
    pub fn reconnect(&self, identifier: impl Into<String>) {
        self.shared.request(ConnectionRequest::Open(identifier.into()));
    }

    pub fn disconnect(&self) {
        self.shared.request(ConnectionRequest::Close);
    }

    pub fn diagnostics(&self) -> LinkMetrics {
        self.shared.stats.snapshot()
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Stop the loop and wait for its thread to finish.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.shared.running.store(false, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("{THREAD_NAME} thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{e}");
        }
    }
}
