//! Connection state machine and the workers that move raw bytes
//!
//! The manager owns at most one worker at a time: a listener blocked on
//! accept, a connector blocked on dial, or a transfer worker pumping the
//! byte stream. Entering any state first cancels whatever ran before, so
//! the at-most-one-active invariant holds by construction. Cancellation
//! closes the worker's stream out from under it; a worker that unblocks
//! this way swallows the error, while a genuine failure is reported as an
//! event. Everything the workers share - the state enum and the active
//! worker slot - sits behind one mutex taken around state transitions.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::FrameBuffer;
use crate::transport::Transport;

/// Where the link currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    None,
    Listening,
    Connecting,
    Connected,
}

/// Which side initiated the connection: Master dialed out, Slave accepted.
/// Higher layers use this to break symmetry in the start handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

/// Notifications from the link layer, delivered in order on one channel
#[derive(Debug)]
pub enum LinkEvent {
    Connected {
        role: Role,
    },
    /// A listen or dial attempt failed; the manager is back at `None`
    ConnectFailed {
        reason: String,
    },
    /// The live link died. `undelivered` carries the frame whose write
    /// failed, if any, so the session can replay it after reconnecting.
    ConnectionLost {
        reason: String,
        undelivered: Option<Vec<u8>>,
    },
    /// One complete inbound frame
    Frame(Vec<u8>),
}

struct Worker {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl Worker {
    /// Flag the cancellation first so the worker can tell an intentional
    /// teardown from a genuine failure, then abort to close its stream.
    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

#[derive(Default)]
struct LinkCore {
    state: LinkState,
    role: Option<Role>,
    peer: Option<String>,
    worker: Option<Worker>,
    outbound: Option<UnboundedSender<Vec<u8>>>,
}

struct Inner<T: Transport> {
    transport: T,
    runtime: Handle,
    events: Sender<LinkEvent>,
    core: Mutex<LinkCore>,
}

impl<T: Transport> Inner<T> {
    fn core(&self) -> MutexGuard<'_, LinkCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Promote a freshly established stream to the transfer worker. The
    /// calling listener/connector task ends right after this, so its own
    /// handle is simply replaced, never aborted.
    fn attach(inner: &Arc<Self>, stream: T::Stream, role: Role, flag: &AtomicBool) {
        let mut core = inner.core();
        if flag.load(Ordering::SeqCst) {
            debug!("connection established after cancellation, dropping stream");
            return;
        }
        let (out_tx, out_rx) = unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = inner.runtime.spawn(Self::transfer_loop(
            inner.clone(),
            stream,
            out_rx,
            cancelled.clone(),
        ));
        core.worker = Some(Worker { handle, cancelled });
        core.outbound = Some(out_tx);
        core.state = LinkState::Connected;
        core.role = Some(role);
        drop(core);
        info!(?role, "link connected");
        let _ = inner.events.send(LinkEvent::Connected { role });
    }

    /// A listener or connector came back with an error
    fn worker_failed(&self, stage: &str, err: io::Error, flag: &AtomicBool) {
        if flag.load(Ordering::SeqCst) {
            debug!(stage, "worker cancelled");
            return;
        }
        let mut core = self.core();
        core.worker = None;
        core.outbound = None;
        core.role = None;
        core.state = LinkState::None;
        drop(core);
        warn!(stage, error = %err, "connection attempt failed");
        let _ = self
            .events
            .send(LinkEvent::ConnectFailed {
                reason: format!("{stage}: {err}"),
            });
    }

    /// The live link died underneath the transfer worker
    fn lost(&self, reason: String, undelivered: Option<Vec<u8>>) {
        let mut core = self.core();
        if core.state != LinkState::Connected {
            return;
        }
        core.worker = None;
        core.outbound = None;
        core.role = None;
        core.state = LinkState::None;
        drop(core);
        warn!(%reason, "link lost");
        let _ = self
            .events
            .send(LinkEvent::ConnectionLost { reason, undelivered });
    }

    /// Pump the stream: one read loop feeding the frame reassembler, one
    /// outbound queue with at most a single write in flight.
    async fn transfer_loop(
        inner: Arc<Self>,
        stream: T::Stream,
        mut out_rx: UnboundedReceiver<Vec<u8>>,
        cancelled: Arc<AtomicBool>,
    ) {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut frames = FrameBuffer::new();
        let mut buf = [0u8; 512];
        let failure = loop {
            tokio::select! {
                outbound = out_rx.recv() => match outbound {
                    Some(frame) => {
                        if let Err(err) = writer.write_all(&frame).await {
                            break Some((format!("write: {err}"), Some(frame)));
                        }
                    }
                    // The manager tore the outbound channel down
                    None => break None,
                },
                read = reader.read(&mut buf) => match read {
                    Ok(0) => break Some(("peer closed the stream".to_string(), None)),
                    Ok(n) => {
                        frames.extend(&buf[..n]);
                        while let Some(frame) = frames.next_frame() {
                            if inner.events.send(LinkEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => break Some((format!("read: {err}"), None)),
                },
            }
        };
        let Some((reason, undelivered)) = failure else {
            return;
        };
        if cancelled.load(Ordering::SeqCst) {
            debug!("transfer worker cancelled");
            return;
        }
        inner.lost(reason, undelivered);
    }
}

/// The connection manager: `None -> Listening -> Connected`,
/// `None -> Connecting -> Connected`, and back to `None` on stop or
/// failure. Construct one per session and drive it from the session owner;
/// workers run on the provided runtime handle and report back over the
/// returned event channel.
pub struct ConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, runtime: Handle) -> (Self, Receiver<LinkEvent>) {
        let (events, events_rx) = channel();
        let manager = Self {
            inner: Arc::new(Inner {
                transport,
                runtime,
                events,
                core: Mutex::new(LinkCore::default()),
            }),
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> LinkState {
        self.inner.core().state
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.core().role
    }

    /// Address of the last dial target, if any
    pub fn peer(&self) -> Option<String> {
        self.inner.core().peer.clone()
    }

    /// Advertise availability and wait for a peer. Cancels any running
    /// worker; safe to call from any state.
    pub fn start(&self) {
        let mut core = self.inner.core();
        if let Some(worker) = core.worker.take() {
            worker.cancel();
        }
        core.outbound = None;
        core.role = None;
        core.state = LinkState::Listening;

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let inner = self.inner.clone();
        let handle = self.inner.runtime.spawn(async move {
            match inner.transport.listen().await {
                Ok(stream) => Inner::attach(&inner, stream, Role::Slave, &flag),
                Err(err) => inner.worker_failed("accept", err, &flag),
            }
        });
        core.worker = Some(Worker { handle, cancelled });
        info!("link listening");
    }

    /// Dial out to a peer. Meaningful from `None` or `Listening` (an
    /// in-flight dial is cancelled and restarted); ignored while connected.
    pub fn connect(&self, address: &str) -> bool {
        let mut core = self.inner.core();
        if core.state == LinkState::Connected {
            warn!(address, "connect ignored while connected");
            return false;
        }
        if let Some(worker) = core.worker.take() {
            worker.cancel();
        }
        core.outbound = None;
        core.role = None;
        core.state = LinkState::Connecting;
        core.peer = Some(address.to_string());

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let inner = self.inner.clone();
        let address = address.to_string();
        let handle = self.inner.runtime.spawn(async move {
            match inner.transport.connect(&address).await {
                Ok(stream) => Inner::attach(&inner, stream, Role::Master, &flag),
                Err(err) => inner.worker_failed("connect", err, &flag),
            }
        });
        core.worker = Some(Worker { handle, cancelled });
        info!(peer = %core.peer.as_deref().unwrap_or_default(), "link connecting");
        true
    }

    /// Tear everything down. Unconditionally idempotent.
    pub fn stop(&self) {
        let mut core = self.inner.core();
        if let Some(worker) = core.worker.take() {
            worker.cancel();
        }
        core.outbound = None;
        core.role = None;
        core.state = LinkState::None;
        info!("link stopped");
    }

    /// Queue one frame for transmission. False when not connected or the
    /// transfer worker is already gone.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        let core = self.inner.core();
        match (core.state, &core.outbound) {
            (LinkState::Connected, Some(tx)) => tx.send(frame).is_ok(),
            _ => false,
        }
    }
}
