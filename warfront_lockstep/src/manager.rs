// Connection management for a lockstep game session.
//
// Architecture: thread-per-session blocking I/O with shared state.
//
// - **Accept thread** (host role only): polls a non-blocking
//   `TcpListener::accept()` against the shutdown flag. Each accepted
//   connection is seated from the slot table, greeted with
//   `Welcome` + `SlotAssign` + an occupancy snapshot, and handed a reader
//   thread.
// - **Reader threads** (one per session): block in `read_message()`,
//   route decoded messages into the input ledger / slot mirror / chat sink,
//   and — on the host — relay input, ack, and chat traffic to every other
//   session so each message reaches every peer exactly once.
// - **No event thread**: the slot table and input ledger are mutex-guarded
//   and shared with the synchronization engine, which runs on whatever
//   thread drives the game's fixed-rate tick. Critical sections only touch
//   the index; commands are executed on a batch copied out of the lock.
//
// Lock discipline: the sessions list may be held while taking the slot
// table (seat changes broadcast atomically with their table mutation), never
// the other way around. The ledger never nests with the sessions list.
//
// Shutdown: flip `keep_running`, release every seat, and shut every socket
// down — the OS-level shutdown is what unblocks readers parked in
// `read_exact`. Safe to call concurrently with in-flight accepts: the
// accept thread re-checks the flag on every poll.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use warfront_protocol::{
    MAX_PLAYERS, NetMessage, PlayerNumber, SessionId, SlotState, read_message,
};

use crate::error::{NetError, NetResult};
use crate::ledger::InputLedger;
use crate::lock;
use crate::session::Session;
use crate::slot::SlotTable;

/// How often the accept thread re-checks the shutdown flag while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Configuration for hosting a game session.
pub struct HostConfig {
    /// Address to listen on. Port 0 lets the OS pick a free port.
    pub bind_addr: String,
    /// Greeting text sent to every accepted connection.
    pub motd: String,
    /// Take the lowest open seat for the local player at startup. Disable
    /// for a dedicated (non-playing) host.
    pub claim_seat: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".into(),
            motd: "Welcome to the server!".into(),
            claim_seat: true,
        }
    }
}

/// Configuration for joining a hosted session.
pub struct JoinConfig {
    /// Host address, e.g. "192.168.0.10:7878".
    pub addr: String,
    /// How long to wait for the host's `Welcome`/`SlotAssign` answer.
    pub handshake_timeout: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7878".into(),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a successful join handshake.
#[derive(Clone, Debug)]
pub struct JoinInfo {
    /// The seat the host assigned to this peer.
    pub seat: PlayerNumber,
    /// The host's greeting text.
    pub motd: String,
}

/// One line of chat delivered to the embedding game's sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
    pub player: PlayerNumber,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Host,
    Join,
}

/// Owns every live session of one game, in either role. Constructed once
/// per game session; collaborators receive it by reference.
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("role", &self.inner.role)
            .field("local_seat", &self.inner.local_seat)
            .field("local_addr", &self.inner.local_addr)
            .finish_non_exhaustive()
    }
}

struct ManagerInner {
    role: Role,
    keep_running: AtomicBool,
    sessions: Mutex<Vec<Arc<Session>>>,
    slots: Arc<Mutex<SlotTable>>,
    ledger: Arc<Mutex<InputLedger>>,
    chat_tx: Sender<ChatLine>,
    motd: String,
    local_seat: Option<PlayerNumber>,
    local_addr: Option<SocketAddr>,
    next_session_id: AtomicU64,
}

impl ConnectionManager {
    /// Bind a listener and start accepting connections. Returns the manager
    /// and the receiving end of the chat sink.
    pub fn host(
        config: HostConfig,
        slots: Arc<Mutex<SlotTable>>,
        ledger: Arc<Mutex<InputLedger>>,
    ) -> NetResult<(Self, Receiver<ChatLine>)> {
        let listener = TcpListener::bind(&config.bind_addr).map_err(NetError::Bind)?;
        let local_addr = listener.local_addr().map_err(NetError::Bind)?;
        listener.set_nonblocking(true).map_err(NetError::Bind)?;

        let local_seat = if config.claim_seat {
            let seat = lock(&slots).assign_first_open(None);
            if seat.is_none() {
                warn!("could not claim a local seat: no open slot");
            }
            seat
        } else {
            None
        };

        let (chat_tx, chat_rx) = mpsc::channel();
        let inner = Arc::new(ManagerInner {
            role: Role::Host,
            keep_running: AtomicBool::new(true),
            sessions: Mutex::new(Vec::new()),
            slots,
            ledger,
            chat_tx,
            motd: config.motd,
            local_seat,
            local_addr: Some(local_addr),
            next_session_id: AtomicU64::new(1),
        });

        let accept_inner = inner.clone();
        let accept_thread = thread::spawn(move || accept_loop(&listener, &accept_inner));
        info!("hosting on {local_addr}");

        Ok((
            Self {
                inner,
                accept_thread: Some(accept_thread),
            },
            chat_rx,
        ))
    }

    /// Open one outbound session to a host and perform the seat handshake.
    /// No slot assignment happens locally — the host's `SlotAssign` is
    /// authoritative, and subsequent `SlotUpdate` broadcasts keep the local
    /// slot table mirroring the host's occupancy.
    pub fn join(
        config: JoinConfig,
        slots: Arc<Mutex<SlotTable>>,
        ledger: Arc<Mutex<InputLedger>>,
    ) -> NetResult<(Self, JoinInfo, Receiver<ChatLine>)> {
        let stream = TcpStream::connect(&config.addr).map_err(NetError::Connect)?;
        let session = Arc::new(Session::new(SessionId(0), stream).map_err(NetError::Connect)?);
        session
            .set_read_timeout(Some(config.handshake_timeout))
            .map_err(NetError::Connect)?;
        let mut reader = session.reader().map_err(NetError::Connect)?;

        let motd = match read_message(&mut reader)? {
            NetMessage::Welcome { motd } => motd,
            NetMessage::Rejected { reason } => return Err(NetError::Rejected(reason)),
            other => {
                return Err(NetError::Handshake {
                    expected: "Welcome",
                    got: format!("{other:?}"),
                });
            }
        };
        let seat = match read_message(&mut reader)? {
            NetMessage::SlotAssign { slot } => slot,
            other => {
                return Err(NetError::Handshake {
                    expected: "SlotAssign",
                    got: format!("{other:?}"),
                });
            }
        };
        session.set_read_timeout(None).map_err(NetError::Connect)?;
        session.set_slot(Some(seat));
        lock(&slots).apply_wire_state(seat, SlotState::Taken);

        let (chat_tx, chat_rx) = mpsc::channel();
        let inner = Arc::new(ManagerInner {
            role: Role::Join,
            keep_running: AtomicBool::new(true),
            sessions: Mutex::new(vec![session.clone()]),
            slots,
            ledger,
            chat_tx,
            motd: String::new(),
            local_seat: Some(seat),
            local_addr: None,
            next_session_id: AtomicU64::new(1),
        });

        let reader_inner = inner.clone();
        thread::spawn(move || reader_loop(&reader_inner, &session, reader));
        info!("joined {} as {seat}", config.addr);

        Ok((
            Self {
                inner,
                accept_thread: None,
            },
            JoinInfo { seat, motd },
            chat_rx,
        ))
    }

    /// Send a message to every live session. A write failure on one session
    /// is logged and skipped — it never aborts delivery to the others.
    pub fn broadcast(&self, msg: &NetMessage) {
        let sessions = lock(&self.inner.sessions);
        broadcast_to(&sessions, None, msg);
    }

    /// Send a chat line from the local player to all peers.
    pub fn send_chat(&self, text: &str) -> NetResult<()> {
        let player = self.inner.local_seat.ok_or(NetError::NoSeat)?;
        self.broadcast(&NetMessage::Chat {
            player,
            text: text.into(),
        });
        Ok(())
    }

    /// The listener address (host role only). Useful with port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    /// The local player's seat: claimed at startup (host) or assigned by
    /// the handshake (join). `None` for a dedicated host.
    #[must_use]
    pub fn local_seat(&self) -> Option<PlayerNumber> {
        self.inner.local_seat
    }

    /// False once shut down, or — in the join role — once the connection to
    /// the host has been lost.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.keep_running.load(Ordering::SeqCst)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    /// Close every session, release every seat, stop accepting. Idempotent,
    /// and safe to call while accepts and reads are in flight.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Shut down and consume the manager. The accept thread is joined in
    /// `Drop`.
    pub fn stop(self) {
        self.inner.shutdown();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.shutdown();
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
    }
}

impl ManagerInner {
    fn shutdown(&self) {
        if !self.keep_running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("shutting down connection manager");
        let drained: Vec<Arc<Session>> = lock(&self.sessions).drain(..).collect();
        for session in &drained {
            if self.role == Role::Host
                && let Some(seat) = session.slot()
            {
                lock(&self.slots).release(seat);
            }
            session.close();
        }
    }

    /// Host role: forward a message to every session except its origin.
    /// The origin recorded its own traffic at submit time, so forwarding it
    /// back would double-apply.
    fn relay(&self, origin: SessionId, msg: &NetMessage) {
        if self.role == Role::Host {
            let sessions = lock(&self.sessions);
            broadcast_to(&sessions, Some(origin), msg);
        }
    }
}

fn broadcast_to(sessions: &[Arc<Session>], except: Option<SessionId>, msg: &NetMessage) {
    for session in sessions.iter().filter(|s| Some(s.id()) != except) {
        if let Err(e) = session.send(msg) {
            // The session's reader thread will notice the broken pipe and
            // remove it; delivery to the remaining peers continues.
            warn!("write to {} failed: {e}", session.remote_addr());
        }
    }
}

fn accept_loop(listener: &TcpListener, inner: &Arc<ManagerInner>) {
    while inner.keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("inbound connection from {addr}");
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                handle_accept(inner, stream);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                warn!("accept failed: {e}");
                break;
            }
        }
    }
    debug!("accept loop stopped");
}

/// Seat, greet, and start reading from one accepted connection.
fn handle_accept(inner: &Arc<ManagerInner>, stream: TcpStream) {
    let id = SessionId(inner.next_session_id.fetch_add(1, Ordering::Relaxed));
    let session = match Session::new(id, stream) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!("dropping inbound connection: {e}");
            return;
        }
    };

    let Some(seat) = lock(&inner.slots).assign_first_open(Some(id)) else {
        info!("rejecting {}: server full", session.remote_addr());
        if let Err(e) = session.send(&NetMessage::Rejected {
            reason: "server full".into(),
        }) {
            debug!("could not deliver rejection to {}: {e}", session.remote_addr());
        }
        session.close();
        return;
    };
    session.set_slot(Some(seat));

    if session
        .send(&NetMessage::Welcome {
            motd: inner.motd.clone(),
        })
        .and_then(|()| session.send(&NetMessage::SlotAssign { slot: seat }))
        .is_err()
    {
        warn!("handshake write to {} failed", session.remote_addr());
        lock(&inner.slots).release(seat);
        session.close();
        return;
    }

    // List the session, send it the current occupancy, and announce its
    // seat — all under the sessions lock, so no concurrent seat broadcast
    // can interleave with the snapshot and leave a mirror stale.
    {
        let mut sessions = lock(&inner.sessions);
        let snapshot: Vec<(PlayerNumber, SlotState)> = {
            let slots = lock(&inner.slots);
            (1..=MAX_PLAYERS)
                .map(PlayerNumber)
                .filter(|n| *n != seat)
                .filter_map(|n| slots.wire_state(n).map(|state| (n, state)))
                .filter(|(_, state)| *state != SlotState::Open)
                .collect()
        };
        for (slot, state) in snapshot {
            if let Err(e) = session.send(&NetMessage::SlotUpdate { slot, state }) {
                debug!("occupancy snapshot to {} failed: {e}", session.remote_addr());
                break;
            }
        }
        sessions.push(session.clone());
        broadcast_to(
            &sessions,
            Some(id),
            &NetMessage::SlotUpdate {
                slot: seat,
                state: SlotState::Taken,
            },
        );
    }
    info!("{} connected from {} as {seat}", id.0, session.remote_addr());

    let reader_inner = inner.clone();
    thread::spawn(move || match session.reader() {
        Ok(reader) => reader_loop(&reader_inner, &session, reader),
        Err(e) => {
            warn!("could not clone read half for {}: {e}", session.remote_addr());
            drop_session(&reader_inner, &session);
        }
    });
}

/// Per-session read loop. Decodes and routes until the session dies, then
/// reports it for removal. A malformed frame is dropped without killing the
/// session; only transport-level failures terminate the loop.
fn reader_loop(
    inner: &Arc<ManagerInner>,
    session: &Arc<Session>,
    mut reader: io::BufReader<TcpStream>,
) {
    while inner.keep_running.load(Ordering::SeqCst) {
        match read_message(&mut reader) {
            Ok(msg) => route_message(inner, session, msg),
            Err(e) if e.is_recoverable() => {
                warn!("dropping malformed message from {}: {e}", session.remote_addr());
            }
            Err(e) => {
                debug!("read loop for {} ended: {e}", session.remote_addr());
                break;
            }
        }
    }
    drop_session(inner, session);
}

/// Dispatch one decoded message by kind.
fn route_message(inner: &Arc<ManagerInner>, session: &Arc<Session>, msg: NetMessage) {
    match msg {
        NetMessage::Input(input) => {
            lock(&inner.ledger).record(input.clone());
            inner.relay(session.id(), &NetMessage::Input(input));
        }
        NetMessage::InputNone { player, tick } => {
            lock(&inner.ledger).record_none(player, tick);
            inner.relay(session.id(), &NetMessage::InputNone { player, tick });
        }
        NetMessage::Chat { player, text } => {
            // Best-effort: the game may have dropped its sink receiver.
            let _ = inner.chat_tx.send(ChatLine {
                player,
                text: text.clone(),
            });
            inner.relay(session.id(), &NetMessage::Chat { player, text });
        }
        NetMessage::Welcome { motd } => info!("host says: {motd}"),
        NetMessage::SlotAssign { slot } => {
            // Mid-session reseating is not a thing; the handshake consumed
            // the real assignment. Keep the mirror consistent anyway.
            if inner.role == Role::Join {
                lock(&inner.slots).apply_wire_state(slot, SlotState::Taken);
            }
        }
        NetMessage::SlotUpdate { slot, state } => {
            if inner.role == Role::Join {
                lock(&inner.slots).apply_wire_state(slot, state);
            }
        }
        NetMessage::Rejected { reason } => warn!("host rejected this peer: {reason}"),
    }
}

/// Remove a dead session: delist it, release its seat, and tell the
/// remaining peers. Seat release and the `Open` broadcast happen under the
/// sessions lock so a mirror can never observe them out of order; the slot
/// table mutation itself shares the barrier's lock, so a half-removed seat
/// is never evaluated.
fn drop_session(inner: &Arc<ManagerInner>, session: &Arc<Session>) {
    let mut sessions = lock(&inner.sessions);
    let before = sessions.len();
    sessions.retain(|s| s.id() != session.id());
    if sessions.len() == before {
        // Already torn down by shutdown().
        return;
    }
    session.close();

    match inner.role {
        Role::Host => {
            if let Some(seat) = session.slot() {
                lock(&inner.slots).release(seat);
                info!("{seat} ({}) disconnected, seat released", session.remote_addr());
                broadcast_to(
                    &sessions,
                    None,
                    &NetMessage::SlotUpdate {
                        slot: seat,
                        state: SlotState::Open,
                    },
                );
            } else {
                debug!("unseated session {} disconnected", session.id().0);
            }
        }
        Role::Join => {
            info!("connection to host {} lost", session.remote_addr());
            inner.keep_running.store(false, Ordering::SeqCst);
        }
    }
}
