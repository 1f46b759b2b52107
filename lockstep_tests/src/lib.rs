// Test-only peer harness for lockstep integration tests.
//
// Bundles the real pieces one playing peer owns — a `ConnectionManager`, a
// `SyncEngine` over the same shared slot table and ledger, a recording
// command executor, and the chat sink — behind a synchronous, test-friendly
// API. The only test-specific code is the polling wrappers (bounded loops
// around `try_advance`); all networking and synchronization logic uses the
// same code paths as a real game.
//
// See `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use warfront_lockstep::{
    ChatLine, CommandExecutor, ConnectionManager, HostConfig, InputLedger, JoinConfig, NetResult,
    SlotTable, SyncEngine, TickOutcome,
};
use warfront_protocol::{Command, PlayerNumber, UnitId, WorldPos};

/// Overall deadline for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between poll attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executor stub that records every applied command in order.
#[derive(Default)]
pub struct RecordingExecutor {
    pub applied: Vec<Command>,
}

impl CommandExecutor for RecordingExecutor {
    fn apply(&mut self, command: &Command) {
        self.applied.push(command.clone());
    }
}

/// A move command with a distinguishable unit id.
#[must_use]
pub fn move_command(unit: u64) -> Command {
    Command::MoveUnit {
        unit: UnitId(unit),
        target: WorldPos { x: 100.0, y: 200.0 },
    }
}

/// One complete peer: connection manager, engine, executor, chat sink.
pub struct TestPeer {
    pub net: ConnectionManager,
    pub engine: SyncEngine,
    pub executor: RecordingExecutor,
    pub chat: Receiver<ChatLine>,
    pub slots: Arc<Mutex<SlotTable>>,
    pub ledger: Arc<Mutex<InputLedger>>,
}

impl TestPeer {
    /// Host a session on a free localhost port. With `claim_seat` the local
    /// engine plays; without it this is a dedicated (observer) host.
    pub fn host(claim_seat: bool) -> TestPeer {
        let slots = Arc::new(Mutex::new(SlotTable::new()));
        let ledger = Arc::new(Mutex::new(InputLedger::new()));
        let config = HostConfig {
            bind_addr: "127.0.0.1:0".into(),
            claim_seat,
            ..HostConfig::default()
        };
        let (net, chat) = ConnectionManager::host(config, slots.clone(), ledger.clone())
            .expect("TestPeer::host failed");
        let engine = SyncEngine::new(net.local_seat(), slots.clone(), ledger.clone());
        TestPeer {
            net,
            engine,
            executor: RecordingExecutor::default(),
            chat,
            slots,
            ledger,
        }
    }

    /// Join a hosted session, panicking on failure.
    pub fn join(addr: SocketAddr) -> TestPeer {
        Self::try_join(addr).expect("TestPeer::join failed")
    }

    /// Join a hosted session, surfacing handshake errors to the test.
    pub fn try_join(addr: SocketAddr) -> NetResult<TestPeer> {
        let slots = Arc::new(Mutex::new(SlotTable::new()));
        let ledger = Arc::new(Mutex::new(InputLedger::new()));
        let config = JoinConfig {
            addr: addr.to_string(),
            ..JoinConfig::default()
        };
        let (net, info, chat) = ConnectionManager::join(config, slots.clone(), ledger.clone())?;
        let engine = SyncEngine::new(Some(info.seat), slots.clone(), ledger.clone());
        Ok(TestPeer {
            net,
            engine,
            executor: RecordingExecutor::default(),
            chat,
            slots,
            ledger,
        })
    }

    /// The hosting listener address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.net.local_addr().expect("not a hosting peer")
    }

    /// Submit a local command for the current tick.
    pub fn submit(&self, command: Command) {
        self.engine
            .submit_local(command, &self.net)
            .expect("submit_local failed");
    }

    /// One advance attempt.
    pub fn advance(&mut self) -> TickOutcome {
        self.engine.try_advance(&self.net, &mut self.executor)
    }

    /// Keep attempting until the engine reaches `target`, panicking after
    /// the poll timeout. Only usable when the other peers' input is already
    /// in flight — a genuinely stalled barrier makes this panic, which is
    /// the point.
    pub fn pump_to_tick(&mut self, target: u64) {
        let start = Instant::now();
        while self.engine.sim_tick().0 < target {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out pumping to tick {target}, stuck at {}",
                self.engine.sim_tick()
            );
            if self.advance() == TickOutcome::Waiting {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Commands applied so far, in execution order.
    #[must_use]
    pub fn applied(&self) -> &[Command] {
        &self.executor.applied
    }
}

/// Block until a peer's slot table shows exactly `seats` occupied, the way
/// a real game holds in the lobby until the roster settles. Join-side
/// mirrors converge asynchronously via `SlotUpdate`.
pub fn wait_for_roster(peer: &TestPeer, seats: &[u8]) {
    let expected: Vec<PlayerNumber> = seats.iter().copied().map(PlayerNumber).collect();
    let start = Instant::now();
    while peer.slots.lock().unwrap().occupied() != expected {
        assert!(
            start.elapsed() < POLL_TIMEOUT,
            "roster never converged to {expected:?}"
        );
        thread::sleep(POLL_INTERVAL);
    }
}

/// Round-robin advance a set of interdependent peers until every engine
/// reaches `target`. Lockstep peers gate on each other's acks, so pumping
/// them one at a time would deadlock the test.
pub fn pump_all_to_tick(peers: &mut [&mut TestPeer], target: u64) {
    let start = Instant::now();
    while !peers.iter().all(|p| p.engine.sim_tick().0 >= target) {
        assert!(
            start.elapsed() < POLL_TIMEOUT,
            "timed out pumping peers to tick {target}"
        );
        let mut any_advanced = false;
        for peer in peers.iter_mut() {
            if peer.engine.sim_tick().0 < target && peer.advance() == TickOutcome::Advanced {
                any_advanced = true;
            }
        }
        if !any_advanced {
            thread::sleep(POLL_INTERVAL);
        }
    }
}
