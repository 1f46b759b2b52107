// The tick-barrier state machine driving lockstep advancement.
//
// Every peer runs one `SyncEngine` over the same shared slot table and
// input ledger its connection manager writes into. Once per fixed-rate
// invocation the engine re-evaluates the barrier for the previous tick: for
// every occupied seat there must be at least one record (command or
// no-input ack). Open and closed seats are exempt — nobody owes input from
// a seat nobody occupies, which is also what lets a disconnect unblock a
// stalled barrier the moment the seat is released.
//
// On a satisfied barrier the engine applies the previous tick's commands
// grouped by ascending player number, in arrival order within each player.
// Every peer sees the same per-player arrival order (one TCP stream per
// origin, relayed in order), so every peer applies the identical sequence —
// lockstep consistency without a central authority.
//
// The one-tick lag (execute `T-1` while labeling new input `T`) is the
// latency buffer that lets command transmission complete before the
// commands are needed. The no-input ack emitted on each advance is labeled
// with the tick being entered, pre-paying the next barrier for peers even
// when the local player does nothing.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use warfront_protocol::{Command, NetMessage, PlayerInput, PlayerNumber, SimTick};

use crate::error::{NetError, NetResult};
use crate::ledger::InputLedger;
use crate::lock;
use crate::manager::ConnectionManager;
use crate::slot::SlotTable;

/// Applies one decoded command to world state. Assumed deterministic;
/// invoked only from `SyncEngine::try_advance`, never concurrently.
pub trait CommandExecutor {
    fn apply(&mut self, command: &Command);
}

/// Engine state, observable by the UI layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Idle until the next barrier check.
    Advancing,
    /// The last barrier check failed; the sim is holding for a peer.
    WaitingForInput,
}

/// Result of one advance attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Commands applied (if any) and the tick counter incremented.
    Advanced,
    /// Barrier not satisfied; nothing executed, nothing incremented.
    Waiting,
}

/// The tick-barrier state machine. One per peer per game session.
pub struct SyncEngine {
    seat: Option<PlayerNumber>,
    sim_tick: SimTick,
    state: EngineState,
    waiting_since: Option<Instant>,
    slots: Arc<Mutex<SlotTable>>,
    ledger: Arc<Mutex<InputLedger>>,
}

impl SyncEngine {
    /// `seat` is the local player's seat, or `None` for an observer or
    /// dedicated host — a seatless engine runs the barrier but emits no
    /// acks and cannot submit input.
    #[must_use]
    pub fn new(
        seat: Option<PlayerNumber>,
        slots: Arc<Mutex<SlotTable>>,
        ledger: Arc<Mutex<InputLedger>>,
    ) -> Self {
        SyncEngine {
            seat,
            sim_tick: SimTick(0),
            state: EngineState::Advancing,
            waiting_since: None,
            slots,
            ledger,
        }
    }

    #[must_use]
    pub fn sim_tick(&self) -> SimTick {
        self.sim_tick
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// How long the engine has been continuously stalled, or `None` while
    /// advancing. The UI surfaces this as "waiting for player" past a
    /// threshold of its choosing.
    #[must_use]
    pub fn waiting_for(&self) -> Option<Duration> {
        self.waiting_since.map(|since| since.elapsed())
    }

    /// Wrap a local player action for the *current* tick, record it in the
    /// local ledger, and transmit it to all peers.
    pub fn submit_local(&self, command: Command, net: &ConnectionManager) -> NetResult<()> {
        let player = self.seat.ok_or(NetError::NoSeat)?;
        let input = PlayerInput {
            player,
            tick: self.sim_tick,
            command,
        };
        lock(&self.ledger).record(input.clone());
        net.broadcast(&NetMessage::Input(input));
        Ok(())
    }

    /// Attempt one tick. Call at the configured tick rate (see `TickTimer`).
    ///
    /// Re-entrant by design: the barrier is re-evaluated on every call, so a
    /// stalled engine picks up the moment the missing input (or the seat
    /// release) lands.
    pub fn try_advance(
        &mut self,
        net: &ConnectionManager,
        executor: &mut dyn CommandExecutor,
    ) -> TickOutcome {
        self.state = EngineState::WaitingForInput;

        // Tick 0 is the trivial base case: there is nothing to execute
        // before the game starts.
        if let Some(prev) = self.sim_tick.previous() {
            let batch = {
                let slots = lock(&self.slots);
                let ledger = lock(&self.ledger);
                let occupied = slots.occupied();
                if !occupied.iter().all(|p| ledger.exists(*p, prev)) {
                    None
                } else {
                    // Canonical order: ascending player number, arrival
                    // order within a player. Identical on every peer.
                    let mut batch = Vec::new();
                    for player in occupied {
                        batch.extend_from_slice(ledger.query(player, prev));
                    }
                    Some(batch)
                }
            };
            let Some(batch) = batch else {
                if self.waiting_since.is_none() {
                    self.waiting_since = Some(Instant::now());
                    debug!("barrier not satisfied for {prev}, holding");
                }
                return TickOutcome::Waiting;
            };
            // Locks are released before user code runs: an executor is free
            // to call back into submit_local.
            for input in &batch {
                executor.apply(&input.command);
            }
        }

        // Announce "nothing from me" for the tick being entered, so peers
        // can pass their next barrier even if the local player does nothing
        // this tick. Real commands for this tick arrive via submit_local.
        if let Some(player) = self.seat {
            lock(&self.ledger).record_none(player, self.sim_tick);
            net.broadcast(&NetMessage::InputNone {
                player,
                tick: self.sim_tick,
            });
        }

        self.sim_tick = self.sim_tick.next();
        if let Some(threshold) = self.sim_tick.previous() {
            // Everything below the new barrier tick is fully consumed.
            lock(&self.ledger).prune(threshold);
        }
        self.state = EngineState::Advancing;
        self.waiting_since = None;
        TickOutcome::Advanced
    }
}

/// Wall-clock gate for the tick driver: fires at most once per period,
/// measured from the last attempt — successful or not — so a stalled
/// barrier is re-polled at the tick rate rather than as fast as the game
/// loop spins.
pub struct TickTimer {
    period: Duration,
    last_attempt: Option<Instant>,
}

impl TickTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        TickTimer {
            period,
            last_attempt: None,
        }
    }

    /// A timer firing `ticks_per_second` times per second.
    #[must_use]
    pub fn from_rate(ticks_per_second: u32) -> Self {
        Self::new(Duration::from_secs(1) / ticks_per_second.max(1))
    }

    /// True once per period. The first call always fires.
    pub fn should_attempt(&mut self, now: Instant) -> bool {
        let due = self
            .last_attempt
            .is_none_or(|last| now.duration_since(last) >= self.period);
        if due {
            self.last_attempt = Some(now);
        }
        due
    }
}
