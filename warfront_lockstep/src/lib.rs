// warfront_lockstep — deterministic lockstep networking core for Warfront.
//
// This crate keeps multiple peers' simulations identical by exchanging
// per-tick player commands over TCP and gating simulation advancement until
// every occupied seat's input for a tick is known. It never runs the sim —
// command execution is delegated to the embedding game through the
// `CommandExecutor` trait, and rendering/input capture stay outside.
//
// Module overview:
// - `slot.rs`:    Fixed eight-seat registry (open / closed / player).
//                 Deterministic lowest-open assignment.
// - `session.rs`: One connected peer — socket ownership, thread-safe
//                 framed writes, interruptible reads.
// - `manager.rs`: Host/join connection management — accept loop, seat
//                 handshake, per-session reader threads, host relay,
//                 broadcast, shutdown.
// - `ledger.rs`:  Indexed append-only store of per-player, per-tick inputs
//                 and no-input acks.
// - `sync.rs`:    The tick-barrier state machine (`SyncEngine`) plus the
//                 wall-clock `TickTimer` that paces advance attempts.
// - `error.rs`:   `NetError` taxonomy.
//
// The shared slot table and input ledger are constructed per game session
// and handed to the manager and engine as `Arc<Mutex<_>>` handles — no
// process-global state, so one test process can run several independent
// peers.
//
// Dependencies: `warfront_protocol` (message types and codec), `log`
// (structured logging facade), `rustc-hash` (ledger index), `thiserror`
// (error derive).

use std::sync::{Mutex, MutexGuard};

pub mod error;
pub mod ledger;
pub mod manager;
pub mod session;
pub mod slot;
pub mod sync;

pub use error::{NetError, NetResult};
pub use ledger::InputLedger;
pub use manager::{ChatLine, ConnectionManager, HostConfig, JoinConfig, JoinInfo};
pub use session::Session;
pub use slot::{SlotContent, SlotTable};
pub use sync::{CommandExecutor, EngineState, SyncEngine, TickOutcome, TickTimer};

/// Lock a mutex, recovering the guard from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
