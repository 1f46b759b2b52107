// Append-only store of received per-player, per-tick inputs.
//
// The ledger is written by every session's reader thread and scanned by the
// tick thread's barrier check, so lookups are indexed by the
// `(player, tick)` pair — the barrier runs once per tick attempt per
// occupied seat and must not degrade as the ledger grows.
//
// An entry's presence is what the barrier tests. `record` appends a command
// under its key; `record_none` creates the key with no command, which is how
// an explicit "nothing from me this tick" ack satisfies the barrier without
// adding anything to execute. Duplicate `(player, tick)` records are kept in
// arrival order: a player may issue several commands in one tick, and that
// order is part of the cross-peer execution contract.

use rustc_hash::FxHashMap;
use warfront_protocol::{PlayerInput, PlayerNumber, SimTick};

/// Indexed store of `PlayerInput` records and no-input acks.
#[derive(Debug, Default)]
pub struct InputLedger {
    entries: FxHashMap<(PlayerNumber, SimTick), Vec<PlayerInput>>,
}

impl InputLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one input. Existing records for the same `(player, tick)` are
    /// retained ahead of it.
    pub fn record(&mut self, input: PlayerInput) {
        self.entries
            .entry((input.player, input.tick))
            .or_default()
            .push(input);
    }

    /// Record an explicit no-input ack: marks `(player, tick)` present for
    /// the barrier without storing a command.
    pub fn record_none(&mut self, player: PlayerNumber, tick: SimTick) {
        self.entries.entry((player, tick)).or_default();
    }

    /// True iff the player has produced anything (command or ack) for the
    /// tick.
    #[must_use]
    pub fn exists(&self, player: PlayerNumber, tick: SimTick) -> bool {
        self.entries.contains_key(&(player, tick))
    }

    /// All commands recorded for `(player, tick)`, in arrival order. Empty
    /// for unknown keys and for acks-only entries.
    #[must_use]
    pub fn query(&self, player: PlayerNumber, tick: SimTick) -> &[PlayerInput] {
        self.entries
            .get(&(player, tick))
            .map_or(&[], Vec::as_slice)
    }

    /// Drop every entry with a tick strictly below `below`. Called after
    /// each advance so consumed ticks do not accumulate without bound.
    pub fn prune(&mut self, below: SimTick) {
        self.entries.retain(|(_, tick), _| *tick >= below);
    }

    /// Number of `(player, tick)` entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
