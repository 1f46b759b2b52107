// Core ID types for the lockstep protocol.
//
// Lightweight newtypes shared by `message.rs` and the lockstep core
// (`warfront_lockstep`). Player numbers are seat-scoped 1..=8 integers, not
// sim entity IDs — the host assigns the lowest open seat, and the seat number
// doubles as the player number attributed on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of seats in a game session. Seats are numbered 1..=MAX_PLAYERS.
pub const MAX_PLAYERS: u8 = 8;

/// Seat number of a participant, 1..=8. The seat number is the player
/// number: every input on the wire is attributed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerNumber(pub u8);

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Logical simulation turn counter. Coarser than the render/physics tick:
/// one sim tick spans several world updates, and all cross-peer command
/// exchange is keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// The tick after this one.
    #[must_use]
    pub fn next(self) -> SimTick {
        SimTick(self.0 + 1)
    }

    /// The tick before this one, or `None` at tick 0 (nothing precedes the
    /// start of the game).
    #[must_use]
    pub fn previous(self) -> Option<SimTick> {
        self.0.checked_sub(1).map(SimTick)
    }
}

impl fmt::Display for SimTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}", self.0)
    }
}

/// Identifier of one transport session, assigned by the connection manager
/// that accepted it. Never reused within a manager's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Identifier of a game unit targeted by a command. Opaque to the core —
/// only the command executor interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_tick_previous_at_zero() {
        assert_eq!(SimTick(0).previous(), None);
        assert_eq!(SimTick(1).previous(), Some(SimTick(0)));
    }

    #[test]
    fn sim_tick_next_increments() {
        assert_eq!(SimTick(41).next(), SimTick(42));
    }
}
