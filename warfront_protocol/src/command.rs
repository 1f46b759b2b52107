// The game's networked command vocabulary.
//
// A `Command` is one player action, immutable once constructed. It carries
// no session or transport reference — inputs are attributed by player number
// at the `PlayerInput` layer (see `message.rs`), which is what lets recorded
// inputs outlive a disconnected session.
//
// The core never interprets commands; it only orders them and hands them to
// the command executor. Keeping the vocabulary here, next to the wire types,
// means both peers agree on the encoding without depending on any game crate.

use serde::{Deserialize, Serialize};

use crate::types::UnitId;

/// A point in world coordinates (the sim's plane, not screen space).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

/// One player action, applied deterministically by every peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Order a unit to move toward a world-space target point.
    MoveUnit { unit: UnitId, target: WorldPos },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_unit_json_roundtrip() {
        let cmd = Command::MoveUnit {
            unit: UnitId(7),
            target: WorldPos { x: 120.5, y: -3.0 },
        };
        let json = serde_json::to_vec(&cmd).unwrap();
        let back: Command = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
