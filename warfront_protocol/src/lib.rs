// warfront_protocol — wire protocol for lockstep multiplayer communication.
//
// This crate defines the message types, command vocabulary, and codec used
// by Warfront peers to exchange per-tick input over TCP. It is shared by
// the host and join sides of `warfront_lockstep` and has no dependency on
// any game or rendering crate.
//
// Module overview:
// - `types.rs`:   Core ID newtypes — `PlayerNumber`, `SimTick`, `SessionId`,
//                 `UnitId` — and the `MAX_PLAYERS` seat count.
// - `command.rs`: The networked command vocabulary (`Command`) applied by
//                 every peer's command executor.
// - `message.rs`: The `NetMessage` wire enum plus `PlayerInput` and
//                 `SlotState`.
// - `codec.rs`:   Length-delimited framing + JSON encoding over any
//                 `Read`/`Write` stream, with recoverable-vs-fatal error
//                 classification for read loops.
//
// Design decisions:
// - **JSON serialization.** Human-inspectable on the wire and cheap at the
//   message rates of a lockstep game (a handful of small frames per tick).
// - **One symmetric message enum.** Peers send and receive the same
//   vocabulary; only the seat-management kinds are host-originated.
// - **No async runtime.** Plain `std::io::Read`/`Write`, compatible with
//   blocking TCP streams and buffered wrappers.

pub mod codec;
pub mod command;
pub mod message;
pub mod types;

pub use codec::{CodecError, MAX_FRAME_SIZE, read_message, write_message};
pub use command::{Command, WorldPos};
pub use message::{NetMessage, PlayerInput, SlotState};
pub use types::{MAX_PLAYERS, PlayerNumber, SessionId, SimTick, UnitId};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Frame a message, read it back, compare.
    fn roundtrip(msg: &NetMessage) {
        let mut wire = Vec::new();
        write_message(&mut wire, msg).unwrap();
        let mut cursor = Cursor::new(&wire);
        let back = read_message(&mut cursor).unwrap();
        assert_eq!(&back, msg);
    }

    #[test]
    fn roundtrip_seat_handshake_messages() {
        roundtrip(&NetMessage::Welcome {
            motd: "Welcome to the server!".into(),
        });
        roundtrip(&NetMessage::SlotAssign {
            slot: PlayerNumber(1),
        });
        roundtrip(&NetMessage::Rejected {
            reason: "server full".into(),
        });
    }

    #[test]
    fn roundtrip_slot_update_states() {
        for state in [SlotState::Open, SlotState::Closed, SlotState::Taken] {
            roundtrip(&NetMessage::SlotUpdate {
                slot: PlayerNumber(5),
                state,
            });
        }
    }

    #[test]
    fn roundtrip_input_none_and_chat() {
        roundtrip(&NetMessage::InputNone {
            player: PlayerNumber(2),
            tick: SimTick(7),
        });
        roundtrip(&NetMessage::Chat {
            player: PlayerNumber(4),
            text: "gg".into(),
        });
    }
}
