// Protocol messages for peer-to-peer lockstep communication.
//
// A single `NetMessage` enum covers the full vocabulary: unlike a
// client/server split, lockstep peers are symmetric once connected — input,
// ack, and chat messages flow in both directions (the host additionally
// relays them so every peer sees every message exactly once). The seat
// messages (`Welcome`, `SlotAssign`, `SlotUpdate`, `Rejected`) only ever
// originate from the host.
//
// `Input` and `InputNone` carry the originating player number explicitly.
// Relayed messages would otherwise lose attribution, and the barrier needs
// to credit each record to a seat.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::types::{PlayerNumber, SimTick};

/// One message on the wire, JSON-encoded and length-prefix framed
/// (see `codec.rs`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NetMessage {
    /// Host → new session: informational greeting text.
    Welcome { motd: String },
    /// Host → new session: the authoritative seat for this connection.
    SlotAssign { slot: PlayerNumber },
    /// Host → all sessions: a seat changed state. Join peers mirror these
    /// into their local slot table so their barrier knows which seats are
    /// occupied.
    SlotUpdate { slot: PlayerNumber, state: SlotState },
    /// Host → doomed connection: the handshake was refused (e.g. every
    /// seat is taken). The socket closes after this.
    Rejected { reason: String },
    /// Any peer → all peers: one player action for one sim tick.
    Input(PlayerInput),
    /// Any peer → all peers: explicit "nothing from me this tick". Required
    /// for barrier satisfaction; a silent peer would stall everyone else.
    InputNone { player: PlayerNumber, tick: SimTick },
    /// Any peer → all peers: chat text. Routed to the chat sink, never to
    /// the input ledger — chat is not simulation state.
    Chat { player: PlayerNumber, text: String },
}

/// Wire form of a seat's occupancy. `Taken` deliberately omits the session
/// handle — transports are host-private, mirrors only track occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Open,
    Closed,
    Taken,
}

/// One decoded player action: who issued it, the sim tick it was issued
/// under, and the command itself. Append-only once recorded in the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub player: PlayerNumber,
    pub tick: SimTick,
    pub command: Command,
}
