// Seat registry for a game session.
//
// Eight numbered seats, created all-open when the table is built and never
// destroyed — only their content changes. Assignment scans ascending and
// takes the first open seat, so seat numbering is deterministic across runs
// and every peer agrees on which seat a connection order produces.
//
// The table is shared between the connection manager (assign/release on
// connect/disconnect) and the synchronization engine (the barrier iterates
// occupied seats). Both sides take the same lock, so a seat is never
// observed half-released: a disconnecting player either still owes input or
// is fully exempt, atomically.
//
// On the host, an occupied seat records which transport session owns it.
// The host's own seat and the mirrored tables on join peers (fed by
// `SlotUpdate` broadcasts) store no session — transports are host-private.

use warfront_protocol::{MAX_PLAYERS, PlayerNumber, SessionId, SlotState};

/// Content of one seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotContent {
    /// Free; the next connection may take it.
    Open,
    /// Blocked by the host; never assigned and never awaited.
    Closed,
    /// Occupied. `session` is the owning transport on the host, `None` for
    /// the host's own seat and for mirrored tables.
    Player { session: Option<SessionId> },
}

/// Fixed-capacity registry mapping seat numbers 1..=8 to their content.
pub struct SlotTable {
    slots: [SlotContent; MAX_PLAYERS as usize],
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotTable {
    /// A table with every seat open.
    #[must_use]
    pub fn new() -> Self {
        SlotTable {
            slots: [SlotContent::Open; MAX_PLAYERS as usize],
        }
    }

    fn index(number: PlayerNumber) -> Option<usize> {
        (1..=MAX_PLAYERS)
            .contains(&number.0)
            .then(|| usize::from(number.0) - 1)
    }

    /// Assign the lowest-numbered open seat, or `None` when every seat is
    /// taken or closed. Lowest-number-wins keeps assignment reproducible.
    pub fn assign_first_open(&mut self, session: Option<SessionId>) -> Option<PlayerNumber> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if *slot == SlotContent::Open {
                *slot = SlotContent::Player { session };
                return u8::try_from(i + 1).ok().map(PlayerNumber);
            }
        }
        None
    }

    /// Return an occupied seat to open. No-op for open, closed, or
    /// out-of-range seats — a closed seat stays closed across a release.
    pub fn release(&mut self, number: PlayerNumber) {
        if let Some(i) = Self::index(number)
            && matches!(self.slots[i], SlotContent::Player { .. })
        {
            self.slots[i] = SlotContent::Open;
        }
    }

    /// Block an open seat so it is never assigned. No-op unless open.
    pub fn close(&mut self, number: PlayerNumber) {
        if let Some(i) = Self::index(number)
            && self.slots[i] == SlotContent::Open
        {
            self.slots[i] = SlotContent::Closed;
        }
    }

    /// Unblock a closed seat. No-op unless closed.
    pub fn reopen(&mut self, number: PlayerNumber) {
        if let Some(i) = Self::index(number)
            && self.slots[i] == SlotContent::Closed
        {
            self.slots[i] = SlotContent::Open;
        }
    }

    /// True iff the seat is occupied by a player.
    #[must_use]
    pub fn is_player_slot(&self, number: PlayerNumber) -> bool {
        Self::index(number)
            .is_some_and(|i| matches!(self.slots[i], SlotContent::Player { .. }))
    }

    /// Content of one seat, or `None` for an out-of-range number.
    #[must_use]
    pub fn get(&self, number: PlayerNumber) -> Option<SlotContent> {
        Self::index(number).map(|i| self.slots[i])
    }

    /// Occupied seat numbers in ascending order — the barrier's iteration
    /// set, and the canonical cross-peer execution grouping.
    #[must_use]
    pub fn occupied(&self) -> Vec<PlayerNumber> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, SlotContent::Player { .. }))
            .filter_map(|(i, _)| u8::try_from(i + 1).ok())
            .map(PlayerNumber)
            .collect()
    }

    /// Apply a seat state received from the host (join-side mirroring).
    /// Out-of-range numbers are ignored.
    pub fn apply_wire_state(&mut self, number: PlayerNumber, state: SlotState) {
        if let Some(i) = Self::index(number) {
            self.slots[i] = match state {
                SlotState::Open => SlotContent::Open,
                SlotState::Closed => SlotContent::Closed,
                SlotState::Taken => SlotContent::Player { session: None },
            };
        }
    }

    /// Wire form of one seat's state, for `SlotUpdate` broadcasts.
    #[must_use]
    pub fn wire_state(&self, number: PlayerNumber) -> Option<SlotState> {
        self.get(number).map(|content| match content {
            SlotContent::Open => SlotState::Open,
            SlotContent::Closed => SlotState::Closed,
            SlotContent::Player { .. } => SlotState::Taken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_ascending_seats() {
        let mut table = SlotTable::new();
        for expected in 1..=MAX_PLAYERS {
            let seat = table.assign_first_open(Some(SessionId(u64::from(expected))));
            assert_eq!(seat, Some(PlayerNumber(expected)));
        }
        assert_eq!(table.assign_first_open(Some(SessionId(99))), None);
    }

    #[test]
    fn released_seat_is_reused_lowest_first() {
        let mut table = SlotTable::new();
        for _ in 0..4 {
            table.assign_first_open(None);
        }
        table.release(PlayerNumber(2));
        assert_eq!(table.assign_first_open(None), Some(PlayerNumber(2)));
        assert_eq!(table.assign_first_open(None), Some(PlayerNumber(5)));
    }

    #[test]
    fn closed_seats_are_skipped_and_survive_release() {
        let mut table = SlotTable::new();
        table.close(PlayerNumber(1));
        assert_eq!(table.assign_first_open(None), Some(PlayerNumber(2)));

        table.release(PlayerNumber(1));
        assert_eq!(table.get(PlayerNumber(1)), Some(SlotContent::Closed));

        table.reopen(PlayerNumber(1));
        assert_eq!(table.assign_first_open(None), Some(PlayerNumber(1)));
    }

    #[test]
    fn occupied_lists_players_in_ascending_order() {
        let mut table = SlotTable::new();
        table.assign_first_open(None);
        table.assign_first_open(None);
        table.assign_first_open(None);
        table.release(PlayerNumber(2));
        assert_eq!(table.occupied(), vec![PlayerNumber(1), PlayerNumber(3)]);
        assert!(table.is_player_slot(PlayerNumber(1)));
        assert!(!table.is_player_slot(PlayerNumber(2)));
    }

    #[test]
    fn out_of_range_numbers_are_ignored() {
        let mut table = SlotTable::new();
        assert!(!table.is_player_slot(PlayerNumber(0)));
        assert!(!table.is_player_slot(PlayerNumber(9)));
        assert_eq!(table.get(PlayerNumber(0)), None);
        table.release(PlayerNumber(9));
        table.apply_wire_state(PlayerNumber(200), SlotState::Taken);
        assert!(table.occupied().is_empty());
    }

    #[test]
    fn wire_state_mirrors_roundtrip() {
        let mut host = SlotTable::new();
        host.assign_first_open(Some(SessionId(1)));
        host.close(PlayerNumber(8));

        let mut mirror = SlotTable::new();
        for n in 1..=MAX_PLAYERS {
            let number = PlayerNumber(n);
            mirror.apply_wire_state(number, host.wire_state(number).unwrap());
        }
        assert_eq!(mirror.occupied(), vec![PlayerNumber(1)]);
        assert_eq!(mirror.get(PlayerNumber(8)), Some(SlotContent::Closed));
        // Mirrors never hold transport handles.
        assert_eq!(
            mirror.get(PlayerNumber(1)),
            Some(SlotContent::Player { session: None })
        );
    }
}
