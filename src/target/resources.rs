// Resource reservation for the packet under construction. The ResourceTracker trait is the
// only view the packetizer has of the functional-unit model: a pure availability query, a
// committing reservation that fails loudly when called without availability, and a reset at
// packet boundaries. SlotResourceTracker is the automaton used by slot-based targets: each
// opcode may issue in a subset of N slots, and the tracker state is the set of slot occupancy
// masks reachable by some assignment of the already reserved instructions. That is the
// subset construction of the nondeterministic "pick a free slot" machine, so checking an
// instruction is a single transition and never needs backtracking.

//! Functional-unit reservation.

use crate::core::{Opcode, PacketizeResult, PacketizerError};

/// Reservation state of the functional units for one packet.
pub trait ResourceTracker {
    /// Whether `opcode` still fits in the current packet. Does not mutate.
    fn can_reserve(&self, opcode: Opcode) -> bool;

    /// Commit the resources of `opcode`. Fails when they are not available.
    fn reserve(&mut self, opcode: Opcode) -> PacketizeResult<()>;

    /// Drop every reservation; begins a new packet.
    fn reset(&mut self);
}

/// Number of issue slots a [`SlotResourceTracker`] models.
pub const NUM_SLOTS: u32 = 4;

const NUM_MASKS: u32 = 1 << NUM_SLOTS;

/// Automaton over issue-slot occupancy.
///
/// `state` has bit `m` set when occupancy mask `m` is reachable. The empty
/// packet is `{0}`.
#[derive(Debug, Clone)]
pub struct SlotResourceTracker<'t> {
    /// Allowed slot mask per opcode number.
    slot_table: &'t [u8],
    state: u16,
}

impl<'t> SlotResourceTracker<'t> {
    pub fn new(slot_table: &'t [u8]) -> Self {
        Self {
            slot_table,
            state: 1,
        }
    }

    /// Slot mask for `opcode`; `None` for opcodes outside the table.
    fn slots(&self, opcode: Opcode) -> Option<u8> {
        self.slot_table.get(opcode.0 as usize).copied()
    }

    /// Successor state after issuing an instruction restricted to `slots`.
    fn transition(&self, slots: u8) -> u16 {
        if slots == 0 {
            return self.state;
        }
        let mut next = 0u16;
        for mask in 0..NUM_MASKS {
            if self.state & (1 << mask) == 0 {
                continue;
            }
            for slot in 0..NUM_SLOTS {
                let bit = 1u32 << slot;
                if slots as u32 & bit != 0 && mask & bit == 0 {
                    next |= 1 << (mask | bit);
                }
            }
        }
        next
    }

    /// Number of slots every reachable assignment occupies.
    pub fn occupied(&self) -> u32 {
        (0..NUM_MASKS)
            .find(|mask| self.state & (1 << mask) != 0)
            .map(u32::count_ones)
            .unwrap_or(0)
    }
}

impl ResourceTracker for SlotResourceTracker<'_> {
    fn can_reserve(&self, opcode: Opcode) -> bool {
        match self.slots(opcode) {
            Some(slots) => self.transition(slots) != 0,
            None => false,
        }
    }

    fn reserve(&mut self, opcode: Opcode) -> PacketizeResult<()> {
        let slots = self
            .slots(opcode)
            .ok_or(PacketizerError::ResourcesUnavailable { opcode: opcode.0 })?;
        let next = self.transition(slots);
        if next == 0 {
            return Err(PacketizerError::ResourcesUnavailable { opcode: opcode.0 });
        }
        self.state = next;
        Ok(())
    }

    fn reset(&mut self) {
        self.state = 1;
    }
}
