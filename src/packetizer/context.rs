//! State of the packet under construction.
//!
//! [`PacketContext`] is reset at every packet boundary. The per-candidate
//! [`PromotionRecord`] is reset before each instruction is tried; its
//! rewrite journal is what makes speculative promotion reversible.

use crate::core::{MachineInstr, Opcode, OperandKind};

/// An in-place change made to an instruction while it was being tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Opcode { prev: Opcode },
    Imm { operand: usize, prev: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewrite {
    /// Region position of the rewritten instruction.
    pub instr: usize,
    pub change: Change,
}

/// Flags and undo journal for one placement attempt.
#[derive(Debug, Clone, Default)]
pub struct PromotionRecord {
    /// Some check found a blocking dependence.
    pub dependence: bool,
    /// The candidate now reads a value or predicate from the packet.
    pub promoted_to_dot_new: bool,
    /// The candidate's successor is a new-value jump placed with it.
    pub glue_to_nvj: bool,
    /// The candidate is a store rebased on the caller's stack pointer.
    pub glue_allocframe_store: bool,
    pub found_sequential: bool,
    journal: Vec<Rewrite>,
}

impl PromotionRecord {
    /// Set `instrs[instr]`'s opcode, remembering the old one.
    pub fn set_opcode(&mut self, instrs: &mut [MachineInstr], instr: usize, opcode: Opcode) {
        let mi = &mut instrs[instr];
        self.journal.push(Rewrite {
            instr,
            change: Change::Opcode { prev: mi.opcode },
        });
        mi.opcode = opcode;
    }

    /// Set an immediate operand, remembering the old value. Returns false
    /// when the operand is not an immediate.
    pub fn set_imm(
        &mut self,
        instrs: &mut [MachineInstr],
        instr: usize,
        operand: usize,
        value: i64,
    ) -> bool {
        let Some(prev) = instrs[instr].operand(operand).and_then(|mo| mo.imm_value()) else {
            return false;
        };
        self.journal.push(Rewrite {
            instr,
            change: Change::Imm { operand, prev },
        });
        instrs[instr].operands[operand].kind = OperandKind::Imm(value);
        true
    }

    pub fn journal(&self) -> &[Rewrite] {
        &self.journal
    }

    /// Undo every journaled rewrite, newest first. Returns how many were undone.
    pub fn rollback(&mut self, instrs: &mut [MachineInstr]) -> usize {
        let undone = self.journal.len();
        while let Some(rewrite) = self.journal.pop() {
            let mi = &mut instrs[rewrite.instr];
            match rewrite.change {
                Change::Opcode { prev } => mi.opcode = prev,
                Change::Imm { operand, prev } => {
                    mi.operands[operand].kind = OperandKind::Imm(prev);
                }
            }
        }
        self.promoted_to_dot_new = false;
        self.glue_allocframe_store = false;
        undone
    }

    /// Keep the rewrites; they become part of the packet.
    pub fn commit(&mut self) {
        self.journal.clear();
    }
}

/// The packet being built.
#[derive(Debug, Clone, Default)]
pub struct PacketContext {
    /// Region positions of the members, in insertion order.
    pub members: Vec<usize>,
    /// Candidates whose complementary-predicate dependence was discharged.
    pub ignore_deps: Vec<usize>,
    /// Members of the last closed packet, for stall checks.
    pub old_members: Vec<usize>,
    pub record: PromotionRecord,
}

impl PacketContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn first(&self) -> Option<usize> {
        self.members.first().copied()
    }

    /// Fresh per-candidate state. Journaled rewrites must already be
    /// committed or rolled back.
    pub fn begin_candidate(&mut self) {
        debug_assert!(self.record.journal.is_empty());
        self.record = PromotionRecord::default();
    }

    /// Close the packet: its members become the previous packet and the
    /// discharged dependences are forgotten. Closing an empty packet keeps
    /// the previous one.
    pub fn clear(&mut self) {
        if !self.members.is_empty() {
            self.old_members = std::mem::take(&mut self.members);
        }
        self.ignore_deps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MachineOperand;
    use crate::dsp::opcodes::{STORE, STORE_NEW};
    use crate::dsp::registers::{r, SP};

    fn frame_store(offset: i64) -> MachineInstr {
        MachineInstr::with_operands(
            STORE,
            vec![
                MachineOperand::use_reg(SP),
                MachineOperand::imm(offset),
                MachineOperand::use_reg(r(1)),
            ],
        )
    }

    #[test]
    fn test_rollback_restores_bit_for_bit() {
        let mut instrs = vec![frame_store(16)];
        let original = instrs.clone();
        let mut record = PromotionRecord::default();

        record.set_opcode(&mut instrs, 0, STORE_NEW);
        assert!(record.set_imm(&mut instrs, 0, 1, -8));
        record.promoted_to_dot_new = true;
        assert_eq!(instrs[0].opcode, STORE_NEW);
        assert_eq!(instrs[0].operands[1].imm_value(), Some(-8));

        assert_eq!(record.rollback(&mut instrs), 2);
        assert_eq!(instrs, original);
        assert!(!record.promoted_to_dot_new);
        assert!(record.journal().is_empty());
    }

    #[test]
    fn test_set_imm_rejects_register_operand() {
        let mut instrs = vec![frame_store(0)];
        let mut record = PromotionRecord::default();
        assert!(!record.set_imm(&mut instrs, 0, 0, 4));
        assert!(record.journal().is_empty());
    }

    #[test]
    fn test_commit_keeps_rewrites() {
        let mut instrs = vec![frame_store(0)];
        let mut record = PromotionRecord::default();
        record.set_opcode(&mut instrs, 0, STORE_NEW);
        record.commit();
        assert_eq!(record.rollback(&mut instrs), 0);
        assert_eq!(instrs[0].opcode, STORE_NEW);
    }

    #[test]
    fn test_clear_forgets_ignore_list() {
        let mut ctx = PacketContext::new();
        ctx.members.extend([0, 1]);
        ctx.ignore_deps.push(1);
        ctx.clear();
        assert!(ctx.is_empty());
        assert!(ctx.ignore_deps.is_empty());
        assert_eq!(ctx.old_members, vec![0, 1]);

        // An empty packet leaves the previous one in place.
        ctx.clear();
        assert_eq!(ctx.old_members, vec![0, 1]);
    }
}
