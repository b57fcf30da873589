// This module implements the target capability set for a reference four-slot VLIW DSP. The
// machine has 32 scalar registers that pair into 16 doubles, four predicate registers, 32
// vector registers that pair into 16 vector doubles, and a few control registers. Opcodes are
// described once in a table (see opcodes.rs) with their issue slots, dot-new / dot-cur forms
// and immediate ranges; the resource tracker is the generic slot automaton over that table.
// The target allows dual stores by default; DspTarget::single_store() builds the variant that
// issues at most one store per packet.

//! Reference DSP target.

pub mod opcodes;
pub mod registers;

use crate::core::{MachineInstr, Opcode, Reg, RegClass};
use crate::target::{InstrDesc, RegisterInfo, ResourceTracker, SlotResourceTracker, TargetInfo};
use hashbrown::HashMap;

/// The reference DSP.
#[derive(Debug, Clone)]
pub struct DspTarget {
    descs: Vec<InstrDesc>,
    /// Descriptor returned for opcodes outside the table.
    unknown: InstrDesc,
    slot_table: Vec<u8>,
    by_name: HashMap<&'static str, Opcode>,
    dual_stores: bool,
}

impl DspTarget {
    pub fn new() -> Self {
        let descs: Vec<InstrDesc> = (0..opcodes::NUM_OPCODES)
            .map(|n| opcodes::describe(Opcode(n)))
            .collect();
        let slot_table = descs.iter().map(|d| d.slots).collect();
        let by_name = opcodes::NAMES
            .iter()
            .enumerate()
            .map(|(n, &name)| (name, Opcode(n as u16)))
            .collect();
        Self {
            descs,
            unknown: opcodes::describe(Opcode(u16::MAX)),
            slot_table,
            by_name,
            dual_stores: true,
        }
    }

    /// Variant that issues at most one store per packet.
    pub fn single_store() -> Self {
        Self {
            dual_stores: false,
            ..Self::new()
        }
    }
}

impl Default for DspTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterInfo for DspTarget {
    fn reg_class(&self, reg: Reg) -> Option<RegClass> {
        registers::class_of(reg)
    }

    fn regs_overlap(&self, a: Reg, b: Reg) -> bool {
        registers::overlap(a, b)
    }

    fn is_super_register(&self, reg: Reg, sup: Reg) -> bool {
        registers::is_super(reg, sup)
    }

    fn super_register(&self, reg: Reg) -> Option<Reg> {
        registers::super_of(reg)
    }

    fn stack_register(&self) -> Reg {
        registers::SP
    }

    fn frame_register(&self) -> Reg {
        registers::FP
    }

    fn return_address_register(&self) -> Reg {
        registers::LR
    }

    fn callee_saved_regs(&self) -> &[Reg] {
        &registers::CALLEE_SAVED
    }

    fn reg_name(&self, reg: Reg) -> String {
        registers::name_of(reg)
    }

    fn reg_by_name(&self, name: &str) -> Option<Reg> {
        registers::parse_name(name)
    }

    fn is_ignorable_dead_def(&self, reg: Reg) -> bool {
        reg == registers::USR
    }
}

impl TargetInfo for DspTarget {
    fn desc(&self, opcode: Opcode) -> &InstrDesc {
        self.descs.get(opcode.0 as usize).unwrap_or(&self.unknown)
    }

    fn num_opcodes(&self) -> u16 {
        opcodes::NUM_OPCODES
    }

    fn opcode_by_name(&self, name: &str) -> Option<Opcode> {
        self.by_name.get(name).copied()
    }

    fn resource_tracker(&self) -> Box<dyn ResourceTracker + '_> {
        Box::new(SlotResourceTracker::new(&self.slot_table))
    }

    fn const_ext_opcode(&self) -> Opcode {
        opcodes::EXT
    }

    fn allows_dual_stores(&self) -> bool {
        self.dual_stores
    }

    fn is_usable_next_packet(&self, producer: &MachineInstr, consumer: &MachineInstr) -> bool {
        let Some(dest) = producer
            .operand(0)
            .filter(|mo| mo.is_reg_def())
            .and_then(|mo| mo.reg())
        else {
            return true;
        };
        if self.is_vector(producer) {
            // Vector results forward to vector ALUs and new-value stores only.
            return self.may_be_new_store(consumer)
                || (self.is_vector(consumer)
                    && !self.may_load(consumer)
                    && !self.may_store(consumer));
        }
        if !self.may_load(producer) || !(self.may_load(consumer) || self.may_store(consumer)) {
            return true;
        }

        // A loaded value reaches the address generators one packet late.
        let value = if self.may_store(consumer) {
            consumer.explicit_operands().count().checked_sub(1)
        } else {
            None
        };
        !consumer.explicit_operands().enumerate().any(|(k, mo)| {
            mo.is_reg_use()
                && Some(k) != value
                && mo.reg().is_some_and(|reg| self.regs_overlap(reg, dest))
        })
    }
}
