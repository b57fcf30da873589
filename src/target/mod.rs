// This module defines the target capability set the packetizer is written against. A target
// supplies two traits. RegisterInfo answers register questions: class lookup, aliasing between
// registers and register pairs, the ABI-reserved registers (stack, frame, return address) and
// the callee-saved set. TargetInfo extends it with the opcode table (one InstrDesc per opcode),
// the resource tracker for its functional units, and the queries derived from descriptor flags
// that the dependency classifier and promotion engine consult: predication sense, dot-new and
// dot-cur forms, solo and system classification, memory-access kind, constant extension and
// frame offset validity. Flag queries are provided methods so a new target usually only fills
// in its tables; anything that is not a plain flag test can be overridden.

//! Target capability set.
//!
//! The packetizer is generic over a [`TargetInfo`] implementation that is
//! injected at construction time. No packetizer code inspects opcode
//! numbers directly.

pub mod desc;
pub mod resources;

pub use desc::{DescFlags, ImmRange, InstrDesc};
pub use resources::{ResourceTracker, SlotResourceTracker, NUM_SLOTS};

use crate::core::{MachineInstr, Opcode, OperandKind, Reg, RegClass};

/// Register-file queries.
pub trait RegisterInfo {
    /// Minimal class containing `reg`, if the register exists.
    fn reg_class(&self, reg: Reg) -> Option<RegClass>;

    /// Whether the two registers share any storage.
    fn regs_overlap(&self, a: Reg, b: Reg) -> bool;

    /// Whether `sup` strictly contains `reg`.
    fn is_super_register(&self, reg: Reg, sup: Reg) -> bool;

    /// Register pair containing `reg`.
    fn super_register(&self, reg: Reg) -> Option<Reg>;

    fn stack_register(&self) -> Reg;

    fn frame_register(&self) -> Reg;

    /// Link register written by calls.
    fn return_address_register(&self) -> Reg;

    fn callee_saved_regs(&self) -> &[Reg];

    fn reg_name(&self, reg: Reg) -> String;

    fn reg_by_name(&self, name: &str) -> Option<Reg>;

    /// Dead definitions of this register never conflict (sticky status bits).
    fn is_ignorable_dead_def(&self, _reg: Reg) -> bool {
        false
    }

    fn is_pred_reg(&self, reg: Reg) -> bool {
        self.reg_class(reg) == Some(RegClass::Pred)
    }
}

/// Instruction and resource queries of a packetizing target.
pub trait TargetInfo: RegisterInfo {
    /// Descriptor for `opcode`. Unknown opcodes must map to a descriptor
    /// that keeps the instruction alone (e.g. flagged solo).
    fn desc(&self, opcode: Opcode) -> &InstrDesc;

    fn num_opcodes(&self) -> u16;

    fn opcode_by_name(&self, name: &str) -> Option<Opcode>;

    /// Fresh resource state for one packet.
    fn resource_tracker(&self) -> Box<dyn ResourceTracker + '_>;

    /// Opcode of the constant-extender word.
    fn const_ext_opcode(&self) -> Opcode;

    /// Bytes of saved link and frame registers between a caller's and a
    /// callee's stack pointer.
    fn frame_linkage_size(&self) -> i64 {
        8
    }

    /// Whether two plain stores may issue in one packet.
    fn allows_dual_stores(&self) -> bool {
        true
    }

    /// Whether `consumer` can read the result of `producer` issued in the
    /// previous packet without stalling.
    fn is_usable_next_packet(&self, _producer: &MachineInstr, _consumer: &MachineInstr) -> bool {
        true
    }

    fn name(&self, mi: &MachineInstr) -> &'static str {
        self.desc(mi.opcode).name
    }

    fn has_flag(&self, mi: &MachineInstr, flag: DescFlags) -> bool {
        self.desc(mi.opcode).has(flag)
    }

    /// Region boundary: nothing is moved across it. Unscheduled inline
    /// assembly is handled by the packetizer configuration.
    fn is_scheduling_boundary(&self, mi: &MachineInstr) -> bool {
        let d = self.desc(mi.opcode);
        d.has(DescFlags::TERMINATOR)
            || d.has(DescFlags::EH_LABEL)
            || d.has(DescFlags::CFI)
            || (d.has(DescFlags::CALL) && d.has(DescFlags::NO_RETURN))
    }

    fn is_call(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::CALL)
    }

    fn is_return(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::RETURN)
    }

    fn is_branch(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::BRANCH)
    }

    fn is_conditional_branch(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::COND_BRANCH)
    }

    fn is_terminator(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::TERMINATOR)
    }

    fn is_barrier(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::BARRIER)
    }

    fn is_control_flow(&self, mi: &MachineInstr) -> bool {
        self.is_terminator(mi) || self.is_call(mi)
    }

    fn may_load(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::MAY_LOAD)
    }

    fn may_store(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::MAY_STORE)
    }

    fn is_predicated(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::PREDICATED)
    }

    fn is_predicated_true(&self, mi: &MachineInstr) -> bool {
        self.is_predicated(mi) && !self.has_flag(mi, DescFlags::PRED_FALSE)
    }

    fn is_predicated_new(&self, mi: &MachineInstr) -> bool {
        self.is_predicated(mi) && self.has_flag(mi, DescFlags::PRED_NEW)
    }

    fn is_new_value_inst(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::NEW_VALUE)
    }

    fn is_new_value_store(&self, mi: &MachineInstr) -> bool {
        self.is_new_value_inst(mi) && self.may_store(mi)
    }

    fn is_new_value_jump(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::NEW_VALUE_JUMP)
    }

    /// Reads a register or predicate produced in the same packet.
    fn is_dot_new_inst(&self, mi: &MachineInstr) -> bool {
        self.is_new_value_inst(mi) || self.is_predicated_new(mi)
    }

    fn is_dot_cur_inst(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::DOT_CUR)
    }

    fn may_be_cur_load(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::CUR_LOADABLE)
    }

    /// Store with a new-value form.
    fn may_be_new_store(&self, mi: &MachineInstr) -> bool {
        let d = self.desc(mi.opcode);
        d.has(DescFlags::MAY_STORE) && d.dot_new.is_some()
    }

    /// Conditional instruction whose predicate can be read as dot-new:
    /// predicated branches, transfers, ALU ops and loads, plus predicated
    /// stores that do not already read anything from the packet.
    fn is_cond_inst(&self, mi: &MachineInstr) -> bool {
        if !self.is_predicated(mi) {
            return false;
        }
        !(self.may_store(mi) && (self.is_new_value_inst(mi) || self.is_predicated_new(mi)))
    }

    fn is_vector(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::VECTOR)
    }

    fn is_post_increment(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::POST_INC)
    }

    fn is_abs_set(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::ABS_SET)
    }

    fn is_mem_op(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::MEMOP)
    }

    fn is_system(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::SYSTEM)
    }

    fn is_sched_barrier(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::SCHED_BARRIER)
    }

    fn is_solo(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::SOLO)
    }

    fn is_dealloc_ret(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::DEALLOC_RET)
    }

    fn is_loop_n(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::LOOP_N)
    }

    fn is_frame_alloc(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::FRAME_ALLOC)
    }

    fn is_frame_store(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::FRAME_STORE)
    }

    fn is_direct_jump(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::DIRECT_JUMP)
    }

    fn is_jump_r(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::JUMP_R)
    }

    fn is_indirect_call(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::INDIRECT_CALL)
    }

    fn is_tail_call(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::TAIL_CALL)
    }

    fn is_save_callee_saved_regs_call(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::CSR_CALL)
    }

    fn is_inline_asm(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::INLINE_ASM)
    }

    fn is_debug_value(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::DEBUG_VALUE)
    }

    fn is_implicit_def(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::IMPLICIT_DEF)
    }

    fn is_kill(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::KILL)
    }

    fn is_cfi(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::CFI)
    }

    fn is_eh_label(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::EH_LABEL)
    }

    /// Both instructions need the exclusive vector addressing hardware.
    fn requires_exclusive_addressing(&self, a: &MachineInstr, b: &MachineInstr) -> bool {
        self.has_flag(a, DescFlags::EXCL_ADDR) && self.has_flag(b, DescFlags::EXCL_ADDR)
    }

    /// Whether the instruction has a functional unit at all.
    fn has_functional_units(&self, mi: &MachineInstr) -> bool {
        self.desc(mi.opcode).slots != 0
    }

    /// Memory access whose order must be preserved. Memory instructions
    /// without memory references are treated as ordered.
    fn has_ordered_memory_ref(&self, mi: &MachineInstr) -> bool {
        if !self.may_load(mi) && !self.may_store(mi) {
            return false;
        }
        mi.mem_refs.is_empty() || mi.has_volatile_ref()
    }

    /// Encoded with a constant extender regardless of operands.
    fn is_extended(&self, mi: &MachineInstr) -> bool {
        self.has_flag(mi, DescFlags::EXTENDED)
    }

    /// Extendable immediate that does not fit its field. Symbolic operands
    /// always need the extender.
    fn is_const_extended(&self, mi: &MachineInstr) -> bool {
        let Some(range) = self.desc(mi.opcode).ext_imm else {
            return false;
        };
        match mi.operand(range.operand).map(|mo| &mo.kind) {
            Some(OperandKind::Imm(value)) => !range.accepts(*value),
            Some(OperandKind::Symbol(_)) => true,
            _ => false,
        }
    }

    fn needs_const_extender(&self, mi: &MachineInstr) -> bool {
        self.is_extended(mi) || self.is_const_extended(mi)
    }

    /// Whether `offset` fits the offset field of `opcode`.
    fn is_valid_offset(&self, opcode: Opcode, offset: i64) -> bool {
        self.desc(opcode)
            .offset
            .is_some_and(|range| range.accepts(offset))
    }

    /// Class of the result written through operand 0.
    fn def_reg_class(&self, mi: &MachineInstr) -> Option<RegClass> {
        self.desc(mi.opcode).def_class
    }

    fn dot_new_op(&self, mi: &MachineInstr) -> Option<Opcode> {
        self.desc(mi.opcode).dot_new
    }

    fn dot_new_pred_op(&self, mi: &MachineInstr) -> Option<Opcode> {
        self.desc(mi.opcode).dot_new_pred
    }

    fn dot_cur_op(&self, mi: &MachineInstr) -> Option<Opcode> {
        self.desc(mi.opcode).dot_cur
    }

    /// Whether the predicate `pred` written by `producer` may be consumed
    /// as dot-new. The predicate must be an explicit definition.
    fn pred_can_be_used_as_dot_new(&self, producer: &MachineInstr, pred: Reg) -> bool {
        !producer
            .operands
            .iter()
            .any(|mo| mo.is_reg_def() && mo.implicit && mo.reg() == Some(pred))
    }

    /// One operand-less instance of every real opcode, used to exercise all
    /// timing classes.
    fn all_insn_timing_classes(&self) -> Vec<MachineInstr> {
        const PSEUDO: [DescFlags; 6] = [
            DescFlags::INLINE_ASM,
            DescFlags::DEBUG_VALUE,
            DescFlags::IMPLICIT_DEF,
            DescFlags::KILL,
            DescFlags::CFI,
            DescFlags::EH_LABEL,
        ];
        (0..self.num_opcodes())
            .map(Opcode)
            .filter(|&op| {
                let d = self.desc(op);
                !PSEUDO.iter().any(|&flag| d.has(flag))
            })
            .map(MachineInstr::new)
            .collect()
    }
}
