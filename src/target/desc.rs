//! Table-driven instruction descriptors.
//!
//! A target describes every opcode once with an [`InstrDesc`]. The
//! packetizer never matches on opcode numbers; it asks the descriptor for
//! properties (flags, issue slots, promoted forms, immediate ranges).

use crate::core::{Opcode, Reg, RegClass};
use std::fmt;
use std::ops::BitOr;

/// Property bits of an instruction descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DescFlags(pub u64);

impl DescFlags {
    pub const NONE: DescFlags = DescFlags(0);
    pub const CALL: DescFlags = DescFlags(1 << 0);
    pub const RETURN: DescFlags = DescFlags(1 << 1);
    pub const BRANCH: DescFlags = DescFlags(1 << 2);
    pub const COND_BRANCH: DescFlags = DescFlags(1 << 3);
    pub const TERMINATOR: DescFlags = DescFlags(1 << 4);
    /// Control never falls through to the next instruction.
    pub const BARRIER: DescFlags = DescFlags(1 << 5);
    pub const MAY_LOAD: DescFlags = DescFlags(1 << 6);
    pub const MAY_STORE: DescFlags = DescFlags(1 << 7);
    pub const PREDICATED: DescFlags = DescFlags(1 << 8);
    /// Executes when the predicate is false.
    pub const PRED_FALSE: DescFlags = DescFlags(1 << 9);
    /// Reads its predicate from the same packet.
    pub const PRED_NEW: DescFlags = DescFlags(1 << 10);
    /// Consumes a value produced in the same packet (new-value store or jump).
    pub const NEW_VALUE: DescFlags = DescFlags(1 << 11);
    pub const NEW_VALUE_JUMP: DescFlags = DescFlags(1 << 12);
    pub const DOT_CUR: DescFlags = DescFlags(1 << 13);
    pub const CUR_LOADABLE: DescFlags = DescFlags(1 << 14);
    pub const VECTOR: DescFlags = DescFlags(1 << 15);
    pub const POST_INC: DescFlags = DescFlags(1 << 16);
    /// Absolute-set addressing: operand 1 receives the address.
    pub const ABS_SET: DescFlags = DescFlags(1 << 17);
    /// Read-modify-write memory operation.
    pub const MEMOP: DescFlags = DescFlags(1 << 18);
    /// Barrier or cache-control instruction.
    pub const SYSTEM: DescFlags = DescFlags(1 << 19);
    /// Memory barrier that must issue alone.
    pub const SCHED_BARRIER: DescFlags = DescFlags(1 << 20);
    pub const SOLO: DescFlags = DescFlags(1 << 21);
    pub const DEALLOC_RET: DescFlags = DescFlags(1 << 22);
    pub const LOOP_N: DescFlags = DescFlags(1 << 23);
    pub const FRAME_ALLOC: DescFlags = DescFlags(1 << 24);
    /// Base + immediate store whose offset can be rebased on the caller's stack pointer.
    pub const FRAME_STORE: DescFlags = DescFlags(1 << 25);
    /// Unconditional direct jump.
    pub const DIRECT_JUMP: DescFlags = DescFlags(1 << 26);
    /// Jump through a register.
    pub const JUMP_R: DescFlags = DescFlags(1 << 27);
    pub const INDIRECT_CALL: DescFlags = DescFlags(1 << 28);
    pub const TAIL_CALL: DescFlags = DescFlags(1 << 29);
    /// Call to the callee-saved register spill routine.
    pub const CSR_CALL: DescFlags = DescFlags(1 << 30);
    /// Always encoded with a constant extender.
    pub const EXTENDED: DescFlags = DescFlags(1 << 31);
    /// Needs the exclusive (indirect) vector addressing hardware.
    pub const EXCL_ADDR: DescFlags = DescFlags(1 << 32);
    pub const INLINE_ASM: DescFlags = DescFlags(1 << 33);
    pub const DEBUG_VALUE: DescFlags = DescFlags(1 << 34);
    pub const IMPLICIT_DEF: DescFlags = DescFlags(1 << 35);
    pub const KILL: DescFlags = DescFlags(1 << 36);
    pub const CFI: DescFlags = DescFlags(1 << 37);
    pub const EH_LABEL: DescFlags = DescFlags(1 << 38);
    pub const NO_RETURN: DescFlags = DescFlags(1 << 39);

    pub const fn contains(self, other: DescFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: DescFlags) -> DescFlags {
        DescFlags(self.0 | other.0)
    }
}

impl BitOr for DescFlags {
    type Output = DescFlags;

    fn bitor(self, rhs: DescFlags) -> DescFlags {
        self.union(rhs)
    }
}

impl fmt::Debug for DescFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescFlags({:#x})", self.0)
    }
}

/// Encodable range of an immediate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmRange {
    /// Index of the immediate among the instruction's operands.
    pub operand: usize,
    pub min: i64,
    pub max: i64,
    /// Required alignment of the value (1 for none).
    pub align: i64,
}

impl ImmRange {
    pub const fn new(operand: usize, min: i64, max: i64, align: i64) -> Self {
        Self {
            operand,
            min,
            max,
            align,
        }
    }

    /// Signed `bits`-wide field scaled by `align`.
    pub const fn signed(operand: usize, bits: u32, align: i64) -> Self {
        let half = 1i64 << (bits - 1);
        Self::new(operand, -half * align, (half - 1) * align, align)
    }

    pub fn accepts(&self, value: i64) -> bool {
        value >= self.min && value <= self.max && value % self.align == 0
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone)]
pub struct InstrDesc {
    pub name: &'static str,
    pub flags: DescFlags,
    /// Mask of issue slots the instruction may occupy; 0 means no functional unit.
    pub slots: u8,
    /// Registers written that do not appear in the textual form.
    pub implicit_defs: &'static [Reg],
    pub implicit_uses: &'static [Reg],
    /// Class of the result held by operand 0.
    pub def_class: Option<RegClass>,
    /// Form reading a register value produced in the same packet.
    pub dot_new: Option<Opcode>,
    /// Form reading its predicate from the same packet.
    pub dot_new_pred: Option<Opcode>,
    /// Vector load form whose result is usable in the same packet.
    pub dot_cur: Option<Opcode>,
    /// Frame-relative offset operand, when the addressing mode has one.
    pub offset: Option<ImmRange>,
    /// Immediate that needs a constant extender when out of range.
    pub ext_imm: Option<ImmRange>,
}

impl InstrDesc {
    pub const fn new(name: &'static str, flags: DescFlags, slots: u8) -> Self {
        Self {
            name,
            flags,
            slots,
            implicit_defs: &[],
            implicit_uses: &[],
            def_class: None,
            dot_new: None,
            dot_new_pred: None,
            dot_cur: None,
            offset: None,
            ext_imm: None,
        }
    }

    pub const fn def_class(mut self, class: RegClass) -> Self {
        self.def_class = Some(class);
        self
    }

    pub const fn implicit(mut self, defs: &'static [Reg], uses: &'static [Reg]) -> Self {
        self.implicit_defs = defs;
        self.implicit_uses = uses;
        self
    }

    pub const fn dot_new(mut self, op: Opcode) -> Self {
        self.dot_new = Some(op);
        self
    }

    pub const fn dot_new_pred(mut self, op: Opcode) -> Self {
        self.dot_new_pred = Some(op);
        self
    }

    pub const fn dot_cur(mut self, op: Opcode) -> Self {
        self.dot_cur = Some(op);
        self
    }

    pub const fn offset(mut self, range: ImmRange) -> Self {
        self.offset = Some(range);
        self
    }

    pub const fn ext_imm(mut self, range: ImmRange) -> Self {
        self.ext_imm = Some(range);
        self
    }

    pub fn has(&self, flag: DescFlags) -> bool {
        self.flags.contains(flag)
    }
}
