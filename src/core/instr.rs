//! Machine instructions as seen by the packetizer.
//!
//! An instruction is an opcode plus an ordered operand list. Explicit
//! operands come first (definitions before uses, in the order the target's
//! encoding lists them); implicit operands follow. Memory references are
//! kept next to the operands so the dependence builder can reason about
//! aliasing without consulting the target.

use super::register::Reg;
use crate::target::RegisterInfo;

/// Target opcode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u16);

/// What an operand holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandKind {
    Reg(Reg),
    Imm(i64),
    /// Branch targets, callees and anything else the packetizer never looks into.
    Symbol(String),
}

/// One operand with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineOperand {
    pub kind: OperandKind,
    /// Register definition (only meaningful for register operands).
    pub is_def: bool,
    /// Not part of the encoding; added by the descriptor or by earlier passes.
    pub implicit: bool,
    /// Defined value is never read.
    pub dead: bool,
    /// Last use of the register.
    pub kill: bool,
}

impl MachineOperand {
    fn reg_operand(reg: Reg, is_def: bool) -> Self {
        Self {
            kind: OperandKind::Reg(reg),
            is_def,
            implicit: false,
            dead: false,
            kill: false,
        }
    }

    pub fn def(reg: Reg) -> Self {
        Self::reg_operand(reg, true)
    }

    pub fn use_reg(reg: Reg) -> Self {
        Self::reg_operand(reg, false)
    }

    pub fn implicit_def(reg: Reg) -> Self {
        Self {
            implicit: true,
            ..Self::def(reg)
        }
    }

    pub fn implicit_use(reg: Reg) -> Self {
        Self {
            implicit: true,
            ..Self::use_reg(reg)
        }
    }

    pub fn imm(value: i64) -> Self {
        Self {
            kind: OperandKind::Imm(value),
            is_def: false,
            implicit: false,
            dead: false,
            kill: false,
        }
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self {
            kind: OperandKind::Symbol(name.into()),
            is_def: false,
            implicit: false,
            dead: false,
            kill: false,
        }
    }

    /// Mark the definition dead.
    pub fn dead(mut self) -> Self {
        self.dead = true;
        self
    }

    /// Mark the use as a kill.
    pub fn killed(mut self) -> Self {
        self.kill = true;
        self
    }

    pub fn reg(&self) -> Option<Reg> {
        match self.kind {
            OperandKind::Reg(reg) => Some(reg),
            _ => None,
        }
    }

    pub fn imm_value(&self) -> Option<i64> {
        match self.kind {
            OperandKind::Imm(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_reg(&self) -> bool {
        matches!(self.kind, OperandKind::Reg(_))
    }

    pub fn is_reg_def(&self) -> bool {
        self.is_reg() && self.is_def
    }

    pub fn is_reg_use(&self) -> bool {
        self.is_reg() && !self.is_def
    }
}

/// Base of a memory reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemBase {
    Reg(Reg),
    Symbol(String),
    /// Address not known to the builder.
    Unknown,
}

/// A memory location touched by an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRef {
    pub base: MemBase,
    pub offset: i64,
    pub size: u32,
    pub volatile: bool,
}

impl MemRef {
    pub fn new(base: MemBase, offset: i64, size: u32) -> Self {
        Self {
            base,
            offset,
            size,
            volatile: false,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

/// A machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInstr {
    pub opcode: Opcode,
    pub operands: Vec<MachineOperand>,
    pub mem_refs: Vec<MemRef>,
}

impl MachineInstr {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: Vec::new(),
            mem_refs: Vec::new(),
        }
    }

    pub fn with_operands(opcode: Opcode, operands: Vec<MachineOperand>) -> Self {
        Self {
            opcode,
            operands,
            mem_refs: Vec::new(),
        }
    }

    pub fn with_mem(mut self, mem: MemRef) -> Self {
        self.mem_refs.push(mem);
        self
    }

    pub fn add_operand(&mut self, operand: MachineOperand) {
        self.operands.push(operand);
    }

    pub fn operand(&self, idx: usize) -> Option<&MachineOperand> {
        self.operands.get(idx)
    }

    /// Register held by operand `idx`, if that operand is a register.
    pub fn operand_reg(&self, idx: usize) -> Option<Reg> {
        self.operand(idx).and_then(MachineOperand::reg)
    }

    pub fn explicit_operands(&self) -> impl Iterator<Item = &MachineOperand> {
        self.operands.iter().filter(|mo| !mo.implicit)
    }

    /// Registers defined by this instruction, implicit ones included.
    pub fn def_regs(&self) -> impl Iterator<Item = Reg> + '_ {
        self.operands
            .iter()
            .filter(|mo| mo.is_def)
            .filter_map(MachineOperand::reg)
    }

    /// Registers read by this instruction, implicit ones included.
    pub fn use_regs(&self) -> impl Iterator<Item = Reg> + '_ {
        self.operands
            .iter()
            .filter(|mo| !mo.is_def)
            .filter_map(MachineOperand::reg)
    }

    /// Whether some use operand overlaps `reg`.
    pub fn reads_register<R: RegisterInfo + ?Sized>(&self, reg: Reg, tri: &R) -> bool {
        self.use_regs().any(|r| tri.regs_overlap(r, reg))
    }

    /// Whether some definition overlaps `reg`.
    pub fn modifies_register<R: RegisterInfo + ?Sized>(&self, reg: Reg, tri: &R) -> bool {
        self.def_regs().any(|r| tri.regs_overlap(r, reg))
    }

    /// Whether `reg` itself (not an alias) is defined.
    pub fn defines_register(&self, reg: Reg) -> bool {
        self.def_regs().any(|r| r == reg)
    }

    pub fn has_volatile_ref(&self) -> bool {
        self.mem_refs.iter().any(|m| m.volatile)
    }
}
