// This module is the hub for the packetizer's shared infrastructure, the pieces that do not
// depend on any particular target: physical registers and register bit sets, machine
// instructions with typed operands and memory references, functions made of basic blocks
// whose entries are plain instructions or finalized bundles, the arena-backed session that
// owns dependence graphs and statistics, and the thiserror-based error type.

//! Core packetizer infrastructure.
//!
//! # Key Components
//!
//! ## Registers (`register`)
//! - Plain register numbers whose meaning is supplied by the target
//! - `RegBitSet` for the dead-definition collision check
//!
//! ## Instructions (`instr`)
//! - Opcode plus ordered operands with implicit/dead/kill modifiers
//! - Memory references used by the dependence builder
//!
//! ## Functions (`function`)
//! - Blocks hold plain instructions and bundles side by side
//!
//! ## Session Management (`session`)
//! - Arena allocation using `bumpalo`
//! - Packetization statistics

pub mod error;
pub mod function;
pub mod instr;
pub mod register;
pub mod session;
pub mod test_utils;

pub use error::{PacketizeResult, PacketizerError};

pub use function::{BlockItem, MachineBasicBlock, MachineFunction};

pub use instr::{MachineInstr, MachineOperand, MemBase, MemRef, Opcode, OperandKind};

pub use register::{Reg, RegBitSet, RegClass};

pub use session::{PacketizerSession, PacketizerStats, PromotionKind};
